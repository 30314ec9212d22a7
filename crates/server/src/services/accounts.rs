//! Account registration, login and administration.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::LazyLock;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use bookshelf_core::{AccountId, Email, ValidationErrors};

use crate::db::{RepositoryError, Store};
use crate::models::book::MAX_NAME_LENGTH;
use crate::models::{Account, NewAccount};
use crate::query::{AccountFilter, AccountFilterParams, Page, PageRequest};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account not found")]
    NotFound,

    #[error("password hashing error")]
    PasswordHash,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AccountError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::Conflict(_) => {
                Self::Validation(ValidationErrors::single("email", "The email has already been taken."))
            }
            other => Self::Repository(other),
        }
    }
}

/// Registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Must equal `password` when present.
    #[serde(default)]
    pub password_confirmation: Option<String>,
}

/// Profile change request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

/// Account service over any [`Store`].
pub struct AccountService<'a, S> {
    store: &'a S,
}

impl<'a, S: Store> AccountService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Register a new, unverified account.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for a missing name, malformed or
    /// taken email, or a short or unconfirmed password.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<Account, AccountError> {
        let mut errors = ValidationErrors::new();
        let name = validate_name(&mut errors, &registration.name);
        let email = validate_email(&mut errors, &registration.email);
        validate_password(
            &mut errors,
            &registration.password,
            registration.password_confirmation.as_deref(),
        );

        let (Some(name), Some(email)) = (name, email) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        let password_hash = hash_password(&registration.password)?;
        let account = self
            .store
            .create_account(NewAccount {
                name,
                email,
                password_hash,
                email_verified_at: None,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account)
    }

    /// Check an email and password pair.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::InvalidCredentials` for any mismatch, without
    /// revealing whether the email exists.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Account, AccountError> {
        let credentials = match Email::parse(email) {
            Ok(email) => self.store.find_account_credentials(&email).await?,
            Err(_) => None,
        };

        let Some((account, password_hash)) = credentials else {
            return Err(reject_unknown_account(password));
        };

        verify_password(password, &password_hash)?;

        tracing::info!(account_id = %account.id, "Account logged in");
        Ok(account)
    }

    /// Change name and email.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for bad or taken values and
    /// `AccountError::NotFound` for unknown accounts.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        id: AccountId,
        update: &ProfileUpdate,
    ) -> Result<Account, AccountError> {
        let mut errors = ValidationErrors::new();
        let name = validate_name(&mut errors, &update.name);
        let email = validate_email(&mut errors, &update.email);
        let (Some(name), Some(email)) = (name, email) else {
            return Err(errors.into());
        };

        Ok(self.store.update_account_profile(id, name, email).await?)
    }

    /// Mark the email verified now. Already verified accounts keep their
    /// original timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` for unknown accounts.
    #[instrument(skip(self))]
    pub async fn mark_verified(&self, id: AccountId) -> Result<Account, AccountError> {
        Ok(self.store.mark_email_verified(id, Utc::now()).await?)
    }

    /// Delete an account together with its books.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::NotFound` for unknown accounts.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: AccountId) -> Result<(), AccountError> {
        self.store.delete_account(id).await?;
        tracing::info!(account_id = %id, "Account deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AccountError::NotFound` for unknown accounts.
    pub async fn get(&self, id: AccountId) -> Result<Account, AccountError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `AccountError::NotFound` for unknown emails.
    pub async fn get_by_email(&self, email: &str) -> Result<Account, AccountError> {
        let email = Email::parse(email).map_err(|_| AccountError::NotFound)?;
        self.store
            .find_account_by_email(&email)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Administrative listing across all accounts, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Repository` if the store fails.
    #[instrument(skip(self, params, page))]
    pub async fn list(
        &self,
        params: &AccountFilterParams,
        page: PageRequest,
    ) -> Result<Page<Account>, AccountError> {
        let filter = AccountFilter::from_params(params);
        let page = page.with_query(params.query_pairs());
        Ok(self.store.list_accounts(&filter, &page).await?)
    }
}

fn validate_name(errors: &mut ValidationErrors, name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        errors.add("name", "The name field is required.");
        return None;
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            "name",
            format!("The name field must not be greater than {MAX_NAME_LENGTH} characters."),
        );
        return None;
    }
    Some(name.to_owned())
}

fn validate_email(errors: &mut ValidationErrors, email: &str) -> Option<Email> {
    if email.trim().is_empty() {
        errors.add("email", "The email field is required.");
        return None;
    }
    match Email::parse(email) {
        Ok(email) => Some(email),
        Err(_) => {
            errors.add("email", "The email field must be a valid email address.");
            None
        }
    }
}

fn validate_password(errors: &mut ValidationErrors, password: &str, confirmation: Option<&str>) {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("The password field must be at least {MIN_PASSWORD_LENGTH} characters."),
        );
    }
    if confirmation.is_some_and(|c| c != password) {
        errors.add("password", "The password field confirmation does not match.");
    }
}

/// Hash a password with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `AccountError::PasswordHash` if hashing fails.
fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AccountError::PasswordHash)
}

/// Hash checked when no account matches, so unknown emails cost the same
/// Argon2 work as wrong passwords.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("bookshelf-unknown-account").ok());

fn reject_unknown_account(password: &str) -> AccountError {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    AccountError::InvalidCredentials
}

fn verify_password(password: &str, hash: &str) -> Result<(), AccountError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AccountError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AccountError::InvalidCredentials)
}
