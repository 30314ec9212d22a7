//! Account repository for database operations.
//!
//! Queries are checked at runtime so the crate builds without a live
//! database; row types convert into domain models through `TryFrom`, which
//! re-validates emails on the way out.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bookshelf_core::{AccountId, Email};

use super::{RepositoryError, fetch_page, map_unique_violation};
use crate::models::{Account, NewAccount};
use crate::query::{AccountFilter, Page, PageRequest};

const ACCOUNT_COLUMNS: &str =
    "a.id, a.name, a.email, a.email_verified_at, a.created_at, a.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    name: String,
    email: String,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: AccountId::new(row.id),
            name: row.name,
            email,
            email_verified_at: row.email_verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Account row plus its password hash.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for account database operations.
pub struct AccountRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, account: &NewAccount) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            INSERT INTO bookshelf.account AS a (name, email, password_hash, email_verified_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.email_verified_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?;

        row.try_into()
    }

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bookshelf.account a WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM bookshelf.account a WHERE lower(a.email) = lower($1)"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account and its password hash by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            r"
            SELECT {ACCOUNT_COLUMNS}, a.password_hash
            FROM bookshelf.account a
            WHERE lower(a.email) = lower($1)
            "
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| {
            let account = Account::try_from(r.account)?;
            Ok((account, r.password_hash))
        })
        .transpose()
    }

    /// Set the verification timestamp unless one is already recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    pub async fn mark_verified(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            UPDATE bookshelf.account AS a
            SET email_verified_at = COALESCE(a.email_verified_at, $2),
                updated_at = now()
            WHERE a.id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Change an account's name and email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    /// Returns `RepositoryError::Conflict` if the email belongs to another account.
    pub async fn update_profile(
        &self,
        id: AccountId,
        name: &str,
        email: &Email,
    ) -> Result<Account, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r"
            UPDATE bookshelf.account AS a
            SET name = $2, email = $3, updated_at = now()
            WHERE a.id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "email"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete an account. Its books go with it through the foreign key's
    /// `ON DELETE CASCADE`, inside the same statement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account does not exist.
    pub async fn delete(&self, id: AccountId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let books: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookshelf.book WHERE owner_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let result = sqlx::query("DELETE FROM bookshelf.account WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        tracing::info!(account_id = %id, books, "Deleted account and its books");
        Ok(())
    }

    /// List accounts matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &AccountFilter,
        page: &PageRequest,
    ) -> Result<Page<Account>, RepositoryError> {
        let (rows, total) = fetch_page::<_, AccountRow>(
            self.pool,
            ACCOUNT_COLUMNS,
            "bookshelf.account a",
            filter,
            "a.created_at DESC, a.id DESC",
            page,
        )
        .await?;

        let accounts = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Account>, _>>()?;

        Ok(Page::new(accounts, total, page))
    }
}
