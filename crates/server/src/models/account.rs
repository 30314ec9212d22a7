//! Account domain model.

use chrono::{DateTime, Utc};

use bookshelf_core::{AccountId, Email, VerificationStatus};

/// A registered account.
///
/// The password hash is deliberately absent: it only ever travels alongside
/// an account through [`Store::find_account_credentials`](crate::db::Store::find_account_credentials).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: Email,
    /// Set once by the verification flow; `None` while unverified.
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[must_use]
    pub const fn status(&self) -> VerificationStatus {
        VerificationStatus::from_timestamp(self.email_verified_at.as_ref())
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Data for inserting a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: Email,
    /// Argon2 PHC string, never the plain password.
    pub password_hash: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// Owner details joined onto a book for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub id: AccountId,
    pub name: String,
}

impl From<&Account> for Owner {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            name: account.name.clone(),
        }
    }
}
