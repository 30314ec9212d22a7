//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! bookshelf-cli account create -e reader@example.com -n "Reader" -p "long password" --verified
//! bookshelf-cli account verify -e reader@example.com
//! bookshelf-cli account delete -e reader@example.com
//! ```

use bookshelf_server::db::PgStore;
use bookshelf_server::services::{AccountService, Registration};

use super::{CliError, connect};

/// Register an account, optionally marking its email verified.
///
/// # Errors
///
/// Returns an error for invalid input, a taken email or database failures.
pub async fn create(email: &str, name: &str, password: &str, verified: bool) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);
    let accounts = AccountService::new(&store);

    let account = accounts
        .register(&Registration {
            name: name.to_owned(),
            email: email.to_owned(),
            password: password.to_owned(),
            password_confirmation: None,
        })
        .await?;

    if verified {
        accounts.mark_verified(account.id).await?;
    }

    tracing::info!(
        account_id = %account.id,
        email = %account.email,
        verified,
        "Account created"
    );
    Ok(())
}

/// Mark an account's email verified.
///
/// # Errors
///
/// Returns an error if no account has that email.
pub async fn verify(email: &str) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);
    let accounts = AccountService::new(&store);

    let account = accounts.get_by_email(email).await?;
    let account = accounts.mark_verified(account.id).await?;

    tracing::info!(
        account_id = %account.id,
        verified_at = ?account.email_verified_at,
        "Account verified"
    );
    Ok(())
}

/// Delete an account and all of its books.
///
/// # Errors
///
/// Returns an error if no account has that email.
pub async fn delete(email: &str) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);
    let accounts = AccountService::new(&store);

    let account = accounts.get_by_email(email).await?;
    accounts.delete(account.id).await?;

    tracing::info!(account_id = %account.id, "Account deleted");
    Ok(())
}
