//! Authentication extractors.
//!
//! The signed-in account lives in the session under
//! [`session_keys::CURRENT_ACCOUNT`]; these extractors turn it into the
//! principal that catalog operations receive.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::models::{CurrentAccount, session_keys};

/// Extractor that requires a signed-in account.
///
/// Rejects with `401 Unauthorized` when nobody is logged in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(account): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", account.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentAccount);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_account(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Unauthenticated.".to_owned()))
    }
}

async fn current_account(parts: &Parts) -> Option<CurrentAccount> {
    // Set by SessionManagerLayer
    let session = parts.extensions.get::<Session>()?;
    match session.get::<CurrentAccount>(session_keys::CURRENT_ACCOUNT).await {
        Ok(account) => account,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read account from session");
            None
        }
    }
}

/// Store the logged-in account, issuing a fresh session id first.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_account(
    session: &Session,
    account: &CurrentAccount,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ACCOUNT, account).await
}

/// Forget the logged-in account and everything else in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_account(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
