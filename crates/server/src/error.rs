//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is JSON with a `message` and,
//! for validation failures, the per-field `errors`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use bookshelf_core::ValidationErrors;

use crate::db::RepositoryError;
use crate::services::{AccountError, CatalogError};
use crate::storage::StorageError;

/// Application-level error type for the HTTP layer.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input failed field rules.
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No signed-in account.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Thumbnail storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Validation(errors) => Self::Validation(errors),
            CatalogError::NotFound => Self::NotFound("book".to_owned()),
            CatalogError::Forbidden => Self::Forbidden("This action is unauthorized.".to_owned()),
            CatalogError::Unauthenticated => Self::Unauthorized("Unauthenticated.".to_owned()),
            CatalogError::Storage(e) => Self::Storage(e),
            CatalogError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(errors) => Self::Validation(errors),
            AccountError::InvalidCredentials => Self::Validation(ValidationErrors::single(
                "email",
                "These credentials do not match our records.",
            )),
            AccountError::NotFound => Self::NotFound("account".to_owned()),
            AccountError::PasswordHash => Self::Internal("password hashing failed".to_owned()),
            AccountError::Repository(e) => Self::Database(e),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Storage(_) | Self::Internal(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let body = match self {
            Self::Validation(errors) => json!({
                "message": summary(&errors),
                "errors": errors,
            }),
            Self::NotFound(_) => json!({ "message": "Not found." }),
            Self::Unauthorized(msg) | Self::Forbidden(msg) | Self::BadRequest(msg) => {
                json!({ "message": msg })
            }
            Self::Database(_) | Self::Storage(_) | Self::Internal(_) => {
                json!({ "message": "Server error." })
            }
        };

        (status, Json(body)).into_response()
    }
}

/// First message, plus how many more there are.
fn summary(errors: &ValidationErrors) -> String {
    let mut messages = errors.iter().flat_map(|(_, msgs)| msgs.iter());
    let Some(first) = messages.next() else {
        return "The given data was invalid.".to_owned();
    };
    match messages.count() {
        0 => first.clone(),
        1 => format!("{first} (and 1 more error)"),
        n => format!("{first} (and {n} more errors)"),
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with accounts.
pub fn set_sentry_user(account_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(account_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for an account action.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("catalog", "Created book", Some(&[("book_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
