//! Authentication route handlers.
//!
//! Password registration and login backed by the session cookie, plus the
//! signed-in account's own profile.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bookshelf_core::ValidationErrors;

use crate::db::Store;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_account, set_current_account};
use crate::models::{Account, CurrentAccount, session_keys};
use crate::presenter::AccountResource;
use crate::routes::books::DataResponse;
use crate::services::{ProfileUpdate, Registration};
use crate::state::AppState;

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Account deletion request; the password is asked again.
#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// Register and sign in.
#[instrument(skip_all)]
pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Json(registration): Json<Registration>,
) -> Result<impl IntoResponse> {
    let account = state.accounts().register(&registration).await?;
    sign_in(&session, &account).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: AccountResource::from(account),
        }),
    ))
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<DataResponse<AccountResource>>> {
    let account = state
        .accounts()
        .login(&request.email, &request.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;
    sign_in(&session, &account).await?;

    Ok(Json(DataResponse {
        data: account.into(),
    }))
}

/// Sign out and drop the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_account(&session)
        .await
        .map_err(|e| AppError::Internal(format!("failed to clear session: {e}")))?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in account.
pub async fn me<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<DataResponse<AccountResource>>> {
    let account = state.accounts().get(current.id).await?;
    Ok(Json(DataResponse {
        data: account.into(),
    }))
}

/// Change the signed-in account's name and email.
#[instrument(skip_all, fields(account_id = %current.id))]
pub async fn update_me<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<DataResponse<AccountResource>>> {
    let account = state.accounts().update_profile(current.id, &update).await?;
    session
        .insert(
            session_keys::CURRENT_ACCOUNT,
            CurrentAccount::from(&account),
        )
        .await
        .map_err(|e| AppError::Internal(format!("failed to update session: {e}")))?;

    Ok(Json(DataResponse {
        data: account.into(),
    }))
}

/// Delete the signed-in account and all of its books.
#[instrument(skip_all, fields(account_id = %current.id))]
pub async fn destroy_me<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Json(request): Json<DeleteAccountRequest>,
) -> Result<StatusCode> {
    let accounts = state.accounts();
    let verified = accounts
        .login(current.email.as_str(), &request.password)
        .await
        .map_err(|_| {
            AppError::Validation(ValidationErrors::single(
                "password",
                "The password is incorrect.",
            ))
        })?;
    if verified.id != current.id {
        return Err(AppError::Forbidden("This action is unauthorized.".to_owned()));
    }

    accounts.delete(current.id).await?;
    logout(session).await
}

async fn sign_in(session: &Session, account: &Account) -> Result<()> {
    set_current_account(session, &CurrentAccount::from(account))
        .await
        .map_err(|e| AppError::Internal(format!("failed to store session: {e}")))?;
    set_sentry_user(&account.id, Some(account.email.as_str()));
    Ok(())
}
