//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health               - Liveness check
//! GET    /health/ready         - Readiness check (store reachable)
//!
//! # Auth
//! POST   /auth/register        - Register and sign in
//! POST   /auth/login           - Sign in
//! POST   /auth/logout          - Sign out
//! GET    /auth/me              - Signed-in account
//! PUT    /auth/me              - Update name / email
//! DELETE /auth/me              - Delete account and its books
//!
//! # Books (requires auth, scoped to the signed-in account)
//! GET    /books                - Filtered, paginated list + author list
//! POST   /books                - Create (multipart, optional thumbnail)
//! GET    /books/authors        - Distinct authors
//! GET    /books/{id}           - Show
//! PUT    /books/{id}           - Update (multipart)
//! POST   /books/{id}           - Update (multipart, for HTML forms)
//! DELETE /books/{id}           - Delete
//!
//! # Users (requires auth)
//! GET    /users                - Filtered, paginated account list
//! GET    /users/{id}           - Show account
//! ```

pub mod auth;
pub mod books;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::db::Store;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/register", post(auth::register::<S>))
        .route("/login", post(auth::login::<S>))
        .route("/logout", post(auth::logout))
        .route(
            "/me",
            get(auth::me::<S>)
                .put(auth::update_me::<S>)
                .delete(auth::destroy_me::<S>),
        )
}

/// Create the book routes router.
pub fn book_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(books::index::<S>).post(books::store::<S>))
        .route("/authors", get(books::authors::<S>))
        .route(
            "/{id}",
            get(books::show::<S>)
                .put(books::update::<S>)
                .post(books::update::<S>)
                .delete(books::destroy::<S>),
        )
}

/// Create the user routes router.
pub fn user_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(users::index::<S>))
        .route("/{id}", get(users::show::<S>))
}

/// Create all routes.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest("/auth", auth_routes())
        .nest("/books", book_routes())
        .nest("/users", user_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
