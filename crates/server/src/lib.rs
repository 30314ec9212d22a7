//! Bookshelf server library.
//!
//! A personal book catalog: accounts keep a private list of books (title,
//! author, description, rating and an optional cover thumbnail) that they
//! can search, filter and page through.
//!
//! # Layers
//!
//! - [`query`] - Composable filters and pagination
//! - [`policy`] - Ownership rules for books
//! - [`presenter`] - JSON views and display helpers
//! - [`db`] - The [`Store`](db::Store) seam with `PostgreSQL` and in-memory backends
//! - [`storage`] - Thumbnail files on local disk
//! - [`services`] - Catalog and account operations
//! - [`routes`] / [`middleware`] - The axum HTTP surface
//!
//! [`app`] assembles the router so the binary and the integration tests
//! serve exactly the same stack.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod presenter;
pub mod query;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

use axum::{Router, extract::DefaultBodyLimit, http::HeaderValue, http::header};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::db::Store;
use crate::state::AppState;

/// Headroom on top of the thumbnail limit for the text fields and
/// multipart framing.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the full application router.
///
/// Serves the JSON API plus stored thumbnails under `/storage`. Sentry
/// layers are left to the binary so tests don't need a hub.
pub fn app<S, T>(state: AppState<S>, sessions: SessionManagerLayer<T>) -> Router
where
    S: Store,
    T: SessionStore + Clone,
{
    let body_limit = state.config().max_upload_bytes + FORM_OVERHEAD_BYTES;
    let thumbnails = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .service(ServeDir::new(state.storage().root()));

    routes::routes::<S>()
        .nest_service("/storage", thumbnails)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(sessions)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
