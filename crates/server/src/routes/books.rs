//! Book route handlers.
//!
//! All handlers act for the signed-in account. Create and update take
//! `multipart/form-data` so a thumbnail can ride along with the fields.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bookshelf_core::BookId;

use crate::db::Store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::BookInput;
use crate::presenter::BookResource;
use crate::query::{BookFilterParams, Page, PageRequest};
use crate::state::AppState;
use crate::storage::ThumbnailUpload;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Query parameters for the book list.
#[derive(Debug, Default, Deserialize)]
pub struct BookIndexQuery {
    #[serde(flatten)]
    pub filters: BookFilterParams,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

/// Book list with the data needed to render the filter bar.
#[derive(Debug, Serialize)]
pub struct BookIndexResponse {
    pub books: Page<BookResource>,
    /// The filters as received, for refilling the form.
    pub filters: BookFilterParams,
    /// Authors available in the author dropdown.
    pub authors: Vec<String>,
}

/// Single resource wrapper.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// =============================================================================
// Handlers
// =============================================================================

/// List the signed-in account's books.
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
    Query(query): Query<BookIndexQuery>,
) -> Result<Json<BookIndexResponse>> {
    let page = PageRequest::resolve(
        query.page.as_deref(),
        query.per_page.as_deref(),
        &state.config().pagination,
    );
    let catalog = state.catalog();

    let books = catalog
        .list_books(Some(account.id), &query.filters, page)
        .await?;
    let authors = catalog.distinct_authors(Some(account.id)).await?;

    let asset_base = &state.config().asset_base_url;
    Ok(Json(BookIndexResponse {
        books: books.map(|record| BookResource::new(record, asset_base)),
        filters: query.filters,
        authors,
    }))
}

/// Distinct authors among the signed-in account's books.
pub async fn authors<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
) -> Result<Json<DataResponse<Vec<String>>>> {
    let data = state.catalog().distinct_authors(Some(account.id)).await?;
    Ok(Json(DataResponse { data }))
}

/// Show one of the signed-in account's books.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<DataResponse<BookResource>>> {
    let record = state.catalog().get_book(Some(account.id), BookId::new(id)).await?;
    Ok(Json(DataResponse {
        data: BookResource::new(record, &state.config().asset_base_url),
    }))
}

/// Create a book from a multipart form.
#[instrument(skip(state, account, multipart), fields(account_id = %account.id))]
pub async fn store<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (input, thumbnail) = read_book_form(multipart).await?;

    let record = state
        .catalog()
        .create_book(Some(account.id), &input, thumbnail)
        .await?;

    let id = record.book.id.to_string();
    add_breadcrumb("catalog", "Created book", Some(&[("book_id", id.as_str())]));

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: BookResource::new(record, &state.config().asset_base_url),
        }),
    ))
}

/// Replace a book's fields, and its thumbnail when one is uploaded.
#[instrument(skip(state, account, multipart), fields(account_id = %account.id))]
pub async fn update<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<DataResponse<BookResource>>> {
    let (input, thumbnail) = read_book_form(multipart).await?;

    let record = state
        .catalog()
        .update_book(Some(account.id), BookId::new(id), &input, thumbnail)
        .await?;

    Ok(Json(DataResponse {
        data: BookResource::new(record, &state.config().asset_base_url),
    }))
}

/// Delete a book.
#[instrument(skip(state, account), fields(account_id = %account.id))]
pub async fn destroy<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(account): RequireAuth,
    Path(id): Path<i32>,
) -> Result<StatusCode> {
    state
        .catalog()
        .delete_book(Some(account.id), BookId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Multipart
// =============================================================================

/// Split a book form into text fields and an optional thumbnail.
///
/// Unknown fields are ignored. A file part with no bytes (an empty file
/// input) counts as no thumbnail.
async fn read_book_form(mut multipart: Multipart) -> Result<(BookInput, Option<ThumbnailUpload>)> {
    let mut input = BookInput::default();
    let mut thumbnail = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name == "thumbnail" {
            let file_name = field.file_name().map(str::to_owned);
            let content_type = field.content_type().map(str::to_owned);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if !bytes.is_empty() {
                thumbnail = Some(ThumbnailUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let slot = match name.as_str() {
            "title" => &mut input.title,
            "author" => &mut input.author,
            "description" => &mut input.description,
            "rating" => &mut input.rating,
            _ => continue,
        };
        *slot = Some(field.text().await.map_err(multipart_error)?);
    }

    Ok((input, thumbnail))
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::debug!(error = %e, "Rejected multipart body");
    AppError::BadRequest(e.body_text())
}
