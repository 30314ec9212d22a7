//! Administrative account listing.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use bookshelf_core::AccountId;

use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::presenter::AccountResource;
use crate::query::{AccountFilterParams, Page, PageRequest};
use crate::routes::books::DataResponse;
use crate::state::AppState;

/// Query parameters for the account list.
#[derive(Debug, Default, Deserialize)]
pub struct UserIndexQuery {
    #[serde(flatten)]
    pub filters: AccountFilterParams,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserIndexResponse {
    pub users: Page<AccountResource>,
    pub filters: AccountFilterParams,
}

/// List every account, filtered by name/email search and verification status.
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(_account): RequireAuth,
    Query(query): Query<UserIndexQuery>,
) -> Result<Json<UserIndexResponse>> {
    let page = PageRequest::resolve(
        query.page.as_deref(),
        query.per_page.as_deref(),
        &state.config().pagination,
    );
    let users = state.accounts().list(&query.filters, page).await?;

    Ok(Json(UserIndexResponse {
        users: users.map(AccountResource::from),
        filters: query.filters,
    }))
}

/// Show a single account.
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireAuth(_account): RequireAuth,
    Path(id): Path<i32>,
) -> Result<Json<DataResponse<AccountResource>>> {
    let account = state.accounts().get(AccountId::new(id)).await?;
    Ok(Json(DataResponse {
        data: account.into(),
    }))
}
