//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::CatalogConfig;
use crate::db::Store;
use crate::services::{AccountService, CatalogService};
use crate::storage::ThumbnailStorage;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Generic over the [`Store`] so the same
/// router runs on `PostgreSQL` in production and in memory under test.
pub struct AppState<S> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    config: CatalogConfig,
    store: S,
    storage: ThumbnailStorage,
}

// Derived Clone would require `S: Clone`.
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state. Thumbnails go under the configured
    /// storage root.
    #[must_use]
    pub fn new(config: CatalogConfig, store: S) -> Self {
        let storage = ThumbnailStorage::from_config(&config);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                storage,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    #[must_use]
    pub fn storage(&self) -> &ThumbnailStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(&self.inner.store, &self.inner.storage, &self.inner.config)
    }

    #[must_use]
    pub fn accounts(&self) -> AccountService<'_, S> {
        AccountService::new(&self.inner.store)
    }
}
