//! Book catalog operations.
//!
//! Every operation takes the acting account explicitly. Listing is always
//! scoped to the principal's own books; mutations go through
//! [`BookPolicy`]. Thumbnail uploads are validated together with the fields
//! so a rejected request never touches storage or the database.

use thiserror::Error;
use tracing::instrument;

use bookshelf_core::{AccountId, BookId, ValidationErrors};

use crate::config::CatalogConfig;
use crate::db::{RepositoryError, Store};
use crate::models::{BookChanges, BookFields, BookInput, BookRecord, NewBook};
use crate::policy::BookPolicy;
use crate::query::{BookFilter, BookFilterParams, Page, PageRequest};
use crate::storage::{
    StorageError, ThumbnailStorage, ThumbnailUpload, ValidatedThumbnail, validate_thumbnail,
};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("book not found")]
    NotFound,

    #[error("this action is unauthorized")]
    Forbidden,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Catalog service over any [`Store`].
pub struct CatalogService<'a, S> {
    store: &'a S,
    storage: &'a ThumbnailStorage,
    config: &'a CatalogConfig,
}

impl<'a, S: Store> CatalogService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, storage: &'a ThumbnailStorage, config: &'a CatalogConfig) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    /// One page of the principal's books, newest first.
    ///
    /// Active filters are carried into the page links.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unauthenticated` without a principal and
    /// `CatalogError::Validation` for malformed rating or date filters.
    #[instrument(skip(self, params, page))]
    pub async fn list_books(
        &self,
        principal: Option<AccountId>,
        params: &BookFilterParams,
        page: PageRequest,
    ) -> Result<Page<BookRecord>, CatalogError> {
        let owner = require_principal(principal, BookPolicy::view_any(principal))?;
        let filter = BookFilter::for_owner(owner, params)?;
        let page = page.with_query(params.query_pairs());

        Ok(self.store.list_books(&filter, &page).await?)
    }

    /// A single book owned by the principal.
    ///
    /// Books owned by someone else are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the book does not exist or is not
    /// the principal's.
    #[instrument(skip(self))]
    pub async fn get_book(
        &self,
        principal: Option<AccountId>,
        id: BookId,
    ) -> Result<BookRecord, CatalogError> {
        let owner = principal.ok_or(CatalogError::Unauthenticated)?;
        let record = self.find(id).await?;

        if !BookPolicy::view(principal, &record.book) || record.book.owner_id != owner {
            tracing::debug!(book_id = %id, "Book hidden from non-owner");
            return Err(CatalogError::NotFound);
        }
        Ok(record)
    }

    /// Create a book for the principal, storing its thumbnail first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` with every failing field, or
    /// `CatalogError::Storage` if the thumbnail cannot be written (in which
    /// case no row is inserted).
    #[instrument(skip(self, input, thumbnail))]
    pub async fn create_book(
        &self,
        principal: Option<AccountId>,
        input: &BookInput,
        thumbnail: Option<ThumbnailUpload>,
    ) -> Result<BookRecord, CatalogError> {
        let owner = require_principal(principal, BookPolicy::create(principal))?;
        let (fields, thumbnail) = self.validate(input, thumbnail)?;

        let stored = match &thumbnail {
            Some(valid) => Some(self.storage.store(valid).await?),
            None => None,
        };

        let result = self
            .store
            .create_book(NewBook {
                owner_id: owner,
                fields,
                thumbnail: stored.clone(),
            })
            .await;

        match result {
            Ok(record) => {
                tracing::info!(book_id = %record.book.id, "Book created");
                Ok(record)
            }
            Err(e) => {
                self.discard(stored.as_deref()).await;
                Err(e.into())
            }
        }
    }

    /// Replace a book's fields. A new thumbnail replaces the old one, whose
    /// file is deleted before the new one is written; without one the
    /// stored thumbnail is kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown books,
    /// `CatalogError::Forbidden` when the principal does not own the book,
    /// and `CatalogError::Validation` for bad input.
    #[instrument(skip(self, input, thumbnail))]
    pub async fn update_book(
        &self,
        principal: Option<AccountId>,
        id: BookId,
        input: &BookInput,
        thumbnail: Option<ThumbnailUpload>,
    ) -> Result<BookRecord, CatalogError> {
        principal.ok_or(CatalogError::Unauthenticated)?;
        let existing = self.find(id).await?;
        if !BookPolicy::update(principal, &existing.book) {
            tracing::warn!(book_id = %id, "Update refused for non-owner");
            return Err(CatalogError::Forbidden);
        }

        let (fields, thumbnail) = self.validate(input, thumbnail)?;

        let stored = match &thumbnail {
            Some(valid) => {
                if let Some(old) = existing.book.thumbnail.as_deref() {
                    self.storage.delete(old).await?;
                }
                Some(self.storage.store(valid).await?)
            }
            None => None,
        };

        let record = self
            .store
            .update_book(
                id,
                BookChanges {
                    fields,
                    thumbnail: stored,
                },
            )
            .await?;

        tracing::info!(book_id = %id, "Book updated");
        Ok(record)
    }

    /// Delete a book and then its thumbnail file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` for unknown books and
    /// `CatalogError::Forbidden` when the principal does not own the book.
    #[instrument(skip(self))]
    pub async fn delete_book(
        &self,
        principal: Option<AccountId>,
        id: BookId,
    ) -> Result<(), CatalogError> {
        principal.ok_or(CatalogError::Unauthenticated)?;
        let existing = self.find(id).await?;
        if !BookPolicy::delete(principal, &existing.book) {
            tracing::warn!(book_id = %id, "Delete refused for non-owner");
            return Err(CatalogError::Forbidden);
        }

        self.store.delete_book(id).await?;
        self.discard(existing.book.thumbnail.as_deref()).await;

        tracing::info!(book_id = %id, "Book deleted");
        Ok(())
    }

    /// Unique non-empty authors among the principal's books, ascending.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unauthenticated` without a principal.
    #[instrument(skip(self))]
    pub async fn distinct_authors(
        &self,
        principal: Option<AccountId>,
    ) -> Result<Vec<String>, CatalogError> {
        let owner = require_principal(principal, BookPolicy::view_any(principal))?;
        Ok(self.store.distinct_authors(owner).await?)
    }

    async fn find(&self, id: BookId) -> Result<BookRecord, CatalogError> {
        self.store
            .get_book(id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Validate fields and thumbnail together so every problem is reported.
    fn validate(
        &self,
        input: &BookInput,
        thumbnail: Option<ThumbnailUpload>,
    ) -> Result<(BookFields, Option<ValidatedThumbnail>), CatalogError> {
        let fields = input.validate();
        let thumbnail = thumbnail
            .map(|upload| validate_thumbnail(upload, self.config))
            .transpose();

        match (fields, thumbnail) {
            (Ok(fields), Ok(thumbnail)) => Ok((fields, thumbnail)),
            (fields, thumbnail) => {
                let mut errors = ValidationErrors::new();
                if let Err(e) = fields {
                    errors.merge(e);
                }
                if let Err(e) = thumbnail {
                    errors.merge(e);
                }
                Err(CatalogError::Validation(errors))
            }
        }
    }

    /// Best-effort removal of a file no row refers to.
    async fn discard(&self, path: Option<&str>) {
        if let Some(path) = path
            && let Err(e) = self.storage.delete(path).await
        {
            tracing::warn!(path = %path, error = %e, "Failed to remove orphaned thumbnail");
        }
    }
}

fn require_principal(principal: Option<AccountId>, allowed: bool) -> Result<AccountId, CatalogError> {
    match principal {
        Some(id) if allowed => Ok(id),
        _ => Err(CatalogError::Unauthenticated),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewAccount;
    use bookshelf_core::Email;
    use chrono::{TimeZone, Utc};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    struct Fixture {
        store: MemoryStore,
        storage: ThumbnailStorage,
        config: CatalogConfig,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = CatalogConfig {
                storage_root: dir.path().to_path_buf(),
                ..CatalogConfig::default()
            };
            Self {
                store: MemoryStore::new(),
                storage: ThumbnailStorage::from_config(&config),
                config,
                _dir: dir,
            }
        }

        fn service(&self) -> CatalogService<'_, MemoryStore> {
            CatalogService::new(&self.store, &self.storage, &self.config)
        }

        async fn account(&self, email: &str) -> AccountId {
            self.store
                .create_account(NewAccount {
                    name: "Reader".to_owned(),
                    email: Email::parse(email).unwrap(),
                    password_hash: "hash".to_owned(),
                    email_verified_at: None,
                })
                .await
                .unwrap()
                .id
        }

        fn exists(&self, path: &str) -> bool {
            self.storage.root().join(path).exists()
        }
    }

    fn input(title: &str, author: &str, rating: &str) -> BookInput {
        BookInput {
            title: Some(title.to_owned()),
            author: Some(author.to_owned()),
            description: Some("A book.".to_owned()),
            rating: Some(rating.to_owned()),
        }
    }

    fn png() -> ThumbnailUpload {
        ThumbnailUpload {
            file_name: Some("cover.png".to_owned()),
            content_type: Some("image/png".to_owned()),
            bytes: PNG.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_principal() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let b = fx.account("b@example.com").await;
        let service = fx.service();
        for title in ["A1", "A2"] {
            service.create_book(Some(a), &input(title, "x", "3"), None).await.unwrap();
        }
        for title in ["B1", "B2", "B3"] {
            service.create_book(Some(b), &input(title, "y", "3"), None).await.unwrap();
        }

        let page = service
            .list_books(Some(a), &BookFilterParams::default(), PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.meta.total, 2);
        assert!(page.data.iter().all(|r| r.book.owner_id == a));
    }

    #[tokio::test]
    async fn test_rating_filter_and_links_keep_filters() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let service = fx.service();
        service.create_book(Some(a), &input("Three", "x", "3"), None).await.unwrap();
        service.create_book(Some(a), &input("Four", "x", "4"), None).await.unwrap();

        let params = BookFilterParams {
            rating: Some("4".to_owned()),
            ..BookFilterParams::default()
        };
        let page = service
            .list_books(Some(a), &params, PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].book.title, "Four");
        assert_eq!(page.links.first, "?rating=4&page=1&per_page=10");
    }

    #[tokio::test]
    async fn test_date_from_filter() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let service = fx.service();
        let old = service.create_book(Some(a), &input("Old", "x", "3"), None).await.unwrap();
        let new = service.create_book(Some(a), &input("New", "x", "3"), None).await.unwrap();
        fx.store
            .set_book_created_at(old.book.id, Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap())
            .await
            .unwrap();
        fx.store
            .set_book_created_at(new.book.id, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        let params = BookFilterParams {
            date_from: Some("2024-01-01".to_owned()),
            ..BookFilterParams::default()
        };
        let page = service
            .list_books(Some(a), &params, PageRequest::new(1, 10))
            .await
            .unwrap();
        let ids: Vec<BookId> = page.data.iter().map(|r| r.book.id).collect();
        assert_eq!(ids, vec![new.book.id]);
    }

    #[tokio::test]
    async fn test_anonymous_principal_is_refused() {
        let fx = Fixture::new();
        let service = fx.service();
        assert!(matches!(
            service
                .list_books(None, &BookFilterParams::default(), PageRequest::new(1, 10))
                .await,
            Err(CatalogError::Unauthenticated)
        ));
        assert!(matches!(
            service.create_book(None, &input("T", "A", "1"), None).await,
            Err(CatalogError::Unauthenticated)
        ));
        assert!(matches!(
            service.distinct_authors(None).await,
            Err(CatalogError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_non_owner_gets_not_found_on_show_and_forbidden_on_mutation() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let b = fx.account("b@example.com").await;
        let service = fx.service();
        let book = service.create_book(Some(a), &input("Mine", "x", "3"), None).await.unwrap();
        let id = book.book.id;

        assert!(matches!(service.get_book(Some(b), id).await, Err(CatalogError::NotFound)));
        assert!(matches!(
            service.update_book(Some(b), id, &input("Theirs", "y", "1"), None).await,
            Err(CatalogError::Forbidden)
        ));
        assert!(matches!(service.delete_book(Some(b), id).await, Err(CatalogError::Forbidden)));

        let still = service.get_book(Some(a), id).await.unwrap();
        assert_eq!(still.book.title, "Mine");
    }

    #[tokio::test]
    async fn test_validation_collects_field_and_thumbnail_errors() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let service = fx.service();
        let bad_upload = ThumbnailUpload {
            content_type: Some("text/plain".to_owned()),
            bytes: b"hello".to_vec(),
            ..ThumbnailUpload::default()
        };

        let Err(CatalogError::Validation(errors)) = service
            .create_book(Some(a), &input("", "x", "9"), Some(bad_upload))
            .await
        else {
            panic!("expected validation error");
        };
        assert!(errors.has("title"));
        assert!(errors.has("rating"));
        assert!(errors.has("thumbnail"));

        let page = service
            .list_books(Some(a), &BookFilterParams::default(), PageRequest::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.meta.total, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_thumbnail_and_deletes_old_file() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let service = fx.service();
        let created = service
            .create_book(Some(a), &input("T", "A", "2"), Some(png()))
            .await
            .unwrap();
        let old = created.book.thumbnail.clone().unwrap();
        assert!(fx.exists(&old));

        let kept = service
            .update_book(Some(a), created.book.id, &input("T2", "A", "2"), None)
            .await
            .unwrap();
        assert_eq!(kept.book.thumbnail.as_deref(), Some(old.as_str()));

        let replaced = service
            .update_book(Some(a), created.book.id, &input("T3", "A", "2"), Some(png()))
            .await
            .unwrap();
        let new = replaced.book.thumbnail.unwrap();
        assert_ne!(new, old);
        assert!(!fx.exists(&old));
        assert!(fx.exists(&new));
    }

    #[tokio::test]
    async fn test_storage_failure_writes_no_row() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = MemoryStore::new();
        let config = CatalogConfig {
            storage_root: file.path().to_path_buf(),
            ..CatalogConfig::default()
        };
        let storage = ThumbnailStorage::from_config(&config);
        let a = store
            .create_account(NewAccount {
                name: "Reader".to_owned(),
                email: Email::parse("a@example.com").unwrap(),
                password_hash: "hash".to_owned(),
                email_verified_at: None,
            })
            .await
            .unwrap()
            .id;
        let service = CatalogService::new(&store, &storage, &config);

        let result = service
            .create_book(Some(a), &input("T", "A", "2"), Some(png()))
            .await;
        assert!(matches!(result, Err(CatalogError::Storage(_))));
        assert!(store.distinct_authors(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_thumbnail() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let service = fx.service();
        let created = service
            .create_book(Some(a), &input("T", "A", "2"), Some(png()))
            .await
            .unwrap();
        let path = created.book.thumbnail.clone().unwrap();

        service.delete_book(Some(a), created.book.id).await.unwrap();
        assert!(!fx.exists(&path));
        assert!(matches!(
            service.get_book(Some(a), created.book.id).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_distinct_authors_for_principal() {
        let fx = Fixture::new();
        let a = fx.account("a@example.com").await;
        let b = fx.account("b@example.com").await;
        let service = fx.service();
        for author in ["Le Guin", "Adams", "Le Guin"] {
            service.create_book(Some(a), &input("T", author, "3"), None).await.unwrap();
        }
        service.create_book(Some(b), &input("T", "Pratchett", "3"), None).await.unwrap();

        assert_eq!(
            service.distinct_authors(Some(a)).await.unwrap(),
            vec!["Adams", "Le Guin"]
        );
    }
}
