//! In-process [`Store`] for tests and local demos.
//!
//! All data sits behind one `RwLock`, so every operation (including the
//! account cascade) is atomic with respect to the others.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bookshelf_core::{AccountId, BookId, Email};

use super::{RepositoryError, Store};
use crate::models::{Account, Book, BookChanges, BookRecord, NewAccount, NewBook, Owner};
use crate::query::{AccountFilter, BookFilter, Page, PageRequest};

#[derive(Debug, Clone)]
struct StoredAccount {
    account: Account,
    password_hash: String,
}

#[derive(Debug, Default)]
struct Tables {
    last_account_id: i32,
    last_book_id: i32,
    accounts: BTreeMap<AccountId, StoredAccount>,
    books: BTreeMap<BookId, Book>,
}

impl Tables {
    fn email_taken(&self, email: &Email, except: Option<AccountId>) -> bool {
        self.accounts
            .values()
            .any(|s| Some(s.account.id) != except && s.account.email.matches(email))
    }

    fn find_by_email(&self, email: &Email) -> Option<&StoredAccount> {
        self.accounts.values().find(|s| s.account.email.matches(email))
    }

    fn record(&self, book: &Book) -> Result<BookRecord, RepositoryError> {
        let owner = self.accounts.get(&book.owner_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!(
                "book {} references missing account {}",
                book.id, book.owner_id
            ))
        })?;
        Ok(BookRecord {
            book: book.clone(),
            owner: Owner::from(&owner.account),
        })
    }
}

/// [`Store`] kept entirely in memory. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a book's creation time, for date-range fixtures.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn set_book_created_at(
        &self,
        id: BookId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let book = tables.books.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        book.created_at = at;
        Ok(())
    }
}

impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(&new.email, None) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        tables.last_account_id += 1;
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(tables.last_account_id),
            name: new.name,
            email: new.email,
            email_verified_at: new.email_verified_at,
            created_at: now,
            updated_at: now,
        };
        tables.accounts.insert(
            account.id,
            StoredAccount {
                account: account.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).map(|s| s.account.clone()))
    }

    async fn find_account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.find_by_email(email).map(|s| s.account.clone()))
    }

    async fn find_account_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .find_by_email(email)
            .map(|s| (s.account.clone(), s.password_hash.clone())))
    }

    async fn mark_email_verified(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Account, RepositoryError> {
        let mut tables = self.tables.write().await;
        let stored = tables.accounts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.account.email_verified_at.get_or_insert(at);
        stored.account.updated_at = Utc::now();
        Ok(stored.account.clone())
    }

    async fn update_account_profile(
        &self,
        id: AccountId,
        name: String,
        email: Email,
    ) -> Result<Account, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.email_taken(&email, Some(id)) {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }

        let stored = tables.accounts.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        stored.account.name = name;
        stored.account.email = email;
        stored.account.updated_at = Utc::now();
        Ok(stored.account.clone())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        tables.books.retain(|_, book| book.owner_id != id);
        Ok(())
    }

    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        page: &PageRequest,
    ) -> Result<Page<Account>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<Account> = filter
            .apply(tables.accounts.values().map(|s| &s.account))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Ok(Page::new(page.slice(&matching), matching.len() as u64, page))
    }

    async fn create_book(&self, new: NewBook) -> Result<BookRecord, RepositoryError> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.contains_key(&new.owner_id) {
            return Err(RepositoryError::NotFound);
        }

        tables.last_book_id += 1;
        let now = Utc::now();
        let book = Book {
            id: BookId::new(tables.last_book_id),
            owner_id: new.owner_id,
            title: new.fields.title,
            author: new.fields.author,
            description: new.fields.description,
            rating: new.fields.rating,
            thumbnail: new.thumbnail,
            created_at: now,
            updated_at: now,
        };
        let record = tables.record(&book)?;
        tables.books.insert(book.id, book);
        Ok(record)
    }

    async fn get_book(&self, id: BookId) -> Result<Option<BookRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        tables.books.get(&id).map(|b| tables.record(b)).transpose()
    }

    async fn update_book(
        &self,
        id: BookId,
        changes: BookChanges,
    ) -> Result<BookRecord, RepositoryError> {
        let mut tables = self.tables.write().await;
        let book = tables.books.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        book.title = changes.fields.title;
        book.author = changes.fields.author;
        book.description = changes.fields.description;
        book.rating = changes.fields.rating;
        if let Some(thumbnail) = changes.thumbnail {
            book.thumbnail = Some(thumbnail);
        }
        book.updated_at = Utc::now();

        let book = book.clone();
        tables.record(&book)
    }

    async fn delete_book(&self, id: BookId) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_books(
        &self,
        filter: &BookFilter,
        page: &PageRequest,
    ) -> Result<Page<BookRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Book> = filter.apply(tables.books.values()).collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = matching.len() as u64;
        let records = page
            .slice(&matching)
            .into_iter()
            .map(|b| tables.record(b))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(records, total, page))
    }

    async fn distinct_authors(&self, owner: AccountId) -> Result<Vec<String>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut authors: Vec<String> = tables
            .books
            .values()
            .filter(|b| b.owner_id == owner && !b.author.is_empty())
            .map(|b| b.author.clone())
            .collect();
        authors.sort();
        authors.dedup();
        Ok(authors)
    }
}
