//! Entity store: accounts and books.
//!
//! # Database: `bookshelf` schema
//!
//! ## Tables
//!
//! - `account` - Registered accounts (unique on `lower(email)`)
//! - `book` - Catalog entries, `owner_id` references `account` with `ON DELETE CASCADE`
//! - `session` - Tower-sessions storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bookshelf-cli -- migrate
//! ```
//!
//! # Stores
//!
//! Services talk to a [`Store`], not to a pool. [`PgStore`] is the
//! production implementation; [`MemoryStore`] keeps everything in process
//! for tests and local demos. Both evaluate the same [`Filter`] values.

pub mod accounts;
pub mod books;
pub mod memory;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;

use bookshelf_core::{AccountId, BookId, Email};

pub use accounts::AccountRepository;
pub use books::BookRepository;
pub use memory::MemoryStore;

use crate::models::{Account, BookChanges, BookRecord, NewAccount, NewBook};
use crate::query::{AccountFilter, BookFilter, Filter, Page, PageRequest, Predicate};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Persistence operations the services rely on.
///
/// Lookups return `Ok(None)` for unknown ids; mutations of unknown ids
/// return [`RepositoryError::NotFound`].
pub trait Store: Clone + Send + Sync + 'static {
    /// Check the backing store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert an account. Fails with `Conflict` if the email is taken,
    /// compared case-insensitively.
    fn create_account(
        &self,
        account: NewAccount,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn get_account(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    fn find_account_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<Account>, RepositoryError>> + Send;

    /// Account plus stored password hash, for login only.
    fn find_account_credentials(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<(Account, String)>, RepositoryError>> + Send;

    /// Record verification. An already verified account keeps its original
    /// timestamp.
    fn mark_email_verified(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    fn update_account_profile(
        &self,
        id: AccountId,
        name: String,
        email: Email,
    ) -> impl Future<Output = Result<Account, RepositoryError>> + Send;

    /// Delete an account and all of its books in one atomic step.
    fn delete_account(
        &self,
        id: AccountId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Accounts matching `filter`, newest first.
    fn list_accounts(
        &self,
        filter: &AccountFilter,
        page: &PageRequest,
    ) -> impl Future<Output = Result<Page<Account>, RepositoryError>> + Send;

    /// Insert a book. Fails with `NotFound` if the owner does not exist.
    fn create_book(
        &self,
        book: NewBook,
    ) -> impl Future<Output = Result<BookRecord, RepositoryError>> + Send;

    fn get_book(
        &self,
        id: BookId,
    ) -> impl Future<Output = Result<Option<BookRecord>, RepositoryError>> + Send;

    fn update_book(
        &self,
        id: BookId,
        changes: BookChanges,
    ) -> impl Future<Output = Result<BookRecord, RepositoryError>> + Send;

    fn delete_book(&self, id: BookId) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Books matching `filter`, newest first with ties broken by id.
    fn list_books(
        &self,
        filter: &BookFilter,
        page: &PageRequest,
    ) -> impl Future<Output = Result<Page<BookRecord>, RepositoryError>> + Send;

    /// Distinct non-empty author names among `owner`'s books, ascending.
    fn distinct_authors(
        &self,
        owner: AccountId,
    ) -> impl Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    const fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool)
    }

    const fn books(&self) -> BookRepository<'_> {
        BookRepository::new(&self.pool)
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_account(&self, account: NewAccount) -> Result<Account, RepositoryError> {
        self.accounts().create(&account).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        self.accounts().get_by_id(id).await
    }

    async fn find_account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        self.accounts().get_by_email(email).await
    }

    async fn find_account_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        self.accounts().get_credentials(email).await
    }

    async fn mark_email_verified(
        &self,
        id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Account, RepositoryError> {
        self.accounts().mark_verified(id, at).await
    }

    async fn update_account_profile(
        &self,
        id: AccountId,
        name: String,
        email: Email,
    ) -> Result<Account, RepositoryError> {
        self.accounts().update_profile(id, &name, &email).await
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), RepositoryError> {
        self.accounts().delete(id).await
    }

    async fn list_accounts(
        &self,
        filter: &AccountFilter,
        page: &PageRequest,
    ) -> Result<Page<Account>, RepositoryError> {
        self.accounts().list(filter, page).await
    }

    async fn create_book(&self, book: NewBook) -> Result<BookRecord, RepositoryError> {
        self.books().create(&book).await
    }

    async fn get_book(&self, id: BookId) -> Result<Option<BookRecord>, RepositoryError> {
        self.books().get_by_id(id).await
    }

    async fn update_book(
        &self,
        id: BookId,
        changes: BookChanges,
    ) -> Result<BookRecord, RepositoryError> {
        self.books().update(id, &changes).await
    }

    async fn delete_book(&self, id: BookId) -> Result<(), RepositoryError> {
        self.books().delete(id).await
    }

    async fn list_books(
        &self,
        filter: &BookFilter,
        page: &PageRequest,
    ) -> Result<Page<BookRecord>, RepositoryError> {
        self.books().list(filter, page).await
    }

    async fn distinct_authors(&self, owner: AccountId) -> Result<Vec<String>, RepositoryError> {
        self.books().distinct_authors(owner).await
    }
}

/// Map unique violations to `Conflict`, everything else to `Database`.
fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}

/// Count and fetch one page of rows from a single snapshot.
///
/// `select` and `from` are the fixed head of the query (`from` must alias
/// the tables the filter's predicates refer to). Both statements run in one
/// `REPEATABLE READ READ ONLY` transaction so `total` agrees with the rows.
async fn fetch_page<P, R>(
    pool: &PgPool,
    select: &str,
    from: &str,
    filter: &Filter<P>,
    order_by: &str,
    page: &PageRequest,
) -> Result<(Vec<R>, u64), RepositoryError>
where
    P: Predicate,
    R: for<'r> sqlx::FromRow<'r, PgRow> + Send + Unpin,
{
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;

    let mut count = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {from}"));
    filter.push_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *tx).await?;

    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {select} FROM {from}"));
    filter.push_where(&mut query);
    query
        .push(" ORDER BY ")
        .push(order_by)
        .push(" LIMIT ")
        .push_bind(i64::from(page.per_page()))
        .push(" OFFSET ")
        .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
    let rows: Vec<R> = query.build_query_as().fetch_all(&mut *tx).await?;

    tx.commit().await?;

    let total = u64::try_from(total)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative row count: {total}")))?;
    Ok((rows, total))
}
