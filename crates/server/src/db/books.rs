//! Book repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bookshelf_core::{AccountId, BookId, Rating};

use super::{RepositoryError, fetch_page};
use crate::models::{Book, BookChanges, BookRecord, NewBook, Owner};
use crate::query::{BookFilter, Page, PageRequest};

/// Book columns plus the owner's name; expects `b` and `a` aliases.
const BOOK_COLUMNS: &str = "b.id, b.owner_id, b.title, b.author, b.description, b.rating, \
     b.thumbnail, b.created_at, b.updated_at, a.name AS owner_name";

const BOOK_FROM: &str = "bookshelf.book b JOIN bookshelf.account a ON a.id = b.owner_id";

/// Same join over the `changed` CTE of an INSERT/UPDATE .. RETURNING.
const CHANGED_FROM: &str = "changed b JOIN bookshelf.account a ON a.id = b.owner_id";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` book queries.
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: i32,
    owner_id: i32,
    title: String,
    author: String,
    description: String,
    rating: i16,
    thumbnail: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_name: String,
}

impl TryFrom<BookRow> for BookRecord {
    type Error = RepositoryError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating)).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid rating in database: {e}"))
        })?;
        let owner_id = AccountId::new(row.owner_id);

        Ok(Self {
            book: Book {
                id: BookId::new(row.id),
                owner_id,
                title: row.title,
                author: row.author,
                description: row.description,
                rating,
                thumbnail: row.thumbnail,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            owner: Owner {
                id: owner_id,
                name: row.owner_name,
            },
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for book database operations.
pub struct BookRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookRepository<'a> {
    /// Create a new book repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a book and return it with its owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the owner does not exist.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, book: &NewBook) -> Result<BookRecord, RepositoryError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r"
            WITH changed AS (
                INSERT INTO bookshelf.book (owner_id, title, author, description, rating, thumbnail)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
            )
            SELECT {BOOK_COLUMNS} FROM {CHANGED_FROM}
            "
        ))
        .bind(book.owner_id)
        .bind(&book.fields.title)
        .bind(&book.fields.author)
        .bind(&book.fields.description)
        .bind(book.fields.rating)
        .bind(&book.thumbnail)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return RepositoryError::NotFound;
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    /// Get a book by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: BookId) -> Result<Option<BookRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {BOOK_COLUMNS} FROM {BOOK_FROM} WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Replace a book's fields. The thumbnail is only changed when
    /// `changes.thumbnail` is set.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn update(
        &self,
        id: BookId,
        changes: &BookChanges,
    ) -> Result<BookRecord, RepositoryError> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            r"
            WITH changed AS (
                UPDATE bookshelf.book
                SET title = $2,
                    author = $3,
                    description = $4,
                    rating = $5,
                    thumbnail = COALESCE($6, thumbnail),
                    updated_at = now()
                WHERE id = $1
                RETURNING *
            )
            SELECT {BOOK_COLUMNS} FROM {CHANGED_FROM}
            "
        ))
        .bind(id)
        .bind(&changes.fields.title)
        .bind(&changes.fields.author)
        .bind(&changes.fields.description)
        .bind(changes.fields.rating)
        .bind(&changes.thumbnail)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Delete a book.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the book does not exist.
    pub async fn delete(&self, id: BookId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM bookshelf.book WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// List books matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &BookFilter,
        page: &PageRequest,
    ) -> Result<Page<BookRecord>, RepositoryError> {
        let (rows, total) = fetch_page::<_, BookRow>(
            self.pool,
            BOOK_COLUMNS,
            BOOK_FROM,
            filter,
            "b.created_at DESC, b.id DESC",
            page,
        )
        .await?;

        let books = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<BookRecord>, _>>()?;

        Ok(Page::new(books, total, page))
    }

    /// Distinct non-empty authors among an owner's books, ascending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn distinct_authors(&self, owner: AccountId) -> Result<Vec<String>, RepositoryError> {
        let authors = sqlx::query_scalar::<_, String>(
            r#"
            SELECT author
            FROM bookshelf.book
            WHERE owner_id = $1 AND author <> ''
            GROUP BY author
            ORDER BY author COLLATE "C"
            "#,
        )
        .bind(owner)
        .fetch_all(self.pool)
        .await?;

        Ok(authors)
    }
}
