//! Composable list filters.
//!
//! A [`Filter`] is an ordered list of predicates combined with AND. Each
//! predicate knows how to test an in-memory value and how to render itself
//! as a SQL condition, so the in-memory store and `PostgreSQL` agree on what
//! a filter means. Filters are built from raw query parameters where every
//! blank parameter contributes nothing, so empty parameters yield an empty
//! filter that matches everything.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use bookshelf_core::{AccountId, ValidationErrors, VerificationStatus};

use crate::models::{Account, Book};

/// A single narrowing condition over one entity type.
pub trait Predicate {
    type Item;

    /// Whether `item` satisfies the condition.
    fn matches(&self, item: &Self::Item) -> bool;

    /// Append the equivalent SQL condition, binding any values.
    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>);
}

/// Predicates folded together with AND, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter<P> {
    predicates: Vec<P>,
}

impl<P> Default for Filter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Filter<P> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// Add a predicate.
    #[must_use]
    pub fn and(mut self, predicate: P) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add a predicate when one was produced.
    #[must_use]
    pub fn and_maybe(self, predicate: Option<P>) -> Self {
        match predicate {
            Some(p) => self.and(p),
            None => self,
        }
    }

    #[must_use]
    pub fn predicates(&self) -> &[P] {
        &self.predicates
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl<P: Predicate> Filter<P> {
    /// Whether `item` satisfies every predicate.
    pub fn matches(&self, item: &P::Item) -> bool {
        self.predicates.iter().all(|p| p.matches(item))
    }

    /// Keep the items that match, preserving their order.
    pub fn apply<'a, I>(&'a self, items: I) -> impl Iterator<Item = &'a P::Item> + 'a
    where
        I: IntoIterator<Item = &'a P::Item>,
        I::IntoIter: 'a,
    {
        items.into_iter().filter(move |item| self.matches(item))
    }

    /// Append ` WHERE (..) AND (..)`, or nothing for an empty filter.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            qb.push(if i == 0 { " WHERE (" } else { " AND (" });
            predicate.push_sql(qb);
            qb.push(")");
        }
    }
}

// =============================================================================
// Books
// =============================================================================

/// Book list query parameters, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookFilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl BookFilterParams {
    /// Non-blank parameters as `(name, value)` pairs, for page links.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("search", &self.search),
            ("author", &self.author),
            ("rating", &self.rating),
            ("date_from", &self.date_from),
            ("date_to", &self.date_to),
        ]
        .into_iter()
        .filter_map(|(key, value)| non_blank(value.as_deref()).map(|v| (key, v.to_owned())))
        .collect()
    }
}

/// Conditions a book list can be narrowed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookPredicate {
    /// Owner equals the given account.
    OwnedBy(AccountId),
    /// Title or author contains the text, ignoring case.
    Search(String),
    /// Author contains the text, ignoring case.
    Author(String),
    /// Rating equals the value. Values off the star scale match nothing.
    Rating(i64),
    /// Created at or after the instant.
    CreatedFrom(DateTime<Utc>),
    /// Created strictly before the instant.
    CreatedBefore(DateTime<Utc>),
}

impl Predicate for BookPredicate {
    type Item = Book;

    fn matches(&self, book: &Book) -> bool {
        match self {
            Self::OwnedBy(owner) => book.owner_id == *owner,
            Self::Search(needle) => {
                contains_ignore_case(&book.title, needle)
                    || contains_ignore_case(&book.author, needle)
            }
            Self::Author(needle) => contains_ignore_case(&book.author, needle),
            Self::Rating(rating) => i64::from(book.rating.get()) == *rating,
            Self::CreatedFrom(start) => book.created_at >= *start,
            Self::CreatedBefore(end) => book.created_at < *end,
        }
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::OwnedBy(owner) => {
                qb.push("b.owner_id = ").push_bind(*owner);
            }
            Self::Search(needle) => {
                let pattern = like_pattern(needle);
                qb.push("b.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(LIKE_ESCAPE)
                    .push(" OR b.author ILIKE ")
                    .push_bind(pattern)
                    .push(LIKE_ESCAPE);
            }
            Self::Author(needle) => {
                qb.push("b.author ILIKE ")
                    .push_bind(like_pattern(needle))
                    .push(LIKE_ESCAPE);
            }
            Self::Rating(rating) => {
                qb.push("b.rating = ").push_bind(*rating);
            }
            Self::CreatedFrom(start) => {
                qb.push("b.created_at >= ").push_bind(*start);
            }
            Self::CreatedBefore(end) => {
                qb.push("b.created_at < ").push_bind(*end);
            }
        }
    }
}

/// Filter over books.
pub type BookFilter = Filter<BookPredicate>;

impl BookFilter {
    /// Build the filter for one owner's catalog.
    ///
    /// Ownership always comes first; the remaining predicates follow the
    /// parameter order and are skipped when blank. A rating of `0` is
    /// treated as blank.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] for a non-integer rating or a date
    /// that is not `YYYY-MM-DD`.
    pub fn for_owner(owner: AccountId, params: &BookFilterParams) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let rating = parse_rating(&mut errors, params.rating.as_deref());
        let from = parse_day(&mut errors, "date_from", params.date_from.as_deref());
        let to = parse_day(&mut errors, "date_to", params.date_to.as_deref());
        errors.into_result()?;

        Ok(Self::new()
            .and(BookPredicate::OwnedBy(owner))
            .and_maybe(non_blank(params.search.as_deref()).map(|s| BookPredicate::Search(s.to_owned())))
            .and_maybe(non_blank(params.author.as_deref()).map(|a| BookPredicate::Author(a.to_owned())))
            .and_maybe(rating.map(BookPredicate::Rating))
            .and_maybe(from.map(|day| BookPredicate::CreatedFrom(start_of_day(day))))
            .and_maybe(
                to.and_then(|day| day.succ_opt())
                    .map(|next| BookPredicate::CreatedBefore(start_of_day(next))),
            ))
    }
}

// =============================================================================
// Accounts
// =============================================================================

/// Account list query parameters, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl AccountFilterParams {
    /// Non-blank parameters as `(name, value)` pairs, for page links.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [("search", &self.search), ("status", &self.status)]
            .into_iter()
            .filter_map(|(key, value)| non_blank(value.as_deref()).map(|v| (key, v.to_owned())))
            .collect()
    }
}

/// Conditions an account list can be narrowed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountPredicate {
    /// Name or email contains the text, ignoring case.
    Search(String),
    /// Verification timestamp presence.
    Status(VerificationStatus),
}

impl Predicate for AccountPredicate {
    type Item = Account;

    fn matches(&self, account: &Account) -> bool {
        match self {
            Self::Search(needle) => {
                contains_ignore_case(&account.name, needle)
                    || contains_ignore_case(account.email.as_str(), needle)
            }
            Self::Status(status) => account.status() == *status,
        }
    }

    fn push_sql(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::Search(needle) => {
                let pattern = like_pattern(needle);
                qb.push("a.name ILIKE ")
                    .push_bind(pattern.clone())
                    .push(LIKE_ESCAPE)
                    .push(" OR a.email ILIKE ")
                    .push_bind(pattern)
                    .push(LIKE_ESCAPE);
            }
            Self::Status(VerificationStatus::Verified) => {
                qb.push("a.email_verified_at IS NOT NULL");
            }
            Self::Status(VerificationStatus::Unverified) => {
                qb.push("a.email_verified_at IS NULL");
            }
        }
    }
}

/// Filter over accounts.
pub type AccountFilter = Filter<AccountPredicate>;

impl AccountFilter {
    /// Build the administrative account filter. Unknown status values are
    /// ignored rather than rejected.
    #[must_use]
    pub fn from_params(params: &AccountFilterParams) -> Self {
        Self::new()
            .and_maybe(
                non_blank(params.search.as_deref())
                    .map(|s| AccountPredicate::Search(s.to_owned())),
            )
            .and_maybe(
                non_blank(params.status.as_deref())
                    .and_then(VerificationStatus::from_filter)
                    .map(AccountPredicate::Status),
            )
    }
}

// =============================================================================
// Helpers
// =============================================================================

const LIKE_ESCAPE: &str = r" ESCAPE '\'";

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// `%needle%` with LIKE wildcards in the needle matched literally.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

fn parse_rating(errors: &mut ValidationErrors, value: Option<&str>) -> Option<i64> {
    let value = non_blank(value)?;
    match value.parse::<i64>() {
        Ok(0) => None,
        Ok(n) => Some(n),
        Err(_) => {
            errors.add("rating", "The rating filter must be an integer.");
            None
        }
    }
}

fn parse_day(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let value = non_blank(value)?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| errors.add(field, format!("The {field} filter must be a date in YYYY-MM-DD format.")))
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookshelf_core::{BookId, Email, Rating};
    use chrono::TimeZone;

    fn book(id: i32, owner: i32, title: &str, author: &str, rating: i64) -> Book {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Book {
            id: BookId::new(id),
            owner_id: AccountId::new(owner),
            title: title.to_owned(),
            author: author.to_owned(),
            description: "A book.".to_owned(),
            rating: Rating::new(rating).unwrap(),
            thumbnail: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn created(mut book: Book, at: DateTime<Utc>) -> Book {
        book.created_at = at;
        book
    }

    fn params() -> BookFilterParams {
        BookFilterParams::default()
    }

    fn ids(filter: &BookFilter, books: &[Book]) -> Vec<i32> {
        filter.apply(books).map(|b| b.id.as_i32()).collect()
    }

    const OWNER: AccountId = AccountId::new(1);

    #[test]
    fn test_empty_filter_matches_everything_in_order() {
        let books = vec![
            book(3, 1, "C", "x", 1),
            book(1, 2, "A", "y", 2),
            book(2, 1, "B", "z", 3),
        ];
        assert_eq!(ids(&BookFilter::new(), &books), vec![3, 1, 2]);
    }

    #[test]
    fn test_blank_params_only_scope_by_owner() {
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                search: Some("  ".to_owned()),
                author: Some(String::new()),
                rating: Some("0".to_owned()),
                date_from: None,
                date_to: Some(String::new()),
            },
        )
        .unwrap();
        assert_eq!(filter.predicates(), [BookPredicate::OwnedBy(OWNER)]);
    }

    #[test]
    fn test_owner_scoping() {
        let books = vec![
            book(1, 1, "A", "a", 1),
            book(2, 1, "B", "b", 1),
            book(3, 2, "C", "c", 1),
            book(4, 2, "D", "d", 1),
            book(5, 2, "E", "e", 1),
        ];
        let filter = BookFilter::for_owner(OWNER, &params()).unwrap();
        assert_eq!(ids(&filter, &books), vec![1, 2]);
    }

    #[test]
    fn test_search_matches_title_or_author_case_insensitively() {
        let books = vec![
            book(1, 1, "The Hobbit", "J.R.R. Tolkien", 5),
            book(2, 1, "Dune", "Frank Herbert", 4),
            book(3, 1, "Tolkien: A Biography", "Humphrey Carpenter", 3),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                search: Some("TOLKIEN".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![1, 3]);
    }

    #[test]
    fn test_author_is_substring_match() {
        let books = vec![
            book(1, 1, "Emma", "Jane Austen", 4),
            book(2, 1, "Persuasion", "jane austen", 5),
            book(3, 1, "Jane Eyre", "Charlotte Bronte", 4),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                author: Some("Austen".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![1, 2]);
    }

    #[test]
    fn test_rating_is_exact() {
        let books = vec![book(1, 1, "A", "a", 3), book(2, 1, "B", "b", 4)];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                rating: Some("4".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![2]);
    }

    #[test]
    fn test_date_from_selects_later_items() {
        let books = vec![
            created(book(1, 1, "Old", "a", 3), Utc.with_ymd_and_hms(2023, 1, 1, 9, 0, 0).unwrap()),
            created(book(2, 1, "New", "b", 3), Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                date_from: Some("2024-01-01".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![2]);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let at = |h, m, s| Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap();
        let books = vec![
            created(book(1, 1, "a", "a", 1), before),
            created(book(2, 1, "b", "b", 1), at(0, 0, 0)),
            created(book(3, 1, "c", "c", 1), at(23, 59, 59)),
            created(book(4, 1, "d", "d", 1), after),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                date_from: Some("2024-03-10".to_owned()),
                date_to: Some("2024-03-10".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![2, 3]);
    }

    #[test]
    fn test_filters_combine_with_and() {
        let books = vec![
            book(1, 1, "Dune", "Frank Herbert", 5),
            book(2, 1, "Dune Messiah", "Frank Herbert", 3),
            book(3, 2, "Dune", "Frank Herbert", 5),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                search: Some("dune".to_owned()),
                rating: Some("5".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(ids(&filter, &books), vec![1]);
    }

    #[test]
    fn test_malformed_params_are_rejected() {
        let errors = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                rating: Some("high".to_owned()),
                date_from: Some("01/02/2024".to_owned()),
                ..params()
            },
        )
        .unwrap_err();
        assert!(errors.has("rating"));
        assert!(errors.has("date_from"));
    }

    #[test]
    fn test_rating_off_the_scale_matches_nothing() {
        let books: Vec<Book> = (1..=5).map(|r| book(r, 1, "A", "a", i64::from(r))).collect();
        for rating in ["9", "-1", "6"] {
            let filter = BookFilter::for_owner(
                OWNER,
                &BookFilterParams {
                    rating: Some(rating.to_owned()),
                    ..params()
                },
            )
            .unwrap();
            assert!(ids(&filter, &books).is_empty(), "rating={rating}");
        }
    }

    #[test]
    fn test_date_to_alone_includes_the_whole_day() {
        let books = vec![
            created(book(1, 1, "a", "a", 1), Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()),
            created(book(2, 1, "b", "b", 1), Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap()),
            created(book(3, 1, "c", "c", 1), Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()),
        ];
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                date_to: Some("2024-03-10".to_owned()),
                ..params()
            },
        )
        .unwrap();
        assert_eq!(
            filter.predicates().last(),
            Some(&BookPredicate::CreatedBefore(
                Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap()
            ))
        );
        assert_eq!(ids(&filter, &books), vec![1, 2]);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off\\"), r"%50\%\_off\\%");
    }

    #[test]
    fn test_sql_rendering() {
        let filter = BookFilter::for_owner(
            OWNER,
            &BookFilterParams {
                search: Some("x".to_owned()),
                rating: Some("2".to_owned()),
                ..params()
            },
        )
        .unwrap();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM bookshelf.book b");
        filter.push_where(&mut qb);
        assert_eq!(
            qb.sql(),
            r"SELECT * FROM bookshelf.book b WHERE (b.owner_id = $1) AND (b.title ILIKE $2 ESCAPE '\' OR b.author ILIKE $3 ESCAPE '\') AND (b.rating = $4)"
        );
    }

    #[test]
    fn test_empty_filter_renders_no_where() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        AccountFilter::new().push_where(&mut qb);
        assert_eq!(qb.sql(), "SELECT 1");
    }

    fn account(id: i32, name: &str, email: &str, verified: bool) -> Account {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Account {
            id: AccountId::new(id),
            name: name.to_owned(),
            email: Email::parse(email).unwrap(),
            email_verified_at: verified.then_some(at),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_account_search_and_status() {
        let accounts = vec![
            account(1, "Alice Smith", "alice@example.com", true),
            account(2, "Bob", "bob@SMITH.org", false),
            account(3, "Carol", "carol@example.com", false),
        ];

        let smith = AccountFilter::from_params(&AccountFilterParams {
            search: Some("smith".to_owned()),
            status: None,
        });
        let found: Vec<i32> = smith.apply(&accounts).map(|a| a.id.as_i32()).collect();
        assert_eq!(found, vec![1, 2]);

        let unverified = AccountFilter::from_params(&AccountFilterParams {
            search: None,
            status: Some("unverified".to_owned()),
        });
        let found: Vec<i32> = unverified.apply(&accounts).map(|a| a.id.as_i32()).collect();
        assert_eq!(found, vec![2, 3]);
    }

    #[test]
    fn test_unknown_status_is_ignored() {
        let filter = AccountFilter::from_params(&AccountFilterParams {
            search: None,
            status: Some("banned".to_owned()),
        });
        assert!(filter.is_empty());
    }

    #[test]
    fn test_query_pairs_skip_blank_values() {
        let params = BookFilterParams {
            search: Some(" dune ".to_owned()),
            author: Some(String::new()),
            ..params()
        };
        assert_eq!(params.query_pairs(), vec![("search", "dune".to_owned())]);
    }
}
