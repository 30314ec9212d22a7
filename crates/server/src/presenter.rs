//! Display values derived from stored records.
//!
//! Nothing here is persisted. Star strings, initials and thumbnail URLs are
//! computed on every read and attached to the JSON resources below.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use bookshelf_core::{AccountId, BookId, VerificationStatus};

use crate::models::{Account, BookRecord};

const FULL_STAR: char = '★';
const EMPTY_STAR: char = '☆';
const MAX_STARS: u8 = 5;

/// Render a rating as stars, e.g. `★★★☆☆ (3/5)`.
///
/// Accepts 0 (all empty stars) and saturates above 5.
#[must_use]
pub fn format_rating(rating: u8) -> String {
    let full = rating.min(MAX_STARS);
    let mut out = String::new();
    out.extend(std::iter::repeat_n(FULL_STAR, usize::from(full)));
    out.extend(std::iter::repeat_n(EMPTY_STAR, usize::from(MAX_STARS - full)));
    out.push_str(&format!(" ({rating}/{MAX_STARS})"));
    out
}

/// Public URL for a stored thumbnail path.
#[must_use]
pub fn thumbnail_url(asset_base: &str, thumbnail: Option<&str>) -> Option<String> {
    thumbnail.map(|path| format!("{asset_base}{path}"))
}

/// Up to two uppercase initials from a display name.
///
/// One word gives its first letter; two or more give the first letters of
/// the first two words. Blank names give an empty string.
#[must_use]
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .take(2)
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// [`initials`], falling back to `fallback` for a blank name.
#[must_use]
pub fn initials_or(name: &str, fallback: char) -> String {
    let initials = initials(name);
    if initials.is_empty() {
        fallback.to_string()
    } else {
        initials
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Owner block embedded in a [`BookResource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookOwnerResource {
    pub id: AccountId,
    pub name: String,
    pub initials: String,
}

/// JSON view of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookResource {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub rating: u8,
    pub formatted_rating: String,
    pub thumbnail: Option<String>,
    pub thumbnail_url: Option<String>,
    pub user: BookOwnerResource,
    pub created_at: String,
    pub updated_at: String,
}

impl BookResource {
    #[must_use]
    pub fn new(record: BookRecord, asset_base: &str) -> Self {
        let BookRecord { book, owner } = record;
        let rating = book.rating.get();
        Self {
            id: book.id,
            thumbnail_url: thumbnail_url(asset_base, book.thumbnail.as_deref()),
            title: book.title,
            author: book.author,
            description: book.description,
            rating,
            formatted_rating: format_rating(rating),
            thumbnail: book.thumbnail,
            user: BookOwnerResource {
                id: owner.id,
                initials: initials_or(&owner.name, 'U'),
                name: owner.name,
            },
            created_at: timestamp(book.created_at),
            updated_at: timestamp(book.updated_at),
        }
    }
}

/// JSON view of an account. Never includes credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountResource {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub initials: String,
    pub email_verified_at: Option<String>,
    pub status: VerificationStatus,
    pub created_at: String,
}

impl From<Account> for AccountResource {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            initials: initials(&account.name),
            status: account.status(),
            name: account.name,
            email: account.email.into_inner(),
            email_verified_at: account.email_verified_at.map(timestamp),
            created_at: timestamp(account.created_at),
        }
    }
}
