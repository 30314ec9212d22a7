//! Seed accounts and books from a YAML file.
//!
//! ```yaml
//! accounts:
//!   - name: Ada Lovelace
//!     email: ada@example.com
//!     password: analytical-engine
//!     verified: true
//! books:
//!   - owner: ada@example.com
//!     title: Sketch of the Analytical Engine
//!     author: L. F. Menabrea
//!     description: Notes on Babbage's engine.
//!     rating: 5
//! ```
//!
//! Accounts whose email already exists are left alone, and books are only
//! added for accounts created by this run, so seeding twice is harmless.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use bookshelf_core::AccountId;
use bookshelf_server::config::CatalogConfig;
use bookshelf_server::db::{PgStore, Store};
use bookshelf_server::models::BookInput;
use bookshelf_server::services::{AccountError, AccountService, CatalogService, Registration};
use bookshelf_server::storage::ThumbnailStorage;

use super::{CliError, connect};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
    #[serde(default)]
    pub books: Vec<SeedBook>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedBook {
    /// Email of an account in the same file.
    pub owner: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub rating: i64,
}

impl SeedBook {
    fn input(&self) -> BookInput {
        BookInput {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            description: Some(self.description.clone()),
            rating: Some(self.rating.to_string()),
        }
    }
}

/// What a seeding run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub accounts_created: usize,
    pub accounts_skipped: usize,
    pub books_created: usize,
}

/// Every problem in the file, checked before touching the database.
#[must_use]
pub fn validate(file: &SeedFile) -> Vec<String> {
    let mut problems = Vec::new();
    let mut emails = HashSet::new();

    for account in &file.accounts {
        if !emails.insert(account.email.trim().to_lowercase()) {
            problems.push(format!("duplicate account email {}", account.email));
        }
    }

    for (i, book) in file.books.iter().enumerate() {
        if !emails.contains(&book.owner.trim().to_lowercase()) {
            problems.push(format!("book #{} has unknown owner {}", i + 1, book.owner));
        }
        if let Err(errors) = book.input().validate() {
            problems.push(format!("book #{} ({}): {errors}", i + 1, book.title));
        }
    }

    problems
}

/// Insert the file's contents into `store`.
///
/// # Errors
///
/// Returns the first account or catalog failure; rows written before it
/// are kept.
pub async fn seed<S: Store>(store: &S, file: &SeedFile) -> Result<SeedReport, CliError> {
    let config = CatalogConfig::default();
    let storage = ThumbnailStorage::from_config(&config);
    let accounts = AccountService::new(store);
    let catalog = CatalogService::new(store, &storage, &config);

    let mut report = SeedReport::default();
    let mut created: HashMap<String, AccountId> = HashMap::new();

    for seed in &file.accounts {
        match accounts.get_by_email(&seed.email).await {
            Ok(existing) => {
                info!(email = %existing.email, "Account exists, skipping");
                report.accounts_skipped += 1;
                continue;
            }
            Err(AccountError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        let account = accounts
            .register(&Registration {
                name: seed.name.clone(),
                email: seed.email.clone(),
                password: seed.password.clone(),
                password_confirmation: None,
            })
            .await?;
        if seed.verified {
            accounts.mark_verified(account.id).await?;
        }

        created.insert(account.email.normalized(), account.id);
        report.accounts_created += 1;
    }

    for book in &file.books {
        let Some(&owner) = created.get(&book.owner.trim().to_lowercase()) else {
            continue;
        };
        catalog.create_book(Some(owner), &book.input(), None).await?;
        report.books_created += 1;
    }

    Ok(report)
}

/// Seed the database from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails
/// validation, or the database rejects a row.
pub async fn run(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading seed file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let file: SeedFile = serde_yaml::from_str(&content)?;

    let problems = validate(&file);
    if !problems.is_empty() {
        for problem in &problems {
            error!("  - {problem}");
        }
        return Err(CliError::InvalidSeed(problems));
    }

    let store = PgStore::new(connect().await?);
    let report = seed(&store, &file).await?;

    info!("Seeding complete!");
    info!("  Accounts created: {}", report.accounts_created);
    info!("  Accounts skipped (already exist): {}", report.accounts_skipped);
    info!("  Books created: {}", report.books_created);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bookshelf_server::db::MemoryStore;

    const SEED: &str = r"
accounts:
  - name: Ada Lovelace
    email: ada@example.com
    password: analytical-engine
    verified: true
  - name: Grace Hopper
    email: grace@example.com
    password: compiler-first
books:
  - owner: ada@example.com
    title: Notes
    author: Menabrea
    description: Engine notes.
    rating: 5
  - owner: Grace@Example.com
    title: Cobol
    author: Hopper
    description: A language.
    rating: 4
";

    #[test]
    fn test_bundled_seed_file_is_valid() {
        let content = include_str!("../../../../seeds/catalog.yaml");
        let file: SeedFile = serde_yaml::from_str(content).unwrap();
        assert!(validate(&file).is_empty(), "{:?}", validate(&file));
        assert!(!file.books.is_empty());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut file: SeedFile = serde_yaml::from_str(SEED).unwrap();
        file.accounts.push(file.accounts[0].clone());
        file.books[0].rating = 9;
        file.books[1].owner = "nobody@example.com".to_owned();

        let problems = validate(&file);
        assert_eq!(problems.len(), 3, "{problems:?}");
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        let file: SeedFile = serde_yaml::from_str(SEED).unwrap();

        let first = seed(&store, &file).await.unwrap();
        assert_eq!(
            first,
            SeedReport {
                accounts_created: 2,
                accounts_skipped: 0,
                books_created: 2,
            }
        );

        let second = seed(&store, &file).await.unwrap();
        assert_eq!(
            second,
            SeedReport {
                accounts_created: 0,
                accounts_skipped: 2,
                books_created: 0,
            }
        );
    }
}
