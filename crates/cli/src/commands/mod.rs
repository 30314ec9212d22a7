//! CLI command implementations.

pub mod account;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use bookshelf_server::services::{AccountError, CatalogError};

/// Errors any command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid seed file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Seed file has {} problem(s): {}", .0.len(), .0.join("; "))]
    InvalidSeed(Vec<String>),
}

/// Connect using `BOOKSHELF_DATABASE_URL`, falling back to `DATABASE_URL`.
async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BOOKSHELF_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("BOOKSHELF_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(bookshelf_server::db::create_pool(&database_url).await?)
}
