//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BOOKSHELF_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BOOKSHELF_BASE_URL` - Public URL of the service (`https://` enables secure cookies)
//!
//! ## Optional
//! - `BOOKSHELF_HOST` - Bind address (default: 127.0.0.1)
//! - `BOOKSHELF_PORT` - Listen port (default: 3000)
//! - `BOOKSHELF_STORAGE_ROOT` - Thumbnail storage directory (default: storage/public)
//! - `BOOKSHELF_ASSET_BASE_URL` - Prefix for thumbnail URLs (default: `{base_url}/storage/`)
//! - `BOOKSHELF_PER_PAGE` - Default page size (default: 10)
//! - `BOOKSHELF_MAX_PER_PAGE` - Largest page size a client may request (default: 50)
//! - `BOOKSHELF_MAX_UPLOAD_KB` - Largest accepted thumbnail (default: 2048)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, without a trailing slash
    pub base_url: String,
    /// Catalog behaviour: paging, uploads, asset URLs
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Page size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    /// Size used when the client sends none
    pub per_page: u32,
    /// Requests above this are clamped to it
    pub max_per_page: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            per_page: 10,
            max_per_page: 50,
        }
    }
}

/// Catalog settings shared by the services and routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub pagination: PaginationConfig,
    /// Directory thumbnails are written under
    pub storage_root: PathBuf,
    /// Sub-directory of `storage_root` for book thumbnails
    pub thumbnail_dir: String,
    /// Accepted thumbnail MIME types
    pub allowed_mime_types: Vec<String>,
    /// Largest accepted thumbnail in bytes
    pub max_upload_bytes: usize,
    /// Prepended to stored thumbnail paths to form public URLs
    pub asset_base_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            pagination: PaginationConfig::default(),
            storage_root: PathBuf::from("storage/public"),
            thumbnail_dir: "books/thumbnails".to_owned(),
            allowed_mime_types: ["image/jpeg", "image/png", "image/jpg", "image/webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_upload_bytes: 2048 * 1024,
            asset_base_url: "/storage/".to_owned(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BOOKSHELF_DATABASE_URL")?;
        let host = parse_env_or("BOOKSHELF_HOST", "127.0.0.1")?;
        let port = parse_env_or("BOOKSHELF_PORT", "3000")?;
        let base_url = normalize_base_url("BOOKSHELF_BASE_URL", &get_required_env("BOOKSHELF_BASE_URL")?)?;
        let catalog = CatalogConfig::from_env(&base_url)?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            catalog,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl CatalogConfig {
    fn from_env(base_url: &str) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let per_page: u32 = parse_env_or("BOOKSHELF_PER_PAGE", "10")?;
        let max_per_page: u32 = parse_env_or("BOOKSHELF_MAX_PER_PAGE", "50")?;
        if per_page == 0 {
            return Err(invalid("BOOKSHELF_PER_PAGE", "must be at least 1"));
        }
        if max_per_page < per_page {
            return Err(invalid(
                "BOOKSHELF_MAX_PER_PAGE",
                "must not be smaller than BOOKSHELF_PER_PAGE",
            ));
        }

        let max_upload_kb: usize = parse_env_or("BOOKSHELF_MAX_UPLOAD_KB", "2048")?;
        let asset_base_url = get_optional_env("BOOKSHELF_ASSET_BASE_URL")
            .unwrap_or_else(|| format!("{base_url}/storage/"));

        Ok(Self {
            pagination: PaginationConfig {
                per_page,
                max_per_page,
            },
            storage_root: PathBuf::from(get_env_or_default(
                "BOOKSHELF_STORAGE_ROOT",
                "storage/public",
            )),
            max_upload_bytes: max_upload_kb.saturating_mul(1024),
            asset_base_url: with_trailing_slash(asset_base_url),
            ..defaults
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, or the default when unset.
fn parse_env_or<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| invalid(key, e))
}

fn invalid(key: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), reason.to_string())
}

/// Check the URL parses and drop any trailing slash.
fn normalize_base_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| invalid(key, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(key, "must be an http or https URL"));
    }
    Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn with_trailing_slash(mut value: String) -> String {
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}
