//! Thumbnail blob storage on local disk.
//!
//! Files live under `storage_root/thumbnail_dir` with random names and are
//! referenced from the database by their path relative to `storage_root`.
//! The same root is served at `/storage`, so a stored path appended to the
//! asset base URL is the public URL.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use bookshelf_core::ValidationErrors;

use crate::config::CatalogConfig;

/// Blob store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored path tried to escape the storage root.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),
}

/// An uploaded file as received, before validation.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedThumbnail {
    extension: &'static str,
    bytes: Vec<u8>,
}

impl ValidatedThumbnail {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.extension
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageKind {
    Jpeg,
    Png,
    Webp,
}

impl ImageKind {
    fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            _ => None,
        }
    }

    const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// Check an upload against the allowed types and size limit.
///
/// The declared content type must be on the allow-list and the bytes must
/// actually look like that kind of image.
///
/// # Errors
///
/// Returns [`ValidationErrors`] under `thumbnail` for empty, oversized,
/// disallowed or non-image uploads.
pub fn validate_thumbnail(
    upload: ThumbnailUpload,
    config: &CatalogConfig,
) -> Result<ValidatedThumbnail, ValidationErrors> {
    const FIELD: &str = "thumbnail";

    if upload.bytes.is_empty() {
        return Err(ValidationErrors::single(FIELD, "The thumbnail failed to upload."));
    }

    if upload.bytes.len() > config.max_upload_bytes {
        return Err(ValidationErrors::single(
            FIELD,
            format!(
                "The thumbnail field must not be greater than {} kilobytes.",
                config.max_upload_bytes / 1024
            ),
        ));
    }

    let Some(sniffed) = ImageKind::sniff(&upload.bytes) else {
        return Err(ValidationErrors::single(FIELD, "The thumbnail field must be an image."));
    };

    let declared = upload
        .content_type
        .as_deref()
        .map(|m| m.trim().to_ascii_lowercase());
    let allowed = declared.as_deref().is_some_and(|mime| {
        config.allowed_mime_types.iter().any(|a| a == mime)
            && ImageKind::from_mime(mime) == Some(sniffed)
    });
    if !allowed {
        let types: Vec<&str> = config
            .allowed_mime_types
            .iter()
            .map(|m| m.trim_start_matches("image/"))
            .collect();
        return Err(ValidationErrors::single(
            FIELD,
            format!("The thumbnail field must be a file of type: {}.", types.join(", ")),
        ));
    }

    Ok(ValidatedThumbnail {
        extension: sniffed.extension(),
        bytes: upload.bytes,
    })
}

/// Local-disk thumbnail store.
#[derive(Debug, Clone)]
pub struct ThumbnailStorage {
    root: PathBuf,
    dir: String,
}

impl ThumbnailStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dir: dir.into().trim_matches('/').to_owned(),
        }
    }

    #[must_use]
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.storage_root, &config.thumbnail_dir)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a thumbnail and return its path relative to the root.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory or file cannot be written.
    pub async fn store(&self, thumbnail: &ValidatedThumbnail) -> Result<String, StorageError> {
        let dir = self.root.join(&self.dir);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", Uuid::new_v4().simple(), thumbnail.extension);
        tokio::fs::write(dir.join(&name), &thumbnail.bytes).await?;

        let path = format!("{}/{name}", self.dir);
        tracing::info!(path = %path, bytes = thumbnail.bytes.len(), "Stored thumbnail");
        Ok(path)
    }

    /// Remove a stored thumbnail. Missing files are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] for paths that leave the root and
    /// [`StorageError::Io`] for other filesystem failures.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                tracing::info!(path = %path, "Deleted thumbnail");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path, "Thumbnail already missing");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if safe {
            Ok(self.root.join(relative))
        } else {
            Err(StorageError::InvalidPath(path.to_owned()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn upload(content_type: &str, bytes: &[u8]) -> ThumbnailUpload {
        ThumbnailUpload {
            file_name: Some("cover".to_owned()),
            content_type: Some(content_type.to_owned()),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_accepts_allowed_image() {
        let valid = validate_thumbnail(upload("image/png", PNG), &CatalogConfig::default()).unwrap();
        assert_eq!(valid.extension(), "png");
    }

    #[test]
    fn test_rejects_mismatched_or_disallowed_types() {
        let config = CatalogConfig::default();
        assert!(validate_thumbnail(upload("image/jpeg", PNG), &config).is_err());
        assert!(validate_thumbnail(upload("image/gif", b"GIF89a....."), &config).is_err());
        assert!(validate_thumbnail(upload("image/png", b"plain text"), &config).is_err());
        assert!(validate_thumbnail(upload("image/png", b""), &config).is_err());
    }

    #[test]
    fn test_rejects_oversized_upload() {
        let config = CatalogConfig {
            max_upload_bytes: 8,
            ..CatalogConfig::default()
        };
        let errors = validate_thumbnail(upload("image/png", PNG), &config).unwrap_err();
        assert_eq!(
            errors.messages("thumbnail"),
            ["The thumbnail field must not be greater than 0 kilobytes."]
        );
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ThumbnailStorage::new(tmp.path(), "books/thumbnails");
        let valid = validate_thumbnail(upload("image/png", PNG), &CatalogConfig::default()).unwrap();

        let path = storage.store(&valid).await.unwrap();
        assert!(path.starts_with("books/thumbnails/"));
        assert!(path.ends_with(".png"));
        assert_eq!(std::fs::read(tmp.path().join(&path)).unwrap(), PNG);

        storage.delete(&path).await.unwrap();
        assert!(!tmp.path().join(&path).exists());

        // Second delete is a no-op.
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_refuses_escaping_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = ThumbnailStorage::new(tmp.path(), "books/thumbnails");
        for path in ["../secret", "/etc/passwd", "", "books/../../x"] {
            assert!(matches!(
                storage.delete(path).await,
                Err(StorageError::InvalidPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_store_fails_when_root_is_a_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let storage = ThumbnailStorage::new(tmp.path(), "books/thumbnails");
        let valid = validate_thumbnail(upload("image/png", PNG), &CatalogConfig::default()).unwrap();
        assert!(matches!(storage.store(&valid).await, Err(StorageError::Io(_))));
    }
}
