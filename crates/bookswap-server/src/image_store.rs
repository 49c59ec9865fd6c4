//! Cover-image storage on disk.
//!
//! Uploaded images land in a flat uploads directory under a generated name
//! (`<uuid>.<ext>`) and are served read-only at `/uploads/...`.  Responses
//! carry absolute URLs resolved against the configured public base URL.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;

/// Verify that a resolved path stays within the expected base directory.
/// Prevents path traversal attacks.
fn ensure_within(base: &Path, target: &Path) -> Result<PathBuf, ApiError> {
    // Canonicalize base; target may not exist yet so normalize manually
    let canonical_base = base.canonicalize().unwrap_or_else(|_| base.to_path_buf());
    let mut resolved = canonical_base.clone();
    for component in target
        .strip_prefix(&canonical_base)
        .unwrap_or(target)
        .components()
    {
        match component {
            std::path::Component::Normal(c) => resolved.push(c),
            std::path::Component::ParentDir => {
                return Err(ApiError::BadRequest("Path traversal detected".to_string()));
            }
            _ => {} // RootDir, CurDir, Prefix — skip
        }
    }
    if !resolved.starts_with(&canonical_base) {
        return Err(ApiError::BadRequest("Path traversal detected".to_string()));
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_size: usize,
}

impl ImageStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ApiError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ApiError::Internal(format!(
                "Failed to create upload directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store an uploaded image and return its server-relative URL
    /// (`/uploads/<file>`).  The original file name contributes only its
    /// extension.
    pub async fn store(&self, data: &[u8], original_name: &str) -> Result<String, ApiError> {
        if data.is_empty() {
            return Err(ApiError::BadRequest("Empty image upload".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ApiError::BadRequest(format!(
                "Image too large: {} bytes (max {})",
                data.len(),
                self.max_size
            )));
        }

        let file_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = ensure_within(&self.base_path, &self.base_path.join(&file_name))?;

        fs::write(&path, data).await.map_err(|e| {
            ApiError::Internal(format!("Failed to write image {}: {}", file_name, e))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored cover image");
        Ok(format!("/uploads/{file_name}"))
    }

    /// Remove the file behind a stored image URL (relative or absolute).
    /// Missing files are not an error: deletion is best-effort cleanup.
    pub async fn delete_by_url(&self, image_url: &str) -> Result<(), ApiError> {
        let Some(file_name) = file_name_from_url(image_url) else {
            return Ok(());
        };
        if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
            return Err(ApiError::BadRequest("Path traversal detected".to_string()));
        }

        let path = ensure_within(&self.base_path, &self.base_path.join(file_name))?;
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                ApiError::Internal(format!("Failed to delete image {}: {}", file_name, e))
            })?;
            debug!(file = %file_name, "Deleted cover image");
        }
        Ok(())
    }
}

/// Turn a stored server-relative image path into an absolute URL.  Already
/// absolute URLs pass through unchanged.
pub fn absolute_image_url(base_url: &str, image_url: &str) -> String {
    if image_url.starts_with("http://") || image_url.starts_with("https://") {
        return image_url.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if image_url.starts_with('/') {
        format!("{base}{image_url}")
    } else {
        format!("{base}/{image_url}")
    }
}

/// The last path segment of a stored or absolute image URL.
fn file_name_from_url(url: &str) -> Option<&str> {
    let path = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .and_then(|rest| rest.find('/').map(|i| &rest[i..]))
        .unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    (!name.is_empty()).then_some(name)
}

/// Alphanumeric extension of at most 8 characters, lowercased.
fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (ImageStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn store_returns_uploads_url_and_writes_file() {
        let (store, _dir) = test_store().await;

        let url = store.store(b"fake-image-bytes", "cover.JPG").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".jpg"));

        let file = store.base_path().join(url.trim_start_matches("/uploads/"));
        assert_eq!(fs::read(&file).await.unwrap(), b"fake-image-bytes");
    }

    #[tokio::test]
    async fn delete_by_url_accepts_relative_and_absolute() {
        let (store, _dir) = test_store().await;

        let url = store.store(b"bytes", "cover.png").await.unwrap();
        let absolute = format!("http://localhost:8080{url}");
        store.delete_by_url(&absolute).await.unwrap();

        let file = store.base_path().join(url.trim_start_matches("/uploads/"));
        assert!(!file.exists());

        // Deleting again is a no-op, not an error.
        store.delete_by_url(&url).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_and_empty_uploads_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().to_path_buf(), 8).await.unwrap();

        assert!(store.store(b"", "cover.png").await.is_err());
        assert!(store.store(b"123456789", "cover.png").await.is_err());
    }

    #[tokio::test]
    async fn traversal_in_delete_is_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store.delete_by_url("/uploads/..").await.is_err());
        assert!(store.delete_by_url("/uploads/..file").await.is_err());

        // Only the last segment is ever used, so a dotted path cannot
        // escape the uploads directory.
        store.delete_by_url("/uploads/../passwd").await.unwrap();
    }

    #[test]
    fn extension_sanitizing() {
        assert_eq!(sanitized_extension("a.png"), Some("png".to_string()));
        assert_eq!(sanitized_extension("a.JPG"), Some("jpg".to_string()));
        assert_eq!(sanitized_extension("noext"), None);
        assert_eq!(sanitized_extension("weird.p~g"), None);
        assert_eq!(sanitized_extension("long.verylongext"), None);
    }

    #[test]
    fn absolute_url_resolution() {
        assert_eq!(
            absolute_image_url("http://localhost:8080", "/uploads/a.png"),
            "http://localhost:8080/uploads/a.png"
        );
        assert_eq!(
            absolute_image_url("http://localhost:8080/", "uploads/a.png"),
            "http://localhost:8080/uploads/a.png"
        );
        assert_eq!(
            absolute_image_url("http://localhost:8080", "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }
}
