use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::{Backend, BackendError};

/// Review document kept in a single JSON file on local disk
pub struct LocalFileBackend {
    path: PathBuf,
}

impl LocalFileBackend {
    /// Open the document at `path`, seeding an empty array if the file doesn't exist yet
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create storage directory: {}", parent.display())
            })?;
        }

        if !path.exists() {
            fs::write(&path, "[]")
                .with_context(|| format!("Failed to create review document: {}", path.display()))?;
            info!(path = %path.display(), "Created empty review document");
        }

        info!(path = %path.display(), "Initialized local file backend");

        Ok(Self { path })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> BackendError {
        BackendError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl Backend for LocalFileBackend {
    async fn fetch_document(&self) -> Result<Vec<u8>, BackendError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Self::io_error(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Read review document");

        Ok(bytes)
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), BackendError> {
        // Readers see either the old or the new file, never a partial write
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| Self::io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| Self::io_error(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "Wrote review document");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_creates_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("reviews.json");

        let backend = LocalFileBackend::new(&path).unwrap();

        assert!(path.exists());
        assert_eq!(backend.fetch_document().await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_existing_document_is_not_reset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        fs::write(&path, r#"[{"user_rating": 3}]"#).unwrap();

        let backend = LocalFileBackend::new(&path).unwrap();

        assert_eq!(
            backend.fetch_document().await.unwrap(),
            br#"[{"user_rating": 3}]"#
        );
    }

    #[tokio::test]
    async fn test_write_replaces_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        let backend = LocalFileBackend::new(&path).unwrap();

        backend.write_document(b"[1, 2]").await.unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"[1, 2]");
        assert!(!dir.path().join("reviews.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_after_init_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reviews.json");
        let backend = LocalFileBackend::new(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let err = backend.fetch_document().await.unwrap_err();
        assert!(matches!(err, BackendError::Io { .. }));
    }
}
