pub mod local;
pub mod remote;

pub use local::LocalFileBackend;
pub use remote::RemoteDocumentBackend;

use std::future::Future;

use anyhow::Result;
use thiserror::Error;

use crate::config::{StorageConfig, StorageMode};

/// Why a backend could not read or write the document
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no document at {0}")]
    NotFound(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("remote API error: {0}")]
    Remote(String),

    #[error("document changed since version {sha} was read")]
    Conflict { sha: String },

    #[error("no access credential configured")]
    MissingCredential,

    #[error("request timed out after {0} seconds")]
    Timeout(u64),
}

/// Durable storage for the review document; always reads and writes the whole blob
pub trait Backend: Send + Sync {
    /// Fetch the full document
    fn fetch_document(&self) -> impl Future<Output = Result<Vec<u8>, BackendError>> + Send;

    /// Replace the full document
    fn write_document(
        &self,
        bytes: &[u8],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Backend variant chosen from configuration at runtime
pub enum StorageBackend {
    Local(LocalFileBackend),
    Remote(RemoteDocumentBackend),
}

impl StorageBackend {
    /// Build the backend the configuration asks for.
    ///
    /// A missing remote credential is not an error here; the remote backend
    /// then fails every read and write instead.
    pub fn from_config(config: &StorageConfig, token: Option<String>) -> Result<Self> {
        match config.mode {
            StorageMode::Local => Ok(Self::Local(LocalFileBackend::new(&config.local.path)?)),
            StorageMode::Remote => Ok(Self::Remote(RemoteDocumentBackend::new(
                config.remote.clone(),
                token,
                config.timeout(),
            )?)),
        }
    }
}

impl Backend for StorageBackend {
    async fn fetch_document(&self) -> Result<Vec<u8>, BackendError> {
        match self {
            Self::Local(local) => local.fetch_document().await,
            Self::Remote(remote) => remote.fetch_document().await,
        }
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), BackendError> {
        match self {
            Self::Local(local) => local.write_document(bytes).await,
            Self::Remote(remote) => remote.write_document(bytes).await,
        }
    }
}
