use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use octocrab::Octocrab;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Backend, BackendError};
use crate::config::RemoteStorageConfig;

/// Review document kept as a file in a GitHub repository.
///
/// Reads go through the raw content host, which is cache-fronted and may lag
/// behind recent writes. Writes go through the contents API and carry the
/// blob sha fetched just before the PUT. That narrows the lost-update race
/// but does not close it: content read from a stale cache is written back
/// under a fresh sha, silently dropping whatever changed in between.
pub struct RemoteDocumentBackend {
    http: Client,
    github: Option<Octocrab>,
    token: Option<String>,
    config: RemoteStorageConfig,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RefQuery<'a> {
    r#ref: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContentVersion {
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateFileRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
    branch: &'a str,
}

impl RemoteDocumentBackend {
    /// Create a backend for the configured repository file.
    ///
    /// Without a token the backend still constructs, but every read and
    /// write fails with [`BackendError::MissingCredential`].
    pub fn new(
        config: RemoteStorageConfig,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if config.owner.is_empty() || config.repo.is_empty() {
            anyhow::bail!("Remote storage requires both storage.remote.owner and storage.remote.repo");
        }

        let token = token.filter(|t| !t.trim().is_empty());

        let github = match &token {
            Some(token) => Some(
                Octocrab::builder()
                    .personal_token(token.clone())
                    .base_uri(config.api_base_url.as_str())
                    .context("Invalid GitHub API base URL")?
                    .build()
                    .context("Failed to create GitHub client")?,
            ),
            None => {
                warn!("GITHUB_TOKEN not set, remote review storage is unavailable");
                None
            }
        };

        info!(
            owner = %config.owner,
            repo = %config.repo,
            path = %config.path,
            branch = %config.branch,
            "Initialized remote document backend"
        );

        Ok(Self {
            http: Client::new(),
            github,
            token,
            config,
            timeout,
        })
    }

    fn raw_url(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_base_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            self.config.branch,
            self.config.path.trim_start_matches('/')
        )
    }

    fn contents_route(&self) -> String {
        format!(
            "/repos/{}/{}/contents/{}",
            self.config.owner,
            self.config.repo,
            self.config.path.trim_start_matches('/')
        )
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, BackendError>>,
    ) -> Result<T, BackendError> {
        tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout.as_secs()))?
    }

    /// Current blob sha of the document, or `None` if it doesn't exist yet
    async fn current_version(&self, github: &Octocrab) -> Result<Option<String>, BackendError> {
        let query = RefQuery {
            r#ref: &self.config.branch,
        };

        match github
            .get::<ContentVersion, _, _>(self.contents_route(), Some(&query))
            .await
        {
            Ok(version) => Ok(Some(version.sha)),
            Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 404 => {
                debug!("Remote review document does not exist yet");
                Ok(None)
            }
            Err(e) => Err(map_github_error(e, None)),
        }
    }
}

fn map_github_error(err: octocrab::Error, sha: Option<&str>) -> BackendError {
    match err {
        octocrab::Error::GitHub { source, .. } => match source.status_code.as_u16() {
            409 | 422 => BackendError::Conflict {
                sha: sha.unwrap_or("none").to_string(),
            },
            status => BackendError::Remote(format!("{} ({})", source.message, status)),
        },
        other => BackendError::Remote(other.to_string()),
    }
}

impl Backend for RemoteDocumentBackend {
    async fn fetch_document(&self) -> Result<Vec<u8>, BackendError> {
        let token = self.token.as_ref().ok_or(BackendError::MissingCredential)?;
        let url = self.raw_url();

        self.bounded(async {
            let response = self
                .http
                .get(&url)
                .header("Authorization", format!("Bearer {}", token))
                .send()
                .await?;

            let status = response.status();
            if status.as_u16() == 404 {
                return Err(BackendError::NotFound(url.clone()));
            }
            if !status.is_success() {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }

            let bytes = response.bytes().await?;
            debug!(url = %url, bytes = bytes.len(), "Fetched remote review document");

            Ok(bytes.to_vec())
        })
        .await
    }

    async fn write_document(&self, bytes: &[u8]) -> Result<(), BackendError> {
        let github = self.github.as_ref().ok_or(BackendError::MissingCredential)?;

        let sha = self.bounded(self.current_version(github)).await?;

        let request = UpdateFileRequest {
            message: &self.config.commit_message,
            content: STANDARD.encode(bytes),
            sha: sha.clone(),
            branch: &self.config.branch,
        };

        self.bounded(async {
            github
                .put::<serde_json::Value, _, _>(self.contents_route(), Some(&request))
                .await
                .map_err(|e| map_github_error(e, sha.as_deref()))
        })
        .await?;

        info!(
            path = %self.config.path,
            previous_sha = sha.as_deref().unwrap_or("none"),
            bytes = bytes.len(),
            "Updated remote review document"
        );

        Ok(())
    }
}
