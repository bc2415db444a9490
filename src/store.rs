use std::path::Path;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::backend::{Backend, BackendError};
use crate::models::{AnalyticsSummary, NewReview, ReviewFilter, ReviewRecord};

/// Columns every export starts with, in this order, when any record has them
const CANONICAL_COLUMNS: [&str; 7] = [
    "id",
    "user_rating",
    "user_review",
    "ai_response",
    "ai_summary",
    "ai_recommended_action",
    "timestamp",
];

/// Why a store operation failed
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Backend(#[from] BackendError),

    #[error("review document is malformed: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("failed to serialize reviews: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("export to {path} failed: {reason}")]
    Export { path: String, reason: String },
}

/// Record-oriented view over a whole-document backend.
///
/// Nothing is cached between calls: every operation fetches the full
/// document first, so concurrent writers resolve as last-writer-wins.
pub struct ReviewStore<B: Backend> {
    backend: B,
    recent_window: usize,
}

impl<B: Backend> ReviewStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            recent_window: 10,
        }
    }

    /// Number of newest records carried by [`AnalyticsSummary::recent`]
    pub fn with_recent_window(mut self, recent_window: usize) -> Self {
        self.recent_window = recent_window;
        self
    }

    /// All stored reviews in append order; empty if the document can't be read
    pub async fn load_all(&self) -> Vec<ReviewRecord> {
        match self.try_load_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to load reviews, treating collection as empty");
                Vec::new()
            }
        }
    }

    pub async fn try_load_all(&self) -> Result<Vec<ReviewRecord>, StoreError> {
        let bytes = self.backend.fetch_document().await?;
        let records: Vec<ReviewRecord> =
            serde_json::from_slice(&bytes).map_err(StoreError::Malformed)?;

        debug!(count = records.len(), "Loaded reviews");

        Ok(records)
    }

    /// Append a review and persist the whole collection; true if the write went through
    pub async fn append(&self, review: NewReview) -> bool {
        match self.try_append(review).await {
            Ok(record) => {
                info!(id = ?record.id, rating = record.user_rating, "Saved review");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save review");
                false
            }
        }
    }

    /// Append a review, returning the stored record with its id and timestamp.
    ///
    /// A document that can't be read is never overwritten. A document that
    /// doesn't exist yet is created with this review as its first record.
    #[instrument(skip(self, review), fields(rating = review.user_rating))]
    pub async fn try_append(&self, review: NewReview) -> Result<ReviewRecord, StoreError> {
        let mut records = match self.try_load_all().await {
            Ok(records) => records,
            Err(StoreError::Backend(BackendError::NotFound(location))) => {
                info!(location = %location, "Review document not found, starting a new one");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let id = next_id(&records);
        let record = review.into_record(id, Utc::now().to_rfc3339());
        records.push(record.clone());

        let bytes = serde_json::to_vec_pretty(&records).map_err(StoreError::Serialize)?;
        self.backend.write_document(&bytes).await?;

        Ok(record)
    }

    /// Reviews matching the filter, in append order
    pub async fn list(&self, filter: &ReviewFilter) -> Vec<ReviewRecord> {
        self.list_with_total(filter).await.0
    }

    /// Matching reviews plus the size of the collection they were filtered
    /// from, both taken from the same read
    pub async fn list_with_total(&self, filter: &ReviewFilter) -> (Vec<ReviewRecord>, usize) {
        let records = self.load_all().await;
        let total = records.len();
        let matching = records.into_iter().filter(|r| filter.matches(r)).collect();
        (matching, total)
    }

    /// Statistics over the current collection, recomputed on every call
    pub async fn aggregate(&self) -> AnalyticsSummary {
        AnalyticsSummary::from_records(&self.load_all().await, self.recent_window)
    }

    /// Write the collection as CSV; false on any failure
    pub async fn export_delimited(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_export_delimited(path).await {
            Ok(rows) => {
                info!(path = %path.display(), rows, "Exported reviews to CSV");
                true
            }
            Err(e) => {
                warn!(error = %e, "CSV export failed");
                false
            }
        }
    }

    pub async fn try_export_delimited(&self, path: &Path) -> Result<usize, StoreError> {
        let records = self.try_load_all().await?;
        let export_error = |reason: String| StoreError::Export {
            path: path.display().to_string(),
            reason,
        };

        let content = render_csv(&records).map_err(export_error)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| export_error(e.to_string()))?;
        Ok(records.len())
    }

    /// Write the collection as a pretty-printed JSON array; false on any failure
    pub async fn export_json(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match self.try_export_json(path).await {
            Ok(rows) => {
                info!(path = %path.display(), rows, "Exported reviews to JSON");
                true
            }
            Err(e) => {
                warn!(error = %e, "JSON export failed");
                false
            }
        }
    }

    pub async fn try_export_json(&self, path: &Path) -> Result<usize, StoreError> {
        let records = self.try_load_all().await?;
        let content = serde_json::to_string_pretty(&records).map_err(StoreError::Serialize)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| StoreError::Export {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(records.len())
    }
}

/// One past the highest id seen; records without ids don't count
fn next_id(records: &[ReviewRecord]) -> u64 {
    records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1
}

/// Union of fields across records: canonical ones first, then extras by first appearance
fn export_columns(records: &[ReviewRecord]) -> Vec<String> {
    let has_id = records.iter().any(|r| r.id.is_some());

    let mut columns: Vec<String> = CANONICAL_COLUMNS
        .iter()
        .filter(|c| has_id || **c != "id")
        .map(|c| c.to_string())
        .collect();

    for record in records {
        for key in record.extra.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn render_csv(records: &[ReviewRecord]) -> Result<Vec<u8>, String> {
    let columns = export_columns(records);
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(&columns).map_err(|e| e.to_string())?;

    for record in records {
        let value = serde_json::to_value(record).map_err(|e| e.to_string())?;
        let row: Vec<String> = columns.iter().map(|c| cell(value.get(c))).collect();
        writer.write_record(&row).map_err(|e| e.to_string())?;
    }

    writer.into_inner().map_err(|e| e.to_string())
}
