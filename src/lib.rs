pub mod analyzer;
pub mod backend;
pub mod config;
pub mod intake;
pub mod models;
pub mod store;

pub use analyzer::{GeminiAnalyzer, ReviewAnalyzer};
pub use backend::{Backend, BackendError, LocalFileBackend, RemoteDocumentBackend, StorageBackend};
pub use config::{Config, StorageMode};
pub use intake::{render_report, Intake, Submission};
pub use models::*;
pub use store::{ReviewStore, StoreError};
