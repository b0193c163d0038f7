use std::path::PathBuf;
use std::time::Duration;

/// Failures raised by a catalog store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Catalog state error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown parent container {0}")]
    UnknownParent(uuid::Uuid),

    #[error("{0}")]
    Backend(String),
}

/// Everything that can abort an ingestion run.
///
/// Malformed rows never show up here; the parser skips them.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Download of {url} failed: {reason}")]
    DownloadFailure { url: String, reason: String },

    #[error("Dataset {path:?} is corrupt: {source}")]
    CorruptDataset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container for {path:?} did not materialize within {timeout:?}")]
    ContainerNotMaterialized { path: PathBuf, timeout: Duration },

    #[error("Store write failed: {0}")]
    StoreWriteFailure(#[source] StoreError),

    #[error("Catalog store request failed: {0}")]
    Store(#[source] StoreError),

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn download(url: &str, reason: impl std::fmt::Display) -> Self {
        IngestError::DownloadFailure {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable name of the failure, reported to the scheduler.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::DownloadFailure { .. } => "DownloadFailure",
            IngestError::CorruptDataset { .. } => "CorruptDataset",
            IngestError::ContainerNotMaterialized { .. } => "ContainerNotMaterialized",
            IngestError::StoreWriteFailure(_) => "StoreWriteFailure",
            IngestError::Store(_) => "StoreFailure",
            IngestError::Cancelled => "Cancelled",
            IngestError::Io { .. } => "Io",
        }
    }
}
