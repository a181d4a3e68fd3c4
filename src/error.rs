use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a run. Per-block and per-collaborator problems never
/// surface here; they are logged and absorbed where they happen.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no .md documents found in {}", .0.display())]
    NoDocuments(PathBuf),
    #[error("cannot read input directory {}: {source}", .path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("feedback store: {0}")]
    Feedback(#[from] rusqlite::Error),
}

impl MonitorError {
    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        MonitorError::Write {
            path: path.into(),
            source,
        }
    }
}
