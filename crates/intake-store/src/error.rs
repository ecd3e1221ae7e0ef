use std::path::PathBuf;

use intake_core::CaseId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("case not found: {0}")]
    NotFound(CaseId),

    #[error("snapshot I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}
