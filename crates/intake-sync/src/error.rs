use std::path::PathBuf;

use intake_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("snapshot error: {0}")]
    Snapshot(#[from] StoreError),
    #[error("invalid remote URL {0:?}")]
    InvalidUrl(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("sync coordinator has stopped")]
    Stopped,
}
