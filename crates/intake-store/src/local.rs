//! Durable local snapshot file.
//!
//! Writes go to a temporary file in the same directory and are then
//! renamed over the target, so a crash mid-write leaves the previous
//! snapshot intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{StoreError, StoreSnapshot};

#[derive(Debug, Clone)]
pub struct LocalSnapshotFile {
    path: PathBuf,
}

impl LocalSnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file is `None`, not an error.
    pub fn load(&self) -> Result<Option<StoreSnapshot>, StoreError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        StoreSnapshot::from_json(&json).map(Some)
    }

    /// Atomically replace the file with `snapshot`.
    pub fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;

        let json = snapshot.to_json_pretty()?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), cases = snapshot.cases.len(), "saved local snapshot");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
