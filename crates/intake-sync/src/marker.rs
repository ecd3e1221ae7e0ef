//! Durable record of the last completed sign-in restore.
//!
//! A process that signs in, restores, and exits must not restore again the
//! next time it starts for the same user. The marker holds that user's id
//! beside the local snapshot file; a coordinator started with it begins in
//! the restored state.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{AuthState, RestoreState, SyncError};

#[derive(Debug, Clone)]
pub struct RestoreMarker {
    path: PathBuf,
}

impl RestoreMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The marker for a local snapshot file: `<data>.restored`.
    pub fn beside(data: &Path) -> Self {
        let mut path = OsString::from(data.as_os_str());
        path.push(".restored");
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The user whose restore has completed, if any.
    pub fn load(&self) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(&self.path) {
            Ok(user) => {
                let user = user.trim();
                Ok((!user.is_empty()).then(|| user.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    pub fn save(&self, user: &str) -> Result<(), SyncError> {
        std::fs::write(&self.path, user).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), user, "restore marker saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// The state a coordinator should start in.
    pub fn initial_state(&self) -> Result<AuthState, SyncError> {
        Ok(match self.load()? {
            Some(user) => AuthState::SignedIn {
                user,
                restore: RestoreState::Restored,
            },
            None => AuthState::Anonymous,
        })
    }

    fn io_error(&self, source: std::io::Error) -> SyncError {
        SyncError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
