use std::sync::Arc;

use intake_sync::MemoryRemoteStore;

use crate::SessionStore;

#[derive(Clone, Default)]
pub struct AppState {
    pub sessions: SessionStore,
    pub snapshots: Arc<MemoryRemoteStore>,
}

impl AppState {
    pub fn new(sessions: SessionStore) -> Self {
        Self {
            sessions,
            snapshots: Arc::new(MemoryRemoteStore::new()),
        }
    }
}
