//! Cloud sync: remote snapshot storage, the sign-in restore gate, and the
//! debounced push coordinator.

pub mod auth;
pub mod coordinator;
mod error;
pub mod marker;
pub mod remote;

pub use auth::{AuthState, RestoreState};
pub use coordinator::{SyncConfig, SyncCoordinator, SyncHandle};
pub use error::SyncError;
pub use marker::RestoreMarker;
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
