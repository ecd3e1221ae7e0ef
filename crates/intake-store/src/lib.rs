//! Case store: the authoritative collection of cases, its change observers,
//! and the snapshot document used for local durability and cloud sync.

mod error;
pub mod local;
pub mod snapshot;
pub mod store;

pub use error::StoreError;
pub use local::LocalSnapshotFile;
pub use snapshot::{SNAPSHOT_VERSION, StoreSnapshot};
pub use store::{CaseStore, StoreEvent, SubscriptionId};
