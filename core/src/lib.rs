pub mod backup;
pub mod blob;
pub mod check;
pub mod error;
pub mod index;
pub mod prune;
pub mod repository;
pub mod restore;
pub mod snapshot;
pub mod types;

pub use backup::{SnapshotReport, snapshot, snapshot_with_progress};
pub use blob::BlobStore;
pub use check::{CheckReport, Problem, check};
pub use error::{Error, Result};
pub use index::SnapshotIndex;
pub use prune::{PruneReport, plan_prune, prune};
pub use repository::Repository;
pub use restore::{RestoreReport, restore, restore_with_progress};
pub use snapshot::Snapshot;
pub use types::*;
