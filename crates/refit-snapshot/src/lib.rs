//! Point-in-time file snapshots and rollback.
//!
//! [`DirSnapshotStore`] copies files into a directory with a BLAKE3
//! checksum per copy and a JSON index; [`RollbackManager`] restores them
//! by id, by path or by set.

pub mod error;
pub mod lock;
pub mod rollback;
pub mod store;

pub use error::{RollbackError, SnapshotError};
pub use lock::{FileLocks, LockGuard};
pub use rollback::{RestoreReport, RestoreStatus, RollbackManager};
pub use store::{DirSnapshotStore, Snapshot, SnapshotSet, SnapshotStore};
