//! Restoring originals from the snapshot store.
//!
//! Every failure here is a `RollbackError`. Nothing is retried.

use crate::error::{RollbackError, SnapshotError};
use crate::store::{Snapshot, SnapshotStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStatus {
    Restored,
    /// Already restored earlier and not forced; the file was left alone.
    AlreadyRestored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub snapshot_id: Uuid,
    pub path: PathBuf,
    pub status: RestoreStatus,
}

pub struct RollbackManager {
    store: Arc<dyn SnapshotStore>,
}

impl RollbackManager {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Snapshots of `path`, newest first.
    pub fn list(&self, path: &Path) -> Result<Vec<Snapshot>, RollbackError> {
        self.store
            .list_for(path)
            .map_err(|e| restore_error(path, e))
    }

    pub fn restore_id(&self, id: Uuid, force: bool) -> Result<RestoreReport, RollbackError> {
        let snapshot = match self.store.get(id) {
            Ok(s) => s,
            Err(SnapshotError::NotFound(_)) => {
                return Err(RollbackError::NoSnapshot(format!("no snapshot with id {id}")))
            }
            Err(e) => return Err(restore_error(Path::new(&id.to_string()), e)),
        };
        self.restore(&snapshot, force)
    }

    pub fn restore_latest(&self, path: &Path, force: bool) -> Result<RestoreReport, RollbackError> {
        let snapshot = self
            .store
            .latest_for(path)
            .map_err(|e| restore_error(path, e))?
            .ok_or_else(|| RollbackError::NoSnapshot(format!("no snapshot of {}", path.display())))?;
        self.restore(&snapshot, force)
    }

    /// Restore every file of one set. All members are attempted; the first
    /// failure is returned after the rest have been tried.
    pub fn restore_set(&self, set_id: Uuid, force: bool) -> Result<Vec<RestoreReport>, RollbackError> {
        let set = match self.store.set(set_id) {
            Ok(s) => s,
            Err(SnapshotError::NotFound(_)) => {
                return Err(RollbackError::NoSnapshot(format!("no snapshot set {set_id}")))
            }
            Err(e) => return Err(restore_error(Path::new(&set_id.to_string()), e)),
        };
        tracing::warn!("Rolling back {} file(s) from set {}", set.members.len(), set_id);

        let mut reports = Vec::with_capacity(set.members.len());
        let mut first_error = None;
        for member in set.members {
            match self.restore_id(member, force) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!("{}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    fn restore(&self, snapshot: &Snapshot, force: bool) -> Result<RestoreReport, RollbackError> {
        let path = &snapshot.original;
        let previously = self
            .store
            .restored_at(snapshot.id)
            .map_err(|e| restore_error(path, e))?;
        if let (Some(at), false) = (previously, force) {
            tracing::info!(
                "Snapshot {} of {} already restored at {}",
                snapshot.id,
                path.display(),
                at
            );
            return Ok(RestoreReport {
                snapshot_id: snapshot.id,
                path: path.clone(),
                status: RestoreStatus::AlreadyRestored,
            });
        }

        self.store
            .restore(snapshot)
            .map_err(|e| restore_error(path, e))?;
        self.store
            .mark_restored(snapshot.id)
            .map_err(|e| restore_error(path, e))?;
        Ok(RestoreReport {
            snapshot_id: snapshot.id,
            path: path.clone(),
            status: RestoreStatus::Restored,
        })
    }
}

fn restore_error(path: &Path, source: SnapshotError) -> RollbackError {
    RollbackError::Restore {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DirSnapshotStore;
    use refit_common::config::SnapshotSettings;
    use std::fs;

    fn manager() -> (Arc<DirSnapshotStore>, RollbackManager) {
        let store = Arc::new(DirSnapshotStore::temporary(&SnapshotSettings::default()).unwrap());
        let manager = RollbackManager::new(store.clone());
        (store, manager)
    }

    #[test]
    fn test_restore_latest_and_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "before").unwrap();
        let (store, manager) = manager();
        store.create(&file).unwrap();

        fs::write(&file, "after").unwrap();
        let report = manager.restore_latest(&file, false).unwrap();
        assert_eq!(report.status, RestoreStatus::Restored);
        assert_eq!(fs::read_to_string(&file).unwrap(), "before");

        fs::write(&file, "again").unwrap();
        let repeat = manager.restore_latest(&file, false).unwrap();
        assert_eq!(repeat.status, RestoreStatus::AlreadyRestored);
        assert_eq!(fs::read_to_string(&file).unwrap(), "again");

        let forced = manager.restore_latest(&file, true).unwrap();
        assert_eq!(forced.status, RestoreStatus::Restored);
        assert_eq!(fs::read_to_string(&file).unwrap(), "before");
    }

    #[test]
    fn test_missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, manager) = manager();
        let err = manager
            .restore_latest(&dir.path().join("A.java"), false)
            .unwrap_err();
        assert!(matches!(err, RollbackError::NoSnapshot(_)));
        assert!(matches!(
            manager.restore_id(Uuid::new_v4(), false).unwrap_err(),
            RollbackError::NoSnapshot(_)
        ));
    }

    #[test]
    fn test_restore_set_restores_every_member() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("A.java");
        let b = dir.path().join("B.java");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();
        let (store, manager) = manager();
        let set = store.create_set(&[a.clone(), b.clone()]).unwrap();

        fs::write(&a, "changed").unwrap();
        fs::write(&b, "changed").unwrap();
        let reports = manager.restore_set(set.id, true).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(fs::read_to_string(&a).unwrap(), "a");
        assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    }

    #[test]
    fn test_restore_failure_is_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "before").unwrap();
        let (store, manager) = manager();
        let snapshot = store.create(&file).unwrap();
        fs::remove_file(&snapshot.location).unwrap();

        let err = manager.restore_id(snapshot.id, false).unwrap_err();
        assert!(matches!(err, RollbackError::Restore { .. }));
        assert!(err.to_string().starts_with("CRITICAL"));
    }
}
