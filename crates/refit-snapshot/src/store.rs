//! Checksummed point-in-time file backups.
//!
//! Snapshot files live flat in the store directory as
//! `<filename>.backup.<UTC timestamp>`. `index.json` maps each copy back
//! to its original path and holds sets and restore bookkeeping; it is
//! rewritten atomically under its own lock.

use crate::error::SnapshotError;
use crate::lock::FileLocks;
use chrono::{DateTime, Utc};
use refit_common::config::{ChecksumPolicy, RefitConfig, SnapshotSettings};
use refit_common::fs_utils::{atomic_write, file_key};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const LOCK_DIR: &str = "locks";

/// An immutable copy of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    pub original: PathBuf,
    pub location: PathBuf,
    /// BLAKE3 of the content, hex.
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    /// Tie-break for snapshots created within the same clock tick.
    pub sequence: u64,
}

/// Snapshots taken together for one plan, one per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSet {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub members: Vec<Uuid>,
}

pub trait SnapshotStore: Send + Sync {
    /// Copy `file` into the store and apply retention for its path.
    fn create(&self, file: &Path) -> Result<Snapshot, SnapshotError>;

    /// One snapshot per distinct file. All or nothing.
    fn create_set(&self, files: &[PathBuf]) -> Result<SnapshotSet, SnapshotError>;

    /// Overwrite the original with the stored copy, verifying checksums.
    fn restore(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    fn get(&self, id: Uuid) -> Result<Snapshot, SnapshotError>;

    fn latest_for(&self, path: &Path) -> Result<Option<Snapshot>, SnapshotError>;

    /// Snapshots of `path`, newest first.
    fn list_for(&self, path: &Path) -> Result<Vec<Snapshot>, SnapshotError>;

    /// Every snapshot in the store, newest first.
    fn list_all(&self) -> Result<Vec<Snapshot>, SnapshotError>;

    fn set(&self, id: Uuid) -> Result<SnapshotSet, SnapshotError>;

    fn delete(&self, id: Uuid) -> Result<(), SnapshotError>;

    /// Keep the `keep` newest snapshots of `path`; returns the ids deleted.
    /// Members of a set created by this store are kept until released.
    fn retain(&self, path: &Path, keep: usize) -> Result<Vec<Uuid>, SnapshotError>;

    fn mark_restored(&self, id: Uuid) -> Result<(), SnapshotError>;

    fn restored_at(&self, id: Uuid) -> Result<Option<DateTime<Utc>>, SnapshotError>;

    /// Lift retention protection from the members of `set_id`.
    fn release_set(&self, set_id: Uuid);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    #[serde(default)]
    next_sequence: u64,
    #[serde(default)]
    snapshots: Vec<Snapshot>,
    #[serde(default)]
    sets: Vec<SnapshotSet>,
    #[serde(default)]
    restored: BTreeMap<Uuid, DateTime<Utc>>,
}

/// Directory-backed store. One instance per run; nothing global.
pub struct DirSnapshotStore {
    dir: PathBuf,
    keep: usize,
    policy: ChecksumPolicy,
    locks: FileLocks,
    pinned: Mutex<HashSet<Uuid>>,
    // keeps a temporary store alive for the lifetime of the instance
    _temp: Option<TempDir>,
}

impl DirSnapshotStore {
    pub fn open(dir: impl Into<PathBuf>, settings: &SnapshotSettings) -> Result<Self, SnapshotError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| SnapshotError::Io {
            path: dir.clone(),
            source: e,
        })?;
        tracing::debug!("Snapshot store at {}", dir.display());
        Ok(Self {
            locks: FileLocks::new(dir.join(LOCK_DIR), settings.lock_stale_after()),
            keep: settings.keep(),
            policy: settings.checksum_policy(),
            pinned: Mutex::new(HashSet::new()),
            dir,
            _temp: None,
        })
    }

    /// Store rooted at the configured directory for `project_root`.
    pub fn from_config(project_root: &Path, config: &RefitConfig) -> Result<Self, SnapshotError> {
        Self::open(config.snapshots.dir(project_root), &config.snapshots)
    }

    /// Store in a fresh temporary directory, removed on drop.
    pub fn temporary(settings: &SnapshotSettings) -> Result<Self, SnapshotError> {
        let temp = TempDir::new().map_err(|e| SnapshotError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;
        let mut store = Self::open(temp.path().to_path_buf(), settings)?;
        store._temp = Some(temp);
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    fn load_index(&self) -> Result<Index, SnapshotError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(Index::default());
        }
        let raw = fs::read(&path).map_err(|e| SnapshotError::Io {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_slice(&raw).map_err(|e| SnapshotError::Index {
            path,
            reason: e.to_string(),
        })
    }

    fn read_index(&self) -> Result<Index, SnapshotError> {
        let _guard = self.locks.acquire(&self.index_path())?;
        self.load_index()
    }

    /// Read-modify-write of the index under its lock.
    fn update_index<T>(
        &self,
        change: impl FnOnce(&mut Index) -> Result<T, SnapshotError>,
    ) -> Result<T, SnapshotError> {
        let path = self.index_path();
        let _guard = self.locks.acquire(&path)?;
        let mut index = self.load_index()?;
        let out = change(&mut index)?;
        let bytes = serde_json::to_vec_pretty(&index).map_err(|e| SnapshotError::Index {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        atomic_write(&path, &bytes)?;
        Ok(out)
    }

    /// `<dir>/<filename>.backup.<timestamp>`, with `-N` on collision.
    fn location_for(&self, original: &Path, at: DateTime<Utc>) -> PathBuf {
        let file_name = original
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let base = format!("{file_name}.backup.{}", at.format("%Y%m%dT%H%M%S%.9fZ"));
        let mut candidate = self.dir.join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{base}-{n}"));
            n += 1;
        }
        candidate
    }

    fn checksum_mismatch(&self, path: &Path, expected: &str, actual: &str) -> Result<(), SnapshotError> {
        match self.policy {
            ChecksumPolicy::Strict => Err(SnapshotError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            }),
            ChecksumPolicy::Advisory => {
                tracing::warn!(
                    "Checksum mismatch for {} (expected {}, found {}); continuing",
                    path.display(),
                    expected,
                    actual
                );
                Ok(())
            }
        }
    }

    fn remove_copy(location: &Path) -> Result<(), SnapshotError> {
        match fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotError::Io {
                path: location.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.sequence.cmp(&a.sequence))
    });
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

impl SnapshotStore for DirSnapshotStore {
    fn create(&self, file: &Path) -> Result<Snapshot, SnapshotError> {
        let original = file_key(file);
        if !original.is_file() {
            return Err(SnapshotError::SourceMissing(file.to_path_buf()));
        }

        let snapshot = {
            let _guard = self.locks.acquire(&original)?;
            let bytes = fs::read(&original).map_err(|e| SnapshotError::Io {
                path: original.clone(),
                source: e,
            })?;
            let created_at = Utc::now();
            let location = self.location_for(&original, created_at);
            atomic_write(&location, &bytes)?;

            let recorded = self.update_index(|index| {
                let snapshot = Snapshot {
                    id: Uuid::new_v4(),
                    original: original.clone(),
                    location: location.clone(),
                    checksum: checksum(&bytes),
                    created_at,
                    size: bytes.len() as u64,
                    sequence: index.next_sequence,
                };
                index.next_sequence += 1;
                index.snapshots.push(snapshot.clone());
                Ok(snapshot)
            });
            match recorded {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    let _ = Self::remove_copy(&location);
                    return Err(e);
                }
            }
        };

        tracing::info!(
            "Snapshot {} of {} ({} bytes)",
            snapshot.id,
            snapshot.original.display(),
            snapshot.size
        );
        self.retain(&original, self.keep)?;
        Ok(snapshot)
    }

    fn create_set(&self, files: &[PathBuf]) -> Result<SnapshotSet, SnapshotError> {
        let mut seen = Vec::new();
        let mut members: Vec<Snapshot> = Vec::new();
        for file in files {
            let key = file_key(file);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            match self.create(file) {
                Ok(snapshot) => members.push(snapshot),
                Err(e) => {
                    tracing::error!("Snapshot of {} failed, discarding set: {}", file.display(), e);
                    for created in &members {
                        if let Err(cleanup) = self.delete(created.id) {
                            tracing::warn!("Failed to discard snapshot {}: {}", created.id, cleanup);
                        }
                    }
                    return Err(e);
                }
            }
        }

        let set = SnapshotSet {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            members: members.iter().map(|s| s.id).collect(),
        };
        self.update_index(|index| {
            index.sets.push(set.clone());
            Ok(())
        })?;
        if let Ok(mut pinned) = self.pinned.lock() {
            pinned.extend(set.members.iter().copied());
        }
        tracing::info!("Snapshot set {} covers {} file(s)", set.id, set.members.len());
        Ok(set)
    }

    fn restore(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let _guard = self.locks.acquire(&snapshot.original)?;
        let bytes = fs::read(&snapshot.location).map_err(|e| SnapshotError::Io {
            path: snapshot.location.clone(),
            source: e,
        })?;
        let stored = checksum(&bytes);
        if stored != snapshot.checksum {
            self.checksum_mismatch(&snapshot.location, &snapshot.checksum, &stored)?;
        }

        atomic_write(&snapshot.original, &bytes)?;

        let written = fs::read(&snapshot.original).map_err(|e| SnapshotError::Io {
            path: snapshot.original.clone(),
            source: e,
        })?;
        let actual = checksum(&written);
        if actual != stored {
            self.checksum_mismatch(&snapshot.original, &stored, &actual)?;
        }
        tracing::info!(
            "Restored {} from snapshot {}",
            snapshot.original.display(),
            snapshot.id
        );
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Snapshot, SnapshotError> {
        self.read_index()?
            .snapshots
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SnapshotError::NotFound(id.to_string()))
    }

    fn latest_for(&self, path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
        Ok(self.list_for(path)?.into_iter().next())
    }

    fn list_for(&self, path: &Path) -> Result<Vec<Snapshot>, SnapshotError> {
        let key = file_key(path);
        let mut matching: Vec<Snapshot> = self
            .read_index()?
            .snapshots
            .into_iter()
            .filter(|s| s.original == key)
            .collect();
        newest_first(&mut matching);
        Ok(matching)
    }

    fn list_all(&self) -> Result<Vec<Snapshot>, SnapshotError> {
        let mut all = self.read_index()?.snapshots;
        newest_first(&mut all);
        Ok(all)
    }

    fn set(&self, id: Uuid) -> Result<SnapshotSet, SnapshotError> {
        self.read_index()?
            .sets
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SnapshotError::NotFound(format!("set {id}")))
    }

    fn delete(&self, id: Uuid) -> Result<(), SnapshotError> {
        let removed = self.update_index(|index| {
            let position = index
                .snapshots
                .iter()
                .position(|s| s.id == id)
                .ok_or_else(|| SnapshotError::NotFound(id.to_string()))?;
            index.restored.remove(&id);
            Ok(index.snapshots.remove(position))
        })?;
        Self::remove_copy(&removed.location)?;
        tracing::debug!("Deleted snapshot {} of {}", id, removed.original.display());
        Ok(())
    }

    fn retain(&self, path: &Path, keep: usize) -> Result<Vec<Uuid>, SnapshotError> {
        let pinned = self
            .pinned
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        let expired: Vec<Uuid> = self
            .list_for(path)?
            .into_iter()
            .skip(keep)
            .map(|s| s.id)
            .filter(|id| !pinned.contains(id))
            .collect();
        for id in &expired {
            self.delete(*id)?;
        }
        if !expired.is_empty() {
            tracing::debug!(
                "Retention removed {} snapshot(s) of {}",
                expired.len(),
                path.display()
            );
        }
        Ok(expired)
    }

    fn mark_restored(&self, id: Uuid) -> Result<(), SnapshotError> {
        self.update_index(|index| {
            if !index.snapshots.iter().any(|s| s.id == id) {
                return Err(SnapshotError::NotFound(id.to_string()));
            }
            index.restored.insert(id, Utc::now());
            Ok(())
        })
    }

    fn restored_at(&self, id: Uuid) -> Result<Option<DateTime<Utc>>, SnapshotError> {
        Ok(self.read_index()?.restored.get(&id).copied())
    }

    fn release_set(&self, set_id: Uuid) {
        let members = match self.set(set_id) {
            Ok(set) => set.members,
            Err(e) => {
                tracing::debug!("Nothing to release for set {}: {}", set_id, e);
                return;
            }
        };
        if let Ok(mut pinned) = self.pinned.lock() {
            for id in &members {
                pinned.remove(id);
            }
        }
    }
}
