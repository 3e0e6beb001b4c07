//! Per-target-file locking.
//!
//! A lock is held in two places: an in-process set guarded by a condvar,
//! and an exclusively created `<dir>/<blake3>.lock` file so separate
//! processes working on the same target serialize as well. Lock files
//! older than the stale window are assumed abandoned and broken.

use crate::error::SnapshotError;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_WAIT: Duration = Duration::from_secs(30);

pub struct FileLocks {
    dir: PathBuf,
    stale_after: Duration,
    wait: Duration,
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

/// Releases both halves of the lock on drop.
#[must_use]
pub struct LockGuard<'a> {
    locks: &'a FileLocks,
    key: PathBuf,
    lock_file: PathBuf,
}

impl FileLocks {
    pub fn new(dir: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            dir: dir.into(),
            stale_after,
            wait: DEFAULT_WAIT,
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// How long `acquire` waits before giving up with `Locked`.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lock file used for `key`.
    pub fn lock_file_for(&self, key: &Path) -> PathBuf {
        let digest = blake3::hash(key.to_string_lossy().as_bytes());
        self.dir.join(format!("{}.lock", digest.to_hex()))
    }

    pub fn acquire(&self, key: &Path) -> Result<LockGuard<'_>, SnapshotError> {
        let deadline = Instant::now() + self.wait;
        self.acquire_in_process(key, deadline)?;
        match self.acquire_file(key, deadline) {
            Ok(lock_file) => Ok(LockGuard {
                locks: self,
                key: key.to_path_buf(),
                lock_file,
            }),
            Err(e) => {
                self.release_in_process(key);
                Err(e)
            }
        }
    }

    fn acquire_in_process(&self, key: &Path, deadline: Instant) -> Result<(), SnapshotError> {
        let locked = || SnapshotError::Locked(key.to_path_buf());
        let mut held = self.held.lock().map_err(|_| locked())?;
        while held.contains(key) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(locked());
            }
            let (next, _) = self
                .released
                .wait_timeout(held, remaining)
                .map_err(|_| locked())?;
            held = next;
        }
        held.insert(key.to_path_buf());
        Ok(())
    }

    fn release_in_process(&self, key: &Path) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(key);
        }
        self.released.notify_all();
    }

    fn acquire_file(&self, key: &Path, deadline: Instant) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|e| SnapshotError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let lock_file = self.lock_file_for(key);
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_file)
            {
                Ok(mut file) => {
                    // holder pid, for humans inspecting a stuck lock
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(lock_file);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.is_stale(&lock_file) {
                        tracing::warn!("Breaking stale lock {} for {}", lock_file.display(), key.display());
                        let _ = fs::remove_file(&lock_file);
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(SnapshotError::Locked(key.to_path_buf()));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(SnapshotError::Io {
                        path: lock_file,
                        source: e,
                    })
                }
            }
        }
    }

    fn is_stale(&self, lock_file: &Path) -> bool {
        fs::metadata(lock_file)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > self.stale_after)
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_file) {
            tracing::warn!("Failed to remove lock {}: {}", self.lock_file.display(), e);
        }
        self.locks.release_in_process(&self.key);
    }
}
