use refit_common::FsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot snapshot {0}: file does not exist")]
    SourceMissing(PathBuf),

    #[error("Snapshot {0} not found")]
    NotFound(String),

    #[error("Checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{0} is locked by another refit run")]
    Locked(PathBuf),

    #[error("Snapshot index {path} is unusable: {reason}")]
    Index { path: PathBuf, reason: String },

    #[error(transparent)]
    Write(#[from] FsError),
}

/// Rollback failures. Always fatal to the caller; never retried.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("No snapshot available: {0}")]
    NoSnapshot(String),

    #[error("CRITICAL: restore of {path} failed: {source}. Manual intervention required.")]
    Restore {
        path: PathBuf,
        #[source]
        source: SnapshotError,
    },
}
