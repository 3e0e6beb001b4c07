use refit_common::FsError;
use refit_snapshot::{RollbackError, SnapshotError};
use refit_surgeon::StrategyError;
use refit_verify::VerifyError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Write(#[from] FsError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No strategy named '{0}' is registered")]
    UnknownStrategy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Failures after which the workspace may be left inconsistent.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::Rollback(_))
    }
}
