pub mod command;

use crate::error::VerifyError;
use crate::process::ProcessOutcome;
use std::path::Path;
use std::time::Duration;

/// One external verification step (a compile or a test run).
#[async_trait::async_trait]
pub trait VerificationRunner: Send + Sync {
    fn name(&self) -> &str;

    /// The command line, for reporting.
    fn command(&self) -> Vec<String>;

    /// Configured run limit, excluding any kill grace period.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, project_root: &Path) -> Result<ProcessOutcome, VerifyError>;
}
