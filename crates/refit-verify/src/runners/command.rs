use super::VerificationRunner;
use crate::error::VerifyError;
use crate::process::{ProcessOutcome, ProcessRunner};
use std::path::Path;
use std::time::Duration;

/// Runs a fixed argv in the project root.
pub struct CommandRunner {
    name: String,
    argv: Vec<String>,
    process: ProcessRunner,
}

impl CommandRunner {
    pub fn new(name: impl Into<String>, argv: Vec<String>, process: ProcessRunner) -> Self {
        Self {
            name: name.into(),
            argv,
            process,
        }
    }
}

#[async_trait::async_trait]
impl VerificationRunner for CommandRunner {
    fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> Vec<String> {
        self.argv.clone()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.process.policy().timeout)
    }

    async fn run(&self, project_root: &Path) -> Result<ProcessOutcome, VerifyError> {
        self.process.run(&self.argv, project_root).await
    }
}
