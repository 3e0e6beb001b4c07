use crate::process::ProcessOutcome;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One compiler message scraped from build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub line: usize,
    /// 1-indexed; 0 when the tool did not report one.
    pub column: usize,
    pub message: String,
    pub severity: Severity,
}

/// Totals from a test run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub run: usize,
    pub failures: usize,
    pub errors: usize,
    pub skipped: usize,
}

impl TestCounts {
    pub fn passed(&self) -> usize {
        self.run
            .saturating_sub(self.failures + self.errors + self.skipped)
    }

    pub fn has_failures(&self) -> bool {
        self.failures + self.errors > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of one build or test step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    pub tool: Option<String>,
    pub command: Vec<String>,
    /// Why the step was skipped or failed.
    pub reason: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub tests: Option<TestCounts>,
    pub process: Option<ProcessOutcome>,
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            tool: None,
            command: Vec::new(),
            reason: Some(reason.into()),
            diagnostics: Vec::new(),
            tests: None,
            process: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }

    pub fn failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }
}
