use refit_common::fs_utils::file_key;
use refit_snapshot::RestoreReport;
use refit_surgeon::{DefectRecord, LineShift};
use refit_verify::{StepOutcome, ValidationOutcome};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// One defect bound to the strategy that will fix it.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    pub record: DefectRecord,
    pub strategy: &'static str,
    pub advisory: bool,
}

/// A record that could not be planned.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRecord {
    pub record: DefectRecord,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub actions: Vec<PlannedAction>,
    /// Auto-fixable records no strategy claimed.
    pub unmatched: Vec<DefectRecord>,
    pub rejected: Vec<RejectedRecord>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Distinct target files in order of first appearance.
    pub fn affected_files(&self) -> Vec<PathBuf> {
        let mut seen = Vec::new();
        let mut files = Vec::new();
        for action in &self.actions {
            let key = file_key(&action.record.file);
            if !seen.contains(&key) {
                seen.push(key);
                files.push(action.record.file.clone());
            }
        }
        files
    }

    /// Affected files of the actions that may write.
    pub fn mutating_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        for action in self.actions.iter().filter(|a| !a.advisory) {
            if !files.iter().any(|f| file_key(f) == file_key(&action.record.file)) {
                files.push(action.record.file.clone());
            }
        }
        files
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    Success,
    SuccessWithWarnings,
    CompilationFailed,
    Advisory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilationStatus {
    Passed,
    Failed,
    NotEvaluated,
}

/// How the candidate replaced the file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Declarations spliced between the original header and trailer.
    Structural,
    /// The whole file overwritten.
    Textual,
}

/// What the applicator did with one action.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyDetail {
    pub strategy: &'static str,
    pub file: PathBuf,
    pub description: String,
    pub status: ApplyStatus,
    pub compilation: CompilationStatus,
    pub validation: Option<ValidationOutcome>,
    pub merge: Option<MergeMode>,
    pub lines_before: usize,
    pub lines_after: usize,
    pub line_delta: isize,
    pub shifts: Vec<LineShift>,
    pub notes: Vec<String>,
    /// The file was put back after a failed validation.
    pub restored: bool,
    pub snapshot_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied { detail: ApplyDetail },
    Skipped { reason: String, detail: Option<ApplyDetail> },
    Failed { reason: String, detail: Option<ApplyDetail> },
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Line movements to carry forward to later actions on the same file.
    pub fn shifts(&self) -> &[LineShift] {
        match self {
            Self::Applied { detail } => &detail.shifts,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub index: usize,
    pub strategy: &'static str,
    /// The record as applied, with lines remapped through earlier edits.
    pub record: DefectRecord,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Planning,
    Backup,
    Apply,
    BuildVerify,
    TestVerify,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Complete,
    RolledBack,
    Failed,
}

/// Everything a workflow run produced, ready to serialize.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub phase: WorkflowPhase,
    pub state: TerminalState,
    pub success: bool,
    pub rolled_back: bool,
    /// Rollback itself failed or was impossible; files need manual attention.
    pub unrecoverable: bool,
    pub dry_run: bool,
    pub plan: Plan,
    pub actions: Vec<ActionReport>,
    pub build: Option<StepOutcome>,
    pub tests: Option<StepOutcome>,
    pub snapshot_set: Option<Uuid>,
    pub restored: Vec<RestoreReport>,
    pub errors: Vec<String>,
}

impl WorkflowOutcome {
    pub fn applied_count(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_applied()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.actions.iter().filter(|a| a.outcome.is_failed()).count()
    }
}
