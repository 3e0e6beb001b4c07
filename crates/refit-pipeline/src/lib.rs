//! The safe refactoring workflow: defect records in, verified edits or a
//! full rollback out.

pub mod applicator;
pub mod error;
pub mod line_map;
pub mod plan;
pub mod types;
pub mod workflow;

pub use applicator::{merge_candidate, CodeApplicator, Overlay};
pub use error::PipelineError;
pub use line_map::LineMap;
pub use plan::build_plan;
pub use types::{
    ActionOutcome, ActionReport, ApplyDetail, ApplyStatus, CompilationStatus, MergeMode, Plan,
    PlannedAction, RejectedRecord, TerminalState, WorkflowOutcome, WorkflowPhase,
};
pub use workflow::{SafeWorkflow, Workflow};
