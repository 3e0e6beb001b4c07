//! Verification after a refactoring: per-file compilation checks and
//! project build/test runs with bounded, killable child processes.

pub mod compile;
pub mod detection;
pub mod error;
pub mod parsers;
pub mod pipeline;
pub mod process;
pub mod runners;
pub mod types;

pub use compile::{CompilationValidator, ValidationOutcome, ValidationTier};
pub use detection::{detect_build_tool, BuildTool};
pub use error::VerifyError;
pub use pipeline::BuildVerifier;
pub use process::{ProcessOutcome, ProcessRunner, ProcessState, TerminationPath, TerminationPolicy};
pub use types::{Diagnostic, StepOutcome, StepStatus, TestCounts};
