//! refit-surgeon: defect-driven source transformations for Java.
//!
//! Strategies compute byte-range edits against an immutable tree-sitter
//! tree; the edits are applied in one pass and the result is re-parsed
//! before anything is allowed to reach disk.

pub mod analysis;
pub mod defect;
pub mod edit;
pub mod format;
pub mod strategies;
pub mod validate;

pub use defect::{DefectRecord, Severity};
pub use edit::{EditConflict, EditSet, LineShift, TextEdit};
pub use strategies::registry::StrategyRegistry;
pub use strategies::{
    compute_rewrite, Preview, Rewrite, Strategy, StrategyError, StrategyOptions,
};
