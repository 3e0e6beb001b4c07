//! Extract-method analysis: def/use facts, cohesive blocks, and the
//! synthesis of a new method from each accepted block.

pub mod blocks;
pub mod def_use;
pub mod synthesis;

pub use blocks::{find_blocks, BlockParameter, BlockReturn, BlockSettings, CandidateBlock};
pub use synthesis::{extract_all, ExtractOutcome, Extraction};

use crate::edit::EditConflict;
use crate::validate::SyntaxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Method starting at byte {0} is no longer present")]
    MethodLost(usize),

    #[error("Extraction edits conflict: {0}")]
    Conflict(#[from] EditConflict),

    #[error("Extraction produced {} syntax error(s)", .errors.len())]
    InvalidResult { errors: Vec<SyntaxError> },

    #[error("Parser unavailable: {0}")]
    Parser(String),
}
