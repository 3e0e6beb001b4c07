//! Strategy vocabulary and execution trait.
//!
//! A strategy turns one defect record into a rewrite of the file it
//! points at. `rewrite` is pure: it sees the source and its parse tree and
//! returns new content. `apply` adds the file handling around it.

pub mod conditional;
pub mod dead_code;
pub mod extract_method;
pub mod imports;
pub mod inline;
pub mod literal;
pub mod parameter_object;
pub mod polymorphism;
pub mod registry;
pub mod rename;
pub mod resources;

use crate::analysis::ExtractError;
use crate::defect::DefectRecord;
use crate::edit::{EditConflict, EditSet, LineShift, TextEdit};
use crate::validate::{verify_parse, SyntaxError, ValidationError};
use refit_common::config::RefitConfig;
use refit_common::fs_utils::{atomic_write, line_count, FsError};
use refit_lang::LangError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tree_sitter::Tree;

/// Errors that can occur while validating or applying a strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Cannot refactor {path}: {reason}")]
    Validation { path: PathBuf, reason: String },

    #[error("{strategy}: {reason}")]
    Apply {
        strategy: &'static str,
        reason: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] FsError),

    #[error(transparent)]
    Unsupported(#[from] LangError),

    #[error("Edit conflict: {0}")]
    EditConflict(#[from] EditConflict),

    #[error("Rewrite produced {} syntax error(s)", .errors.len())]
    InvalidResult { errors: Vec<SyntaxError> },

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl StrategyError {
    pub fn apply(strategy: &'static str, reason: impl Into<String>) -> Self {
        Self::Apply {
            strategy,
            reason: reason.into(),
        }
    }
}

/// What a strategy wants done to a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rewrite {
    /// New file content plus the line movements it causes.
    Edit {
        content: String,
        shifts: Vec<LineShift>,
        description: String,
    },
    /// Findings only. Nothing is written.
    Advisory {
        description: String,
        notes: Vec<String>,
    },
}

impl Rewrite {
    /// Validate `edits` against `source` and apply them in one pass.
    pub fn from_edits(
        source: &str,
        edits: Vec<TextEdit>,
        description: impl Into<String>,
    ) -> Result<Self, EditConflict> {
        let set = EditSet::new(edits, source.len())?;
        Ok(Self::Edit {
            content: set.apply(source),
            shifts: set.line_shifts(source),
            description: description.into(),
        })
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Edit { description, .. } | Self::Advisory { description, .. } => description,
        }
    }
}

/// A rewrite computed without touching the file.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub strategy: &'static str,
    pub description: String,
    pub content: String,
    pub lines_before: usize,
    pub lines_after: usize,
}

/// Tunables the strategies read, lifted out of [`RefitConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyOptions {
    pub extract_threshold: usize,
    pub extract_min_block: usize,
    pub extract_max_block: usize,
    pub auto_extract: bool,
    pub max_parameters: usize,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self::from_config(&RefitConfig::default())
    }
}

impl StrategyOptions {
    pub fn from_config(config: &RefitConfig) -> Self {
        Self {
            extract_threshold: config.extract_method.threshold(),
            extract_min_block: config.extract_method.min_block(),
            extract_max_block: config.extract_method.max_block(),
            auto_extract: config.extract_method.auto_apply(),
            max_parameters: config.parameter_object.max_parameters(),
        }
    }
}

/// A transformation capability for a set of defect categories.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Categories this strategy claims, in kebab-case.
    fn categories(&self) -> &'static [&'static str];

    fn can_handle(&self, record: &DefectRecord) -> bool {
        let category = record.normalized_category();
        self.categories().iter().any(|c| *c == category)
    }

    /// Advisory strategies report findings and never change code.
    fn is_advisory(&self) -> bool {
        false
    }

    /// Check that the target file exists, is writable and parses.
    fn validate(&self, record: &DefectRecord) -> Result<(), StrategyError> {
        check_target(&record.file)
    }

    /// Compute the rewrite for `record` against the current `source`.
    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError>;

    /// Rewrite without writing. `None` for advisory strategies or failed rewrites.
    fn preview(&self, record: &DefectRecord) -> Option<Preview> {
        if self.is_advisory() {
            return None;
        }
        let source = std::fs::read_to_string(&record.file).ok()?;
        match compute_rewrite(self, record, &source) {
            Ok(Rewrite::Edit {
                content,
                description,
                ..
            }) => Some(Preview {
                strategy: self.name(),
                description,
                lines_before: line_count(&source),
                lines_after: line_count(&content),
                content,
            }),
            Ok(Rewrite::Advisory { .. }) => None,
            Err(e) => {
                tracing::debug!("Preview of {} failed: {}", self.name(), e);
                None
            }
        }
    }

    /// Validate, rewrite and atomically write the target file.
    fn apply(&self, record: &DefectRecord) -> Result<String, StrategyError> {
        self.validate(record)?;
        let source = read_source(&record.file)?;
        match compute_rewrite(self, record, &source)? {
            Rewrite::Edit {
                content,
                description,
                ..
            } => {
                atomic_write(&record.file, content.as_bytes())?;
                tracing::info!("{} applied to {}", self.name(), record.file.display());
                Ok(description)
            }
            Rewrite::Advisory { description, .. } => Ok(description),
        }
    }
}

/// Parse `source`, run the strategy and re-parse the result.
///
/// The source must parse cleanly. An edit whose result does not parse is
/// rejected with [`StrategyError::InvalidResult`].
pub fn compute_rewrite<S: Strategy + ?Sized>(
    strategy: &S,
    record: &DefectRecord,
    source: &str,
) -> Result<Rewrite, StrategyError> {
    let language = refit_lang::java();
    let tree = verify_parse(source, &language).map_err(|e| StrategyError::Validation {
        path: record.file.clone(),
        reason: e.to_string(),
    })?;

    let rewrite = strategy.rewrite(record, source, &tree)?;
    if let Rewrite::Edit { content, .. } = &rewrite {
        match verify_parse(content, &language) {
            Ok(_) => {}
            Err(ValidationError::SyntaxErrors { errors, .. }) => {
                return Err(StrategyError::InvalidResult { errors });
            }
            Err(other) => {
                return Err(StrategyError::Validation {
                    path: record.file.clone(),
                    reason: other.to_string(),
                });
            }
        }
    }
    Ok(rewrite)
}

/// The file must be Java, exist, be writable and parse without errors.
pub fn check_target(path: &Path) -> Result<(), StrategyError> {
    refit_lang::registry::detect_language(path)?;
    let invalid = |reason: String| StrategyError::Validation {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = std::fs::metadata(path).map_err(|_| invalid("file does not exist".into()))?;
    if !metadata.is_file() {
        return Err(invalid("not a regular file".into()));
    }
    if metadata.permissions().readonly() {
        return Err(invalid("file is read-only".into()));
    }
    let source = read_source(path)?;
    verify_parse(&source, &refit_lang::java()).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

pub(crate) fn read_source(path: &Path) -> Result<String, StrategyError> {
    std::fs::read_to_string(path).map_err(|e| StrategyError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Upcase;

    impl Strategy for Upcase {
        fn name(&self) -> &'static str {
            "upcase"
        }

        fn categories(&self) -> &'static [&'static str] {
            &["shouting"]
        }

        fn rewrite(
            &self,
            _record: &DefectRecord,
            source: &str,
            _tree: &Tree,
        ) -> Result<Rewrite, StrategyError> {
            let at = source.find("class A").ok_or_else(|| StrategyError::apply("upcase", "no class"))?;
            Ok(Rewrite::from_edits(
                source,
                vec![TextEdit::replace(at + 6, at + 7, "B", "rename class")],
                "renamed class",
            )?)
        }
    }

    struct Breaker;

    impl Strategy for Breaker {
        fn name(&self) -> &'static str {
            "breaker"
        }

        fn categories(&self) -> &'static [&'static str] {
            &["anything"]
        }

        fn rewrite(
            &self,
            _record: &DefectRecord,
            source: &str,
            _tree: &Tree,
        ) -> Result<Rewrite, StrategyError> {
            Ok(Rewrite::from_edits(
                source,
                vec![TextEdit::delete(source.len() - 2, source.len(), "drop brace")],
                "broke it",
            )?)
        }
    }

    #[test]
    fn test_can_handle_normalizes_category() {
        let record = DefectRecord::new("Shouting", "A.java", 1);
        assert!(Upcase.can_handle(&record));
        assert!(!Upcase.can_handle(&DefectRecord::new("whisper", "A.java", 1)));
    }

    #[test]
    fn test_apply_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("A.java");
        fs::write(&path, "class A {}\n").unwrap();

        let record = DefectRecord::new("shouting", &path, 1);
        let preview = Upcase.preview(&record).unwrap();
        assert_eq!(preview.content, "class B {}\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "class A {}\n");

        Upcase.apply(&record).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "class B {}\n");
    }

    #[test]
    fn test_invalid_result_is_rejected() {
        let record = DefectRecord::new("anything", "A.java", 1);
        let err = compute_rewrite(&Breaker, &record, "class A {}\n").unwrap_err();
        assert!(matches!(err, StrategyError::InvalidResult { .. }));
    }

    #[test]
    fn test_validate_rejects_unusable_targets() {
        let dir = tempfile::tempdir().unwrap();
        let missing = DefectRecord::new("shouting", dir.path().join("Nope.java"), 1);
        assert!(matches!(
            Upcase.validate(&missing),
            Err(StrategyError::Validation { .. })
        ));

        let script = dir.path().join("build.gradle");
        fs::write(&script, "apply plugin: 'java'").unwrap();
        let record = DefectRecord::new("shouting", &script, 1);
        assert!(matches!(
            Upcase.validate(&record),
            Err(StrategyError::Unsupported(_))
        ));

        let broken = dir.path().join("Broken.java");
        fs::write(&broken, "class A {").unwrap();
        let record = DefectRecord::new("shouting", &broken, 1);
        assert!(matches!(
            Upcase.validate(&record),
            Err(StrategyError::Validation { .. })
        ));
    }
}
