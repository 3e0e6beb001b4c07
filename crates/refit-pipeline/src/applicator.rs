//! Per-file application of one planned action.
//!
//! Live: snapshot, rewrite, merge, atomic write, validate, and restore the
//! snapshot when validation fails. Dry run: rewrite against an in-memory
//! overlay and nothing else.

use crate::error::PipelineError;
use crate::types::{ApplyDetail, ApplyStatus, CompilationStatus, MergeMode};
use refit_common::fs_utils::{atomic_write, file_key, line_count};
use refit_snapshot::{RollbackError, Snapshot, SnapshotStore};
use refit_surgeon::{compute_rewrite, DefectRecord, Rewrite, Strategy};
use refit_verify::CompilationValidator;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Node;

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// File contents as a dry run has rewritten them so far.
#[derive(Debug, Default)]
pub struct Overlay {
    files: HashMap<PathBuf, String>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current content of `path`: the overlay copy, else the file on disk.
    pub fn read(&self, path: &Path) -> Result<String, PipelineError> {
        if let Some(content) = self.files.get(&file_key(path)) {
            return Ok(content.clone());
        }
        std::fs::read_to_string(path).map_err(|e| PipelineError::Read {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn write(&mut self, path: &Path, content: String) {
        self.files.insert(file_key(path), content);
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(&file_key(path)).map(String::as_str)
    }
}

pub struct CodeApplicator {
    store: Arc<dyn SnapshotStore>,
    validator: CompilationValidator,
}

impl CodeApplicator {
    pub fn new(store: Arc<dyn SnapshotStore>, validator: CompilationValidator) -> Self {
        Self { store, validator }
    }

    /// Apply `strategy` to `record`'s file.
    ///
    /// `snapshot` is the workflow's set member for the file. It is reused
    /// while the file still matches it; otherwise a fresh snapshot is taken
    /// so a failed validation only undoes this action.
    pub async fn apply(
        &self,
        strategy: &dyn Strategy,
        record: &DefectRecord,
        snapshot: Option<&Snapshot>,
    ) -> Result<ApplyDetail, PipelineError> {
        strategy.validate(record)?;
        let original = std::fs::read_to_string(&record.file).map_err(|e| PipelineError::Read {
            path: record.file.clone(),
            source: e,
        })?;

        let rewrite = guarded_rewrite(strategy, record, &original)?;
        let (content, shifts, description) = match rewrite {
            Rewrite::Advisory { description, notes } => {
                tracing::info!("{} (advisory): {}", strategy.name(), description);
                return Ok(ApplyDetail {
                    notes,
                    ..detail(strategy, record, description, ApplyStatus::Advisory, &original)
                });
            }
            Rewrite::Edit {
                content,
                shifts,
                description,
            } => (content, shifts, description),
        };

        let snapshot = self.snapshot_for(&record.file, &original, snapshot)?;
        let (merged, merge) = merge_candidate(&original, &content);
        atomic_write(&record.file, merged.as_bytes())?;
        tracing::info!("{} wrote {}: {}", strategy.name(), record.file.display(), description);

        let validation = self.validator.validate(&record.file).await;
        let mut result = ApplyDetail {
            merge: Some(merge),
            snapshot_id: Some(snapshot.id),
            ..detail(strategy, record, description, ApplyStatus::Success, &original)
        };

        if !validation.success {
            tracing::error!(
                "Validation of {} failed ({}); restoring snapshot {}",
                record.file.display(),
                validation.error_summary(),
                snapshot.id
            );
            self.store
                .restore(&snapshot)
                .map_err(|e| RollbackError::Restore {
                    path: record.file.clone(),
                    source: e,
                })?;
            result.status = ApplyStatus::CompilationFailed;
            result.compilation = CompilationStatus::Failed;
            result.validation = Some(validation);
            result.restored = true;
            return Ok(result);
        }

        result.lines_after = line_count(&merged);
        result.line_delta = result.lines_after as isize - result.lines_before as isize;
        result.shifts = shifts;
        result.compilation = CompilationStatus::Passed;
        if !validation.warnings.is_empty() {
            result.status = ApplyStatus::SuccessWithWarnings;
        }
        result.validation = Some(validation);
        Ok(result)
    }

    /// Compute the rewrite against `overlay` and record the new content there.
    pub fn preview(
        &self,
        strategy: &dyn Strategy,
        record: &DefectRecord,
        overlay: &mut Overlay,
    ) -> Result<ApplyDetail, PipelineError> {
        let original = overlay.read(&record.file)?;
        match guarded_rewrite(strategy, record, &original)? {
            Rewrite::Advisory { description, notes } => Ok(ApplyDetail {
                notes,
                ..detail(strategy, record, description, ApplyStatus::Advisory, &original)
            }),
            Rewrite::Edit {
                content,
                shifts,
                description,
            } => {
                let (merged, merge) = merge_candidate(&original, &content);
                let mut result = detail(strategy, record, description, ApplyStatus::Success, &original);
                result.lines_after = line_count(&merged);
                result.line_delta = result.lines_after as isize - result.lines_before as isize;
                result.shifts = shifts;
                result.merge = Some(merge);
                overlay.write(&record.file, merged);
                Ok(result)
            }
        }
    }

    fn snapshot_for(
        &self,
        file: &Path,
        current: &str,
        member: Option<&Snapshot>,
    ) -> Result<Snapshot, PipelineError> {
        if let Some(member) = member {
            if blake3::hash(current.as_bytes()).to_hex().as_str() == member.checksum {
                return Ok(member.clone());
            }
            tracing::debug!(
                "{} changed since snapshot {}; taking a fresh one",
                file.display(),
                member.id
            );
        }
        Ok(self.store.create(file)?)
    }
}

/// Run the strategy, turning a panic inside it into an error.
fn guarded_rewrite(
    strategy: &dyn Strategy,
    record: &DefectRecord,
    source: &str,
) -> Result<Rewrite, PipelineError> {
    match catch_unwind(AssertUnwindSafe(|| compute_rewrite(strategy, record, source))) {
        Ok(result) => Ok(result?),
        Err(_) => Err(PipelineError::Internal(format!(
            "{} panicked on {}:{}",
            strategy.name(),
            record.file.display(),
            record.start_line
        ))),
    }
}

fn detail(
    strategy: &dyn Strategy,
    record: &DefectRecord,
    description: String,
    status: ApplyStatus,
    original: &str,
) -> ApplyDetail {
    let lines = line_count(original);
    ApplyDetail {
        strategy: strategy.name(),
        file: record.file.clone(),
        description,
        status,
        compilation: CompilationStatus::NotEvaluated,
        validation: None,
        merge: None,
        lines_before: lines,
        lines_after: lines,
        line_delta: 0,
        shifts: Vec::new(),
        notes: Vec::new(),
        restored: false,
        snapshot_id: None,
    }
}

/// Replace the original's type declarations with the candidate's.
///
/// When both parse cleanly, both have top-level type declarations and the
/// text around them differs only in whitespace, the candidate's declaration
/// span is spliced between the original header and trailer. Anything else
/// overwrites the whole file.
pub fn merge_candidate(original: &str, candidate: &str) -> (String, MergeMode) {
    let spans = declaration_span(original).zip(declaration_span(candidate));
    let Some(((o_start, o_end), (c_start, c_end))) = spans else {
        return (candidate.to_string(), MergeMode::Textual);
    };
    let same_header = squash(&original[..o_start]) == squash(&candidate[..c_start]);
    let same_trailer = squash(&original[o_end..]) == squash(&candidate[c_end..]);
    if !(same_header && same_trailer) {
        return (candidate.to_string(), MergeMode::Textual);
    }

    let mut merged = String::with_capacity(original.len() + candidate.len());
    merged.push_str(&original[..o_start]);
    merged.push_str(&candidate[c_start..c_end]);
    merged.push_str(&original[o_end..]);
    (merged, MergeMode::Structural)
}

/// Byte span from the first to the last top-level type declaration.
fn declaration_span(source: &str) -> Option<(usize, usize)> {
    let tree = refit_surgeon::validate::verify_parse(source, &refit_lang::java()).ok()?;
    let root = tree.root_node();
    let mut cursor = root.walk();
    let declarations: Vec<Node> = root
        .named_children(&mut cursor)
        .filter(|n| TYPE_DECLARATIONS.contains(&n.kind()))
        .collect();
    let first = declarations.first()?;
    let last = declarations.last()?;
    Some((first.start_byte(), last.end_byte()))
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_common::config::SnapshotSettings;
    use refit_snapshot::DirSnapshotStore;
    use refit_surgeon::{StrategyOptions, StrategyRegistry};
    use std::fs;

    const CIRCLE: &str = "package geo;\n\nclass Circle {\n    double area(double r) {\n        return 3.14159 * r * r;\n    }\n}\n";

    fn applicator() -> (Arc<DirSnapshotStore>, CodeApplicator) {
        let store = Arc::new(DirSnapshotStore::temporary(&SnapshotSettings::default()).unwrap());
        let applicator = CodeApplicator::new(store.clone(), CompilationValidator::syntax_only());
        (store, applicator)
    }

    #[test]
    fn test_merge_keeps_original_header_whitespace() {
        let original = "package a;\n\n\nclass A {\n  int x;\n}\n";
        let candidate = "package a;\n\nclass A {\n  int y;\n}\n";
        let (merged, mode) = merge_candidate(original, candidate);
        assert_eq!(mode, MergeMode::Structural);
        assert_eq!(merged, "package a;\n\n\nclass A {\n  int y;\n}\n");
    }

    #[test]
    fn test_merge_falls_back_when_header_changes() {
        let original = "import java.util.List;\n\nclass A {}\n";
        let candidate = "\nclass A {}\n";
        let (merged, mode) = merge_candidate(original, candidate);
        assert_eq!(mode, MergeMode::Textual);
        assert_eq!(merged, candidate);
    }

    #[test]
    fn test_merge_falls_back_on_broken_input() {
        let (merged, mode) = merge_candidate("class A {", "class A {}\n");
        assert_eq!(mode, MergeMode::Textual);
        assert_eq!(merged, "class A {}\n");
    }

    #[tokio::test]
    async fn test_apply_reports_metrics_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Circle.java");
        fs::write(&file, CIRCLE).unwrap();
        let (store, applicator) = applicator();
        let registry = StrategyRegistry::with_defaults(&StrategyOptions::default());
        let record = DefectRecord::new("magic-literal", &file, 5);

        let result = applicator
            .apply(registry.first_match(&record).unwrap(), &record, None)
            .await
            .unwrap();
        assert_eq!(result.status, ApplyStatus::Success);
        assert_eq!(result.compilation, CompilationStatus::Passed);
        assert_eq!(result.line_delta, 2);
        assert_eq!(result.lines_after, result.lines_before + 2);
        assert!(!result.shifts.is_empty());
        assert!(fs::read_to_string(&file).unwrap().contains("return PI * r * r;"));

        let snapshot = store.get(result.snapshot_id.unwrap()).unwrap();
        assert_eq!(fs::read_to_string(&snapshot.location).unwrap(), CIRCLE);
    }

    #[tokio::test]
    async fn test_matching_set_member_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Circle.java");
        fs::write(&file, CIRCLE).unwrap();
        let (store, applicator) = applicator();
        let member = store.create(&file).unwrap();
        let registry = StrategyRegistry::with_defaults(&StrategyOptions::default());
        let record = DefectRecord::new("magic-literal", &file, 5);

        let result = applicator
            .apply(registry.first_match(&record).unwrap(), &record, Some(&member))
            .await
            .unwrap();
        assert_eq!(result.snapshot_id, Some(member.id));
        assert_eq!(store.list_for(&file).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advisory_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Circle.java");
        fs::write(&file, CIRCLE).unwrap();
        let (store, applicator) = applicator();
        let options = StrategyOptions {
            extract_threshold: 0,
            ..StrategyOptions::default()
        };
        let registry = StrategyRegistry::with_defaults(&options);
        let record = DefectRecord::new("long-method", &file, 4);

        let result = applicator
            .apply(registry.first_match(&record).unwrap(), &record, None)
            .await
            .unwrap();
        assert_eq!(result.status, ApplyStatus::Advisory);
        assert_eq!(result.compilation, CompilationStatus::NotEvaluated);
        assert_eq!(fs::read_to_string(&file).unwrap(), CIRCLE);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_preview_uses_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Circle.java");
        fs::write(&file, CIRCLE).unwrap();
        let (store, applicator) = applicator();
        let registry = StrategyRegistry::with_defaults(&StrategyOptions::default());
        let record = DefectRecord::new("magic-literal", &file, 5);
        let mut overlay = Overlay::new();

        let result = applicator
            .preview(registry.first_match(&record).unwrap(), &record, &mut overlay)
            .unwrap();
        assert_eq!(result.compilation, CompilationStatus::NotEvaluated);
        assert!(overlay.get(&file).unwrap().contains("PI"));
        assert_eq!(fs::read_to_string(&file).unwrap(), CIRCLE);
        assert!(store.list_all().unwrap().is_empty());
    }
}
