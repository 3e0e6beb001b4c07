//! Defect records in, ordered actions out.

use crate::types::{Plan, PlannedAction, RejectedRecord};
use refit_common::fs_utils::resolve_within_root;
use refit_surgeon::{DefectRecord, StrategyRegistry};
use std::path::Path;

/// Bind each auto-fixable record to the first registry strategy that
/// claims it. Record paths are resolved against `project_root`; a path
/// outside the root is rejected.
pub fn build_plan(project_root: &Path, records: &[DefectRecord], registry: &StrategyRegistry) -> Plan {
    let mut plan = Plan::default();
    for record in records {
        if !record.auto_fixable() {
            tracing::debug!(
                "Skipping {} at {}:{}: not auto-fixable",
                record.category,
                record.file.display(),
                record.start_line
            );
            continue;
        }

        let mut record = record.clone();
        match resolve_within_root(project_root, &record.file) {
            Ok(path) => record.file = path,
            Err(e) => {
                tracing::warn!("Rejecting {}: {}", record.category, e);
                plan.rejected.push(RejectedRecord {
                    record,
                    reason: e.to_string(),
                });
                continue;
            }
        }

        match registry.first_match(&record) {
            Some(strategy) => plan.actions.push(PlannedAction {
                strategy: strategy.name(),
                advisory: strategy.is_advisory(),
                record,
            }),
            None => plan.unmatched.push(record),
        }
    }
    tracing::info!(
        "Planned {} action(s) over {} file(s); {} unmatched, {} rejected",
        plan.actions.len(),
        plan.affected_files().len(),
        plan.unmatched.len(),
        plan.rejected.len()
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use refit_surgeon::StrategyOptions;

    fn registry() -> StrategyRegistry {
        StrategyRegistry::with_defaults(&StrategyOptions::default())
    }

    #[test]
    fn test_first_match_and_unmatched() {
        let root = Path::new("/work/shop");
        let records = vec![
            DefectRecord::new("magic-number", "src/A.java", 3),
            DefectRecord::new("god-class", "src/A.java", 1),
            DefectRecord::new("complex-conditional", "src/B.java", 9),
            DefectRecord::new("long-method", "src/B.java", 20),
        ];
        let plan = build_plan(root, &records, &registry());

        let names: Vec<_> = plan.actions.iter().map(|a| a.strategy).collect();
        assert_eq!(
            names,
            vec!["literal-extraction", "conditional-simplification", "extract-method-advisory"]
        );
        assert!(plan.actions[2].advisory);
        assert_eq!(plan.unmatched.len(), 1);
        assert_eq!(plan.actions[0].record.file, Path::new("/work/shop/src/A.java"));
    }

    #[test]
    fn test_affected_files_keep_first_appearance_order() {
        let root = Path::new("/work/shop");
        let records = vec![
            DefectRecord::new("magic-number", "src/B.java", 3),
            DefectRecord::new("unused-import", "src/A.java", 1),
            DefectRecord::new("magic-string", "src/B.java", 7),
        ];
        let plan = build_plan(root, &records, &registry());
        assert_eq!(
            plan.affected_files(),
            vec![
                Path::new("/work/shop/src/B.java").to_path_buf(),
                Path::new("/work/shop/src/A.java").to_path_buf()
            ]
        );
    }

    #[test]
    fn test_not_auto_fixable_and_escaping_records_are_dropped() {
        let root = Path::new("/work/shop");
        let mut manual = DefectRecord::new("magic-number", "src/A.java", 3);
        manual.auto_fix_available = Some(false);
        let records = vec![manual, DefectRecord::new("magic-number", "../other/A.java", 3)];

        let plan = build_plan(root, &records, &registry());
        assert!(plan.is_empty());
        assert!(plan.unmatched.is_empty());
        assert_eq!(plan.rejected.len(), 1);
    }
}
