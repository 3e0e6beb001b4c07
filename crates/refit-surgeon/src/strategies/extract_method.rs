//! Long-method handling in two tiers.
//!
//! The advisor reports the blocks that could be extracted. The automatic
//! tier, registered only when enabled in config, performs the extraction.

use super::{Rewrite, Strategy, StrategyError, StrategyOptions};
use crate::analysis::{extract_all, find_blocks, BlockSettings};
use crate::analysis::synthesis::method_name;
use crate::defect::DefectRecord;
use crate::edit::LineShift;
use refit_common::fs_utils::line_count;
use refit_lang::java;
use tree_sitter::{Node, Tree};

const ADVISOR: &str = "extract-method-advisory";
const AUTO: &str = "extract-method";

pub struct ExtractMethodAdvisor {
    threshold: usize,
    settings: BlockSettings,
}

impl ExtractMethodAdvisor {
    pub fn new(options: &StrategyOptions) -> Self {
        Self {
            threshold: options.extract_threshold,
            settings: BlockSettings::new(options.extract_min_block, options.extract_max_block),
        }
    }
}

pub struct AutoExtractMethod {
    threshold: usize,
    settings: BlockSettings,
}

impl AutoExtractMethod {
    pub fn new(options: &StrategyOptions) -> Self {
        Self {
            threshold: options.extract_threshold,
            settings: BlockSettings::new(options.extract_min_block, options.extract_max_block),
        }
    }
}

/// The method a long-method record points at, if it is long enough.
fn long_method<'t>(
    strategy: &'static str,
    record: &DefectRecord,
    source: &str,
    tree: &'t Tree,
    threshold: usize,
) -> Result<(Node<'t>, String), StrategyError> {
    let method = java::find_method(tree.root_node(), source, record.element(), record.start_line)
        .ok_or_else(|| StrategyError::apply(strategy, "no method at the defect location"))?;
    let name = java::declared_name(&method, source)
        .unwrap_or("<anonymous>")
        .to_string();
    let count = java::body_statements(method).len();
    if count <= threshold {
        return Err(StrategyError::apply(
            strategy,
            format!("{name} has {count} statements, threshold is {threshold}"),
        ));
    }
    Ok((method, name))
}

impl Strategy for ExtractMethodAdvisor {
    fn name(&self) -> &'static str {
        ADVISOR
    }

    fn categories(&self) -> &'static [&'static str] {
        &["long-method"]
    }

    fn is_advisory(&self) -> bool {
        true
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let (method, name) = long_method(ADVISOR, record, source, tree, self.threshold)?;
        let mut taken = java::enclosing_class_body(method)
            .map(|body| java::member_names(body, source))
            .unwrap_or_default();

        let mut notes = Vec::new();
        for block in find_blocks(method, source, self.settings) {
            let suggested = method_name(&source[block.start_byte..block.end_byte], &taken);
            let params: Vec<String> = block
                .parameters
                .iter()
                .map(|p| format!("{} {}", p.java_type, p.name))
                .collect();
            notes.push(format!(
                "lines {}-{}: {} {}({})",
                block.start_line,
                block.end_line,
                block.returns.java_type(),
                suggested,
                params.join(", ")
            ));
            taken.push(suggested);
        }

        let description = if notes.is_empty() {
            format!("{name} is long but no block can be extracted safely")
        } else {
            format!("{} extractable block(s) in {name}", notes.len())
        };
        Ok(Rewrite::Advisory { description, notes })
    }
}

impl Strategy for AutoExtractMethod {
    fn name(&self) -> &'static str {
        AUTO
    }

    fn categories(&self) -> &'static [&'static str] {
        &["long-method"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let (method, name) = long_method(AUTO, record, source, tree, self.threshold)?;
        let outcome = extract_all(source, method.start_byte(), self.settings)?;
        if outcome.extractions.is_empty() {
            return Err(StrategyError::apply(
                AUTO,
                format!("no block in {name} can be extracted safely"),
            ));
        }

        let delta = line_count(&outcome.content) as isize - line_count(source) as isize;
        let names: Vec<&str> = outcome
            .extractions
            .iter()
            .map(|e| e.method_name.as_str())
            .collect();
        Ok(Rewrite::Edit {
            shifts: vec![LineShift {
                after_line: java::end_line_of(&method),
                delta,
            }],
            description: format!("Extracted {} from {name}", names.join(", ")),
            content: outcome.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"class Invoice {
    double total(double price, int qty) {
        double subtotal = price * qty;
        double tax = subtotal * 0.2;
        double gross = subtotal + tax;
        System.out.println(price);
        System.out.println(qty);
        System.out.println(gross);
        return gross;
    }
}
"#;

    fn options() -> StrategyOptions {
        StrategyOptions {
            extract_threshold: 5,
            extract_min_block: 3,
            extract_max_block: 3,
            auto_extract: true,
            max_parameters: 3,
        }
    }

    #[test]
    fn test_advisor_lists_candidates_without_editing() {
        let advisor = ExtractMethodAdvisor::new(&options());
        let record = DefectRecord::new("long-method", "Invoice.java", 2);
        match compute_rewrite(&advisor, &record, SOURCE).unwrap() {
            Rewrite::Advisory { notes, description } => {
                assert_eq!(description, "2 extractable block(s) in total");
                assert_eq!(notes[0], "lines 3-5: double calculateTotals(double price, int qty)");
                assert_eq!(notes[1], "lines 6-8: void logDetails(double price, int qty, double gross)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_short_method_is_refused() {
        let mut opts = options();
        opts.extract_threshold = 7;
        let advisor = ExtractMethodAdvisor::new(&opts);
        let record = DefectRecord::new("long-method", "Invoice.java", 2);
        let err = compute_rewrite(&advisor, &record, SOURCE).unwrap_err();
        assert!(err.to_string().contains("threshold is 7"));
    }

    #[test]
    fn test_auto_extract_rewrites_method() {
        let strategy = AutoExtractMethod::new(&options());
        let record = DefectRecord::new("long-method", "Invoice.java", 2).with_element("total");
        let (content, shifts) = match compute_rewrite(&strategy, &record, SOURCE).unwrap() {
            Rewrite::Edit { content, shifts, .. } => (content, shifts),
            other => panic!("unexpected {other:?}"),
        };
        assert!(content.contains(
            "        double gross = calculateTotals(price, qty);\n        logDetails(price, qty, gross);\n        return gross;\n    }"
        ));
        assert!(content.contains("    private double calculateTotals(double price, int qty) {\n        double subtotal = price * qty;"));
        assert!(content.contains("        double gross = subtotal + tax;\n        return gross;\n    }"));
        assert!(content.contains("    private void logDetails(double price, int qty, double gross) {\n        System.out.println(price);"));
        assert_eq!(shifts, vec![LineShift { after_line: 10, delta: 9 }]);
    }
}
