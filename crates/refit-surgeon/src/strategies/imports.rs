//! Remove an unused single-type import.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "import-removal";

pub struct RemoveUnusedImport;

impl Strategy for RemoveUnusedImport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["unused-import"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let root = tree.root_node();
        let import = find_import(root, source, record)
            .ok_or_else(|| StrategyError::apply(NAME, "no import matches the defect"))?;

        let mut cursor = import.walk();
        let wildcard = import.children(&mut cursor).any(|c| c.kind() == "asterisk");
        if wildcard {
            return Err(StrategyError::apply(
                NAME,
                "wildcard imports are not removed automatically",
            ));
        }

        let qualified = imported_name(import, source)
            .ok_or_else(|| StrategyError::apply(NAME, "import has no name"))?;
        let simple = qualified.rsplit('.').next().unwrap_or(qualified);
        if is_referenced(root, source, simple) {
            return Err(StrategyError::apply(
                NAME,
                format!("{simple} is still referenced"),
            ));
        }

        let (start, end) = java::full_line_span(source, import.start_byte(), import.end_byte());
        let edits = vec![TextEdit::delete(start, end, format!("remove import {qualified}"))];
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!("Removed unused import {qualified}"),
        )?)
    }
}

fn find_import<'t>(root: Node<'t>, source: &str, record: &DefectRecord) -> Option<Node<'t>> {
    let imports: Vec<Node<'t>> = java::named_children(root)
        .into_iter()
        .filter(|n| n.kind() == "import_declaration")
        .collect();

    if let Some(element) = record.element() {
        let by_name = imports.iter().find(|i| {
            imported_name(**i, source).is_some_and(|name| {
                name == element || name.rsplit('.').next() == Some(element)
            })
        });
        if by_name.is_some() {
            return by_name.copied();
        }
    }
    imports
        .into_iter()
        .find(|i| record.covers_line(java::line_of(i)))
}

fn imported_name<'a>(import: Node, source: &'a str) -> Option<&'a str> {
    java::named_children(import)
        .into_iter()
        .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
        .map(|n| java::text(&n, source))
}

/// Whether `name` appears as an identifier or type name outside the import block.
fn is_referenced(root: Node, source: &str, name: &str) -> bool {
    let mut found = false;
    java::walk(root, &mut |n| {
        if found || matches!(n.kind(), "import_declaration" | "package_declaration") {
            return false;
        }
        if matches!(n.kind(), "identifier" | "type_identifier") && java::text(&n, source) == name {
            found = true;
        }
        true
    });
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"package com.acme;

import java.util.List;
import java.util.Map;
import java.io.*;

public class Inventory {
    private List<String> items;
}
"#;

    #[test]
    fn test_removes_unused_import_line() {
        let record = DefectRecord::new("unused-import", "Inventory.java", 4);
        match compute_rewrite(&RemoveUnusedImport, &record, SOURCE).unwrap() {
            Rewrite::Edit { content, shifts, .. } => {
                assert!(!content.contains("java.util.Map"));
                assert!(content.contains("import java.util.List;\nimport java.io.*;\n"));
                assert_eq!(shifts[0].delta, -1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_element_selects_import() {
        let record = DefectRecord::new("unused-import", "Inventory.java", 1).with_element("Map");
        let rewrite = compute_rewrite(&RemoveUnusedImport, &record, SOURCE).unwrap();
        assert!(rewrite.description().contains("java.util.Map"));
    }

    #[test]
    fn test_refuses_referenced_and_wildcard_imports() {
        let used = DefectRecord::new("unused-import", "Inventory.java", 3);
        let err = compute_rewrite(&RemoveUnusedImport, &used, SOURCE).unwrap_err();
        assert!(err.to_string().contains("still referenced"));

        let wildcard = DefectRecord::new("unused-import", "Inventory.java", 5);
        let err = compute_rewrite(&RemoveUnusedImport, &wildcard, SOURCE).unwrap_err();
        assert!(err.to_string().contains("wildcard"));
    }
}
