//! Rename a poorly named local variable or parameter inside its method.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use refit_lang::java;
use regex::Regex;
use std::sync::LazyLock;
use tree_sitter::{Node, Tree};

const NAME: &str = "variable-rename";

/// `... to 'total'`, `... to "total"` or ``... to `total` ``.
static SUGGESTED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bto\s+['"`]([A-Za-z_$][\w$]*)['"`]"#).unwrap());

pub struct RenameVariable;

impl Strategy for RenameVariable {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["poor-naming", "short-variable-name"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let old = record
            .element()
            .ok_or_else(|| StrategyError::apply(NAME, "record does not name the variable"))?;
        let method = java::find_method(tree.root_node(), source, None, record.start_line)
            .ok_or_else(|| StrategyError::apply(NAME, "variable is not inside a method"))?;

        let occurrences = java::variable_occurrences(method, source, old);
        let declaration = occurrences
            .iter()
            .find(|n| java::is_declaration_site(n))
            .ok_or_else(|| {
                StrategyError::apply(NAME, format!("{old} is not declared in this method"))
            })?;

        let new = match suggested_name(&record.message) {
            Some(name) => name,
            None => {
                let declared = declared_type(*declaration, source).ok_or_else(|| {
                    StrategyError::apply(NAME, format!("cannot infer a name for {old}"))
                })?;
                name_for_type(declared)
            }
        };
        if new == old {
            return Err(StrategyError::apply(NAME, format!("{old} already has that name")));
        }
        if !java::is_identifier(&new) {
            return Err(StrategyError::apply(NAME, format!("{new} is not a valid identifier")));
        }
        if mentions(method, source, &new) {
            return Err(StrategyError::apply(
                NAME,
                format!("{new} is already used in this method"),
            ));
        }

        let edits = occurrences
            .iter()
            .map(|n| {
                TextEdit::replace(
                    n.start_byte(),
                    n.end_byte(),
                    new.clone(),
                    format!("rename {old} at line {}", java::line_of(n)),
                )
            })
            .collect();
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!("Renamed {old} to {new} ({} occurrence(s))", occurrences.len()),
        )?)
    }
}

fn suggested_name(message: &str) -> Option<String> {
    SUGGESTED_NAME
        .captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Declared type of the variable introduced at `name`.
fn declared_type<'a>(name: Node, source: &'a str) -> Option<&'a str> {
    let parent = name.parent()?;
    let holder = if parent.kind() == "variable_declarator" {
        parent.parent()?
    } else {
        parent
    };
    holder
        .child_by_field_name("type")
        .map(|t| java::text(&t, source))
}

fn name_for_type(type_text: &str) -> String {
    match java::simple_type_name(type_text) {
        "int" | "long" | "short" | "byte" | "Integer" | "Long" => "number".to_string(),
        "double" | "float" | "Double" | "Float" | "BigDecimal" => "amount".to_string(),
        "boolean" | "Boolean" => "flag".to_string(),
        "char" | "Character" => "character".to_string(),
        "String" => "text".to_string(),
        "var" => String::new(),
        other => java::to_lower_camel(other),
    }
}

/// Any identifier spelled `name` inside `scope`.
fn mentions(scope: Node, source: &str, name: &str) -> bool {
    java::descendants_of_kind(scope, &["identifier"])
        .iter()
        .any(|n| java::text(n, source) == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"class Geometry {
    private double scale = 2;

    double area(double w, double h) {
        double a = w * h * scale;
        return a;
    }
}
"#;

    fn content(record: &DefectRecord) -> Result<String, StrategyError> {
        match compute_rewrite(&RenameVariable, record, SOURCE)? {
            Rewrite::Edit { content, .. } => Ok(content),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_renames_to_suggested_name() {
        let record = DefectRecord::new("short-variable-name", "Geometry.java", 5)
            .with_element("a")
            .with_message("Rename variable a to 'surface'");
        let result = content(&record).unwrap();
        assert!(result.contains("double surface = w * h * scale;"));
        assert!(result.contains("return surface;"));
    }

    #[test]
    fn test_derives_name_from_type() {
        let record = DefectRecord::new("poor-naming", "Geometry.java", 4).with_element("w");
        let result = content(&record).unwrap();
        assert!(result.contains("double area(double amount, double h) {"));
        assert!(result.contains("double a = amount * h * scale;"));
    }

    #[test]
    fn test_clash_is_refused() {
        let record = DefectRecord::new("poor-naming", "Geometry.java", 5)
            .with_element("a")
            .with_message("rename to 'scale'");
        let err = content(&record).unwrap_err();
        assert!(err.to_string().contains("already used"));
    }
}
