//! Replace a returning `switch` over a parameter with a dispatch table of lambdas.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use crate::format::{extract_line_prefix, indent_deeper, infer_indent_style};
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "conditional-to-polymorphism";

/// Switch selector types whose case labels are used verbatim as map keys.
const LITERAL_KEYED: &[&str] = &["int", "short", "byte", "char", "String", "Integer", "Character"];

pub struct ReplaceSwitchWithDispatch;

/// One `case` arm: its labels and the expression it returns.
struct Arm {
    labels: Vec<String>,
    value: String,
}

impl Strategy for ReplaceSwitchWithDispatch {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["switch-statement", "conditional-complexity", "complex-conditional"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let root = tree.root_node();
        let method = java::find_method(root, source, record.element(), record.start_line)
            .filter(|m| m.kind() == "method_declaration")
            .ok_or_else(|| StrategyError::apply(NAME, "no method at the defect location"))?;
        let name = java::declared_name(&method, source)
            .ok_or_else(|| StrategyError::apply(NAME, "method has no name"))?;
        let return_type = java::return_type(&method, source);
        if return_type == "void" {
            return Err(StrategyError::apply(NAME, "void methods have nothing to dispatch"));
        }
        let params = java::formal_parameters(&method, source)
            .ok_or_else(|| StrategyError::apply(NAME, "varargs are not supported"))?;

        let switch = match java::body_statements(method).as_slice() {
            [only] => unwrap_switch(*only),
            _ => None,
        }
        .ok_or_else(|| StrategyError::apply(NAME, format!("{name} is not a single switch")))?;

        let selector = switch
            .child_by_field_name("condition")
            .and_then(|c| java::named_children(c).into_iter().next())
            .ok_or_else(|| StrategyError::apply(NAME, "switch has no selector"))?;
        let selector_name = java::text(&selector, source);
        let selector_type = params
            .iter()
            .find(|(_, p)| *p == selector_name)
            .map(|(ty, _)| *ty)
            .ok_or_else(|| {
                StrategyError::apply(NAME, "switch selector is not a plain parameter")
            })?;

        let (arms, default) = collect_arms(switch, source, selector_type)?;
        let default = default
            .ok_or_else(|| StrategyError::apply(NAME, "switch has no default branch"))?;

        let class_body = java::enclosing_class_body(method)
            .ok_or_else(|| StrategyError::apply(NAME, "method is not inside a class"))?;
        let taken = java::member_names(class_body, source);
        let pascal = java::to_pascal_case(name);
        let branch_type = java::unique_name(&format!("{pascal}Branch"), &taken);
        let is_static = java::has_modifier(&method, source, "static");
        let table = if is_static {
            java::unique_name(&format!("{}_BRANCHES", java::to_upper_snake(name)), &taken)
        } else {
            java::unique_name(&format!("{name}Branches"), &taken)
        };
        let param_names: Vec<&str> = params.iter().map(|(_, n)| *n).collect();
        let local = java::unique_name("branch", &param_names.iter().map(|n| n.to_string()).collect::<Vec<_>>());

        let style = infer_indent_style(source);
        let member_indent = extract_line_prefix(source, method.start_byte());
        let body_indent = extract_line_prefix(source, switch.start_byte());
        let inner_indent = indent_deeper(&body_indent, &style);
        let entry_indent = indent_deeper(&indent_deeper(&member_indent, &style), &style);

        let dispatch = format!(
            "{branch_type} {local} = {table}.get({selector_name});\n\
             {body_indent}if ({local} == null) {{\n\
             {inner_indent}{default}\n\
             {body_indent}}}\n\
             {body_indent}return {local}.apply({});",
            param_names.join(", ")
        );

        let signature: Vec<String> = params.iter().map(|(ty, n)| format!("{ty} {n}")).collect();
        let lambda_params = format!("({})", param_names.join(", "));
        let entries: Vec<String> = arms
            .iter()
            .flat_map(|arm| {
                arm.labels.iter().map(|label| {
                    format!(
                        "{entry_indent}java.util.Map.entry({label}, ({branch_type}) {lambda_params} -> {})",
                        arm.value
                    )
                })
            })
            .collect();
        let declarations = format!(
            "\n\n{member_indent}private interface {branch_type} {{\n\
             {inner}{return_type} apply({});\n\
             {member_indent}}}\n\n\
             {member_indent}private {}final java.util.Map<{}, {branch_type}> {table} = java.util.Map.ofEntries(\n\
             {});",
            signature.join(", "),
            if is_static { "static " } else { "" },
            java::boxed(selector_type),
            entries.join(",\n"),
            inner = indent_deeper(&member_indent, &style),
        );

        let edits = vec![
            TextEdit::replace(switch.start_byte(), switch.end_byte(), dispatch, "dispatch through table"),
            TextEdit::insert(method.end_byte(), declarations, format!("declare {branch_type}")),
        ];
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!(
                "Replaced switch in {name} with {branch_type} dispatch table ({} entries)",
                entries.len()
            ),
        )?)
    }
}

fn unwrap_switch(statement: Node) -> Option<Node> {
    match statement.kind() {
        "switch_expression" | "switch_statement" => Some(statement),
        "expression_statement" => statement
            .named_child(0)
            .filter(|c| c.kind() == "switch_expression"),
        _ => None,
    }
}

/// Arms with their labels, plus the default branch statement.
///
/// Empty groups fall through: their labels join the next group that returns.
fn collect_arms(
    switch: Node,
    source: &str,
    selector_type: &str,
) -> Result<(Vec<Arm>, Option<String>), StrategyError> {
    let body = switch
        .child_by_field_name("body")
        .ok_or_else(|| StrategyError::apply(NAME, "switch has no body"))?;

    let mut arms = Vec::new();
    let mut default = None;
    let mut pending: Vec<String> = Vec::new();
    let mut pending_default = false;

    for group in java::named_children(body) {
        if group.kind() != "switch_block_statement_group" {
            return Err(StrategyError::apply(
                NAME,
                "only colon-style case groups are supported",
            ));
        }
        let mut statements = Vec::new();
        for child in java::named_children(group) {
            if child.kind() == "switch_label" {
                let values = java::named_children(child);
                if values.is_empty() {
                    pending_default = true;
                }
                for value in values {
                    pending.push(map_key(value, source, selector_type));
                }
            } else {
                statements.push(child);
            }
        }

        let [statement] = statements.as_slice() else {
            if statements.is_empty() {
                continue;
            }
            return Err(StrategyError::apply(
                NAME,
                "every case must be a single return",
            ));
        };

        if pending_default {
            if !matches!(statement.kind(), "return_statement" | "throw_statement") {
                return Err(StrategyError::apply(NAME, "default must return or throw"));
            }
            default = Some(java::text(statement, source).to_string());
            pending.clear();
            pending_default = false;
            continue;
        }

        let value = (statement.kind() == "return_statement")
            .then(|| statement.named_child(0))
            .flatten()
            .ok_or_else(|| StrategyError::apply(NAME, "every case must return a value"))?;
        arms.push(Arm {
            labels: std::mem::take(&mut pending),
            value: java::text(&value, source).to_string(),
        });
    }

    if arms.is_empty() {
        return Err(StrategyError::apply(NAME, "switch has no case arms"));
    }
    Ok((arms, default))
}

/// Case label as a map key; enum constants are qualified with their type.
fn map_key(label: Node, source: &str, selector_type: &str) -> String {
    let text = java::text(&label, source);
    if label.kind() == "identifier" && !LITERAL_KEYED.contains(&selector_type) {
        format!("{selector_type}.{text}")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const PRICING: &str = r#"class Pricing {
    int price(String size, int qty) {
        switch (size) {
            case "S":
                return qty * 2;
            case "M":
            case "L":
                return qty * 3;
            default:
                throw new IllegalArgumentException(size);
        }
    }
}
"#;

    fn content(source: &str, record: &DefectRecord) -> Result<String, StrategyError> {
        match compute_rewrite(&ReplaceSwitchWithDispatch, record, source)? {
            Rewrite::Edit { content, .. } => Ok(content),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_switch_becomes_dispatch_table() {
        let record = DefectRecord::new("switch-statement", "Pricing.java", 3);
        let result = content(PRICING, &record).unwrap();
        assert!(result.contains("        PriceBranch branch = priceBranches.get(size);\n        if (branch == null) {\n            throw new IllegalArgumentException(size);\n        }\n        return branch.apply(size, qty);"));
        assert!(result.contains("    private interface PriceBranch {\n        int apply(String size, int qty);\n    }"));
        assert!(result.contains("private final java.util.Map<String, PriceBranch> priceBranches = java.util.Map.ofEntries("));
        assert!(result.contains(r#"java.util.Map.entry("S", (PriceBranch) (size, qty) -> qty * 2),"#));
        assert!(result.contains(r#"java.util.Map.entry("M", (PriceBranch) (size, qty) -> qty * 3),"#));
        assert!(result.contains(r#"java.util.Map.entry("L", (PriceBranch) (size, qty) -> qty * 3));"#));
        assert!(!result.contains("switch"));
    }

    #[test]
    fn test_enum_labels_are_qualified_and_static_table() {
        let source = r#"class Shapes {
    static double area(Kind kind, double r) {
        switch (kind) {
            case CIRCLE:
                return 3.14 * r * r;
            case SQUARE:
                return r * r;
            default:
                return 0;
        }
    }
}
"#;
        let record = DefectRecord::new("conditional-complexity", "Shapes.java", 2).with_element("area");
        let result = content(source, &record).unwrap();
        assert!(result.contains("private static final java.util.Map<Kind, AreaBranch> AREA_BRANCHES"));
        assert!(result.contains("java.util.Map.entry(Kind.CIRCLE, (AreaBranch) (kind, r) -> 3.14 * r * r)"));
    }

    #[test]
    fn test_missing_default_is_refused() {
        let source = "class A {\n    int f(int x) {\n        switch (x) {\n            case 1:\n                return 10;\n        }\n        return 0;\n    }\n}\n";
        let record = DefectRecord::new("switch-statement", "A.java", 3);
        assert!(content(source, &record).is_err());
    }
}
