//! Remove unused private members, unused locals and unreachable statements.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use crate::format::removal_span;
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "dead-code-removal";

pub struct RemoveDeadCode;

impl Strategy for RemoveDeadCode {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &[
            "dead-code",
            "unused-variable",
            "unused-private-method",
            "unused-private-field",
            "unreachable-code",
        ]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let root = tree.root_node();
        match record.element() {
            Some(element) => remove_element(root, source, record, element),
            None => remove_unreachable(root, source, record),
        }
    }
}

fn remove_element(
    root: Node,
    source: &str,
    record: &DefectRecord,
    element: &str,
) -> Result<Rewrite, StrategyError> {
    if let Some(method) = private_method(root, source, element) {
        if is_called(root, source, element, method) {
            return Err(StrategyError::apply(NAME, format!("{element}() is still called")));
        }
        let (start, end) = removal_span(source, &method);
        return Ok(Rewrite::from_edits(
            source,
            vec![TextEdit::delete(start, end, format!("remove method {element}"))],
            format!("Removed unused private method {element}()"),
        )?);
    }

    if let Some(field) = private_field(root, source, element) {
        let declarator = single_declarator(field, element)?;
        if mentioned_outside(root, source, element, field) {
            return Err(StrategyError::apply(NAME, format!("field {element} is still used")));
        }
        check_initializer(declarator, element)?;
        let (start, end) = removal_span(source, &field);
        return Ok(Rewrite::from_edits(
            source,
            vec![TextEdit::delete(start, end, format!("remove field {element}"))],
            format!("Removed unused private field {element}"),
        )?);
    }

    let local = local_declaration(root, source, record, element).ok_or_else(|| {
        StrategyError::apply(NAME, format!("no removable declaration of {element}"))
    })?;
    let declarator = single_declarator(local, element)?;
    let scope = java::ancestor(local, java::CALLABLES)
        .or_else(|| local.parent())
        .unwrap_or(root);
    if !java::variable_references(scope, source, element).is_empty() {
        return Err(StrategyError::apply(NAME, format!("{element} is still used")));
    }
    check_initializer(declarator, element)?;
    let (start, end) = java::full_line_span(source, local.start_byte(), local.end_byte());
    Ok(Rewrite::from_edits(
        source,
        vec![TextEdit::delete(start, end, format!("remove local {element}"))],
        format!("Removed unused variable {element}"),
    )?)
}

fn private_method<'t>(root: Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    java::descendants_of_kind(root, &["method_declaration"])
        .into_iter()
        .find(|m| {
            java::declared_name(m, source) == Some(name) && java::has_modifier(m, source, "private")
        })
}

/// Any call or method reference to `name` outside the method's own body.
fn is_called(root: Node, source: &str, name: &str, method: Node) -> bool {
    let outside = |n: &Node| n.start_byte() < method.start_byte() || n.end_byte() > method.end_byte();
    let calls = java::descendants_of_kind(root, &["method_invocation"])
        .into_iter()
        .any(|c| java::declared_name(&c, source) == Some(name) && outside(&c));
    let references = java::descendants_of_kind(root, &["method_reference"])
        .into_iter()
        .any(|r| java::text(&r, source).ends_with(&format!("::{name}")) && outside(&r));
    calls || references
}

fn private_field<'t>(root: Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    java::descendants_of_kind(root, &["field_declaration"])
        .into_iter()
        .find(|f| java::has_modifier(f, source, "private") && declares(*f, source, name))
}

fn local_declaration<'t>(
    root: Node<'t>,
    source: &str,
    record: &DefectRecord,
    name: &str,
) -> Option<Node<'t>> {
    let locals: Vec<Node<'t>> = java::descendants_of_kind(root, &["local_variable_declaration"])
        .into_iter()
        .filter(|l| declares(*l, source, name))
        .collect();
    locals
        .iter()
        .find(|l| record.covers_line(java::line_of(l)))
        .or_else(|| {
            let method = java::find_method(root, source, None, record.start_line)?;
            locals.iter().find(|l| {
                l.start_byte() >= method.start_byte() && l.end_byte() <= method.end_byte()
            })
        })
        .copied()
}

fn declares(declaration: Node, source: &str, name: &str) -> bool {
    let mut cursor = declaration.walk();
    let found = declaration
        .children_by_field_name("declarator", &mut cursor)
        .any(|d| java::declared_name(&d, source) == Some(name));
    found
}

fn single_declarator<'t>(declaration: Node<'t>, name: &str) -> Result<Node<'t>, StrategyError> {
    let mut cursor = declaration.walk();
    let declarators: Vec<Node<'t>> = declaration
        .children_by_field_name("declarator", &mut cursor)
        .collect();
    match declarators.as_slice() {
        [only] => Ok(*only),
        _ => Err(StrategyError::apply(
            NAME,
            format!("{name} shares its declaration with other variables"),
        )),
    }
}

fn check_initializer(declarator: Node, name: &str) -> Result<(), StrategyError> {
    match declarator.child_by_field_name("value") {
        Some(value) if java::has_side_effects(value) => Err(StrategyError::apply(
            NAME,
            format!("initializer of {name} has side effects"),
        )),
        _ => Ok(()),
    }
}

/// Any identifier spelled `name` outside `skip`, method names excluded.
fn mentioned_outside(root: Node, source: &str, name: &str, skip: Node) -> bool {
    let mut found = false;
    java::walk(root, &mut |n| {
        if found || n.id() == skip.id() {
            return false;
        }
        if n.kind() == "identifier" && java::text(&n, source) == name {
            let is_method_name = n.parent().is_some_and(|p| {
                p.kind() == "method_invocation"
                    && p.child_by_field_name("name").is_some_and(|c| c.id() == n.id())
            });
            found = !is_method_name;
        }
        true
    });
    found
}

fn remove_unreachable(
    root: Node,
    source: &str,
    record: &DefectRecord,
) -> Result<Rewrite, StrategyError> {
    let mut edits = Vec::new();
    for block in java::descendants_of_kind(root, &["block", "switch_block_statement_group"]) {
        let statements = java::named_children(block);
        let Some(terminator) = statements
            .iter()
            .position(|s| java::TERMINATORS.contains(&s.kind()))
        else {
            continue;
        };
        let dead: Vec<&Node> = statements[terminator + 1..]
            .iter()
            .filter(|s| record.covers_line(java::line_of(s)))
            .collect();
        if let (Some(first), Some(last)) = (dead.first(), dead.last()) {
            let (start, end) = java::full_line_span(source, first.start_byte(), last.end_byte());
            edits.push(TextEdit::delete(
                start,
                end,
                format!("remove unreachable code at line {}", java::line_of(first)),
            ));
        }
    }

    if edits.is_empty() {
        return Err(StrategyError::apply(
            NAME,
            format!(
                "no unreachable statements in lines {}-{}",
                record.start_line,
                record.end_line()
            ),
        ));
    }
    let count = edits.len();
    Ok(Rewrite::from_edits(
        source,
        edits,
        format!("Removed {count} unreachable statement run(s)"),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"class Ledger {
    private int unused = 0;
    private int audits = 0;
    private java.util.List<String> log = new java.util.ArrayList<>();

    public int balance(int credit, int debit) {
        int spare = credit * 2;
        audits++;
        return credit - debit;
    }

    // Formats an amount.
    private String format(int amount) {
        return "$" + amount;
    }
}
"#;

    fn content(record: &DefectRecord, source: &str) -> Result<String, StrategyError> {
        match compute_rewrite(&RemoveDeadCode, record, source)? {
            Rewrite::Edit { content, .. } => Ok(content),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_removes_unused_private_method_with_comment() {
        let record =
            DefectRecord::new("unused-private-method", "Ledger.java", 13).with_element("format");
        let result = content(&record, SOURCE).unwrap();
        assert!(!result.contains("format"));
        assert!(!result.contains("Formats an amount"));
        assert!(result.contains("return credit - debit;"));
    }

    #[test]
    fn test_removes_unused_field() {
        let record = DefectRecord::new("unused-private-field", "Ledger.java", 2).with_element("unused");
        let result = content(&record, SOURCE).unwrap();
        assert!(!result.contains("unused"));
        assert!(result.contains("private int audits = 0;"));
    }

    #[test]
    fn test_refuses_used_field_and_side_effects() {
        let used = DefectRecord::new("unused-private-field", "Ledger.java", 3).with_element("audits");
        assert!(content(&used, SOURCE).is_err());

        let effect = DefectRecord::new("dead-code", "Ledger.java", 4).with_element("log");
        let err = content(&effect, SOURCE).unwrap_err();
        assert!(err.to_string().contains("side effects"));
    }

    #[test]
    fn test_removes_unused_local() {
        let record = DefectRecord::new("unused-variable", "Ledger.java", 7).with_element("spare");
        let result = content(&record, SOURCE).unwrap();
        assert!(!result.contains("spare"));
        assert!(result.contains("    public int balance(int credit, int debit) {\n        audits++;"));
    }

    #[test]
    fn test_removes_statements_after_return() {
        let source = "class A {\n    int f(int x) {\n        return x;\n        x++;\n        System.out.println(x);\n    }\n}\n";
        let record = DefectRecord::new("unreachable-code", "A.java", 4).with_end_line(5);
        let result = content(&record, source).unwrap();
        assert_eq!(result, "class A {\n    int f(int x) {\n        return x;\n    }\n}\n");
    }

    #[test]
    fn test_nothing_unreachable_is_refused() {
        let record = DefectRecord::new("unreachable-code", "Ledger.java", 7).with_end_line(8);
        assert!(content(&record, SOURCE).is_err());
    }
}
