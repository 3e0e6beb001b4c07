//! Collapse redundant boolean comparisons, double negations, boolean
//! ternaries and `if (c) return true; else return false;`.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "conditional-simplification";

/// Expressions that can be negated or spliced without parentheses.
const ATOMIC: &[&str] = &[
    "identifier",
    "field_access",
    "method_invocation",
    "parenthesized_expression",
    "array_access",
    "true",
    "false",
    "this",
];

/// Parents in which a spliced expression never needs parentheses.
const LOOSE_CONTEXTS: &[&str] = &[
    "parenthesized_expression",
    "expression_statement",
    "return_statement",
    "variable_declarator",
    "argument_list",
];

pub struct SimplifyConditional;

impl Strategy for SimplifyConditional {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &[
            "redundant-boolean",
            "simplifiable-conditional",
            "complex-conditional",
        ]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let mut edits = Vec::new();
        java::walk(tree.root_node(), &mut |node| {
            if java::end_line_of(&node) < record.start_line || java::line_of(&node) > record.end_line() {
                return false;
            }
            if !record.covers_line(java::line_of(&node)) {
                return true;
            }
            match simplify(node, source) {
                Some(edit) => {
                    edits.push(edit);
                    false
                }
                None => true,
            }
        });

        if edits.is_empty() {
            return Err(StrategyError::apply(
                NAME,
                format!(
                    "nothing to simplify in lines {}-{}",
                    record.start_line,
                    record.end_line()
                ),
            ));
        }
        let count = edits.len();
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!("Simplified {count} boolean expression(s)"),
        )?)
    }
}

fn simplify(node: Node, source: &str) -> Option<TextEdit> {
    let replacement = match node.kind() {
        "binary_expression" => comparison_with_literal(node, source)?,
        "unary_expression" => double_negation(node, source)?,
        "ternary_expression" => boolean_ternary(node, source)?,
        "if_statement" => return boolean_return_if(node, source),
        _ => return None,
    };
    Some(TextEdit::replace(
        node.start_byte(),
        node.end_byte(),
        replacement,
        format!("simplify {}", node.kind()),
    ))
}

/// `x == true`, `x != false`, `false == x` and friends.
fn comparison_with_literal(node: Node, source: &str) -> Option<String> {
    let operator = java::text(&node.child_by_field_name("operator")?, source);
    let left = node.child_by_field_name("left")?;
    let right = node.child_by_field_name("right")?;
    let (operand, literal) = match (bool_literal(&left), bool_literal(&right)) {
        (None, Some(value)) => (left, value),
        (Some(value), None) => (right, value),
        _ => return None,
    };
    let keep = match operator {
        "==" => literal,
        "!=" => !literal,
        _ => return None,
    };
    Some(if keep {
        splice(operand, source, node)
    } else {
        negate(operand, source)
    })
}

/// `!!x` becomes `x`.
fn double_negation(node: Node, source: &str) -> Option<String> {
    let inner = negated_operand(node, source)?;
    let operand = negated_operand(inner, source)?;
    Some(splice(operand, source, node))
}

/// `c ? true : false` becomes `c`; `c ? false : true` becomes `!c`.
fn boolean_ternary(node: Node, source: &str) -> Option<String> {
    let condition = node.child_by_field_name("condition")?;
    let consequence = bool_literal(&node.child_by_field_name("consequence")?)?;
    let alternative = bool_literal(&node.child_by_field_name("alternative")?)?;
    match (consequence, alternative) {
        (true, false) => Some(splice(condition, source, node)),
        (false, true) => Some(negate(condition, source)),
        _ => None,
    }
}

/// `if (c) { return true; } else { return false; }` becomes `return c;`.
/// A missing `else` may be replaced by a directly following `return false;`.
fn boolean_return_if(node: Node, source: &str) -> Option<TextEdit> {
    let condition = node.child_by_field_name("condition")?;
    let when_true = returned_bool(node.child_by_field_name("consequence")?)?;
    let (when_false, end) = match node.child_by_field_name("alternative") {
        Some(alternative) => (returned_bool(alternative)?, node.end_byte()),
        None => {
            let next = node.next_named_sibling().filter(|n| !java::is_comment(n))?;
            (returned_bool(next)?, next.end_byte())
        }
    };
    if when_true == when_false {
        return None;
    }
    let inner = java::named_children(condition).into_iter().next()?;
    let expression = if when_true {
        java::text(&inner, source).to_string()
    } else {
        negate(inner, source)
    };
    Some(TextEdit::replace(
        node.start_byte(),
        end,
        format!("return {expression};"),
        "collapse boolean if",
    ))
}

fn bool_literal(node: &Node) -> Option<bool> {
    match node.kind() {
        "true" => Some(true),
        "false" => Some(false),
        "parenthesized_expression" => bool_literal(&node.named_child(0)?),
        _ => None,
    }
}

/// `return true;`, alone or as the only statement of a block.
fn returned_bool(statement: Node) -> Option<bool> {
    match statement.kind() {
        "return_statement" => bool_literal(&statement.named_child(0)?),
        "block" => match java::named_children(statement).as_slice() {
            [only] => returned_bool(*only),
            _ => None,
        },
        _ => None,
    }
}

fn negated_operand<'t>(node: Node<'t>, source: &str) -> Option<Node<'t>> {
    if node.kind() != "unary_expression" {
        return None;
    }
    let operator = node.child_by_field_name("operator")?;
    if java::text(&operator, source) != "!" {
        return None;
    }
    node.child_by_field_name("operand")
}

fn negate(expression: Node, source: &str) -> String {
    let text = java::text(&expression, source);
    if ATOMIC.contains(&expression.kind()) {
        format!("!{text}")
    } else {
        format!("!({text})")
    }
}

/// Text of `expression` to stand in for `replaced`, parenthesized when the
/// surrounding expression could rebind it.
fn splice(expression: Node, source: &str, replaced: Node) -> String {
    let text = java::text(&expression, source);
    let loose = replaced
        .parent()
        .is_some_and(|p| LOOSE_CONTEXTS.contains(&p.kind()));
    if loose || ATOMIC.contains(&expression.kind()) {
        text.to_string()
    } else {
        format!("({text})")
    }
}
