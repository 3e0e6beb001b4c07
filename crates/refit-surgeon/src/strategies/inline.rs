//! Inline a trivial private method at its call sites.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::{EditSet, TextEdit};
use crate::format::removal_span;
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "method-inlining";

/// Expressions that bind tighter than any operator they can be spliced into.
const PRIMARY: &[&str] = &[
    "identifier",
    "field_access",
    "method_invocation",
    "parenthesized_expression",
    "array_access",
    "this",
    "string_literal",
    "character_literal",
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "true",
    "false",
    "null_literal",
    "object_creation_expression",
];

/// Parents in which the inlined body needs no surrounding parentheses.
const LOOSE_CONTEXTS: &[&str] = &[
    "expression_statement",
    "return_statement",
    "variable_declarator",
    "argument_list",
    "parenthesized_expression",
];

pub struct InlineMethod;

impl Strategy for InlineMethod {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["lazy-method", "middle-man", "trivial-method"]
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
        if !java::has_modifier(&method, source, "private") {
            return Err(StrategyError::apply(NAME, format!("{name} is not private")));
        }
        let params = java::formal_parameters(&method, source)
            .ok_or_else(|| StrategyError::apply(NAME, "varargs are not supported"))?;
        let (expression, is_statement) = single_expression(method)
            .ok_or_else(|| StrategyError::apply(NAME, format!("{name} is not a single statement")))?;
        if !java::local_calls(method, source, name).is_empty() {
            return Err(StrategyError::apply(NAME, format!("{name} is recursive")));
        }

        let calls: Vec<Node> = java::local_calls(root, source, name)
            .into_iter()
            .filter(|c| c.start_byte() < method.start_byte() || c.end_byte() > method.end_byte())
            .collect();
        if calls.is_empty() {
            return Err(StrategyError::apply(NAME, format!("{name} has no callers to inline into")));
        }

        let mut edits = Vec::new();
        for call in &calls {
            let inlined = substitute(expression, source, &params, *call)?;
            let loose = call.parent().is_some_and(|p| LOOSE_CONTEXTS.contains(&p.kind()));
            let standalone = call.parent().is_some_and(|p| p.kind() == "expression_statement");
            if is_statement && !standalone {
                return Err(StrategyError::apply(
                    NAME,
                    format!("void {name}() is used as a value at line {}", java::line_of(call)),
                ));
            }
            let replacement = if loose || PRIMARY.contains(&expression.kind()) {
                inlined
            } else {
                format!("({inlined})")
            };
            edits.push(TextEdit::replace(
                call.start_byte(),
                call.end_byte(),
                replacement,
                format!("inline {name} at line {}", java::line_of(call)),
            ));
        }

        let (start, end) = removal_span(source, &method);
        edits.push(TextEdit::delete(start, end, format!("remove {name}")));
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!("Inlined {name}() at {} call site(s)", calls.len()),
        )?)
    }
}

/// The expression of a body made of one `return expr;` or one `expr;`.
/// The flag is true for the statement form.
fn single_expression(method: Node) -> Option<(Node, bool)> {
    match java::body_statements(method).as_slice() {
        [statement] => match statement.kind() {
            "return_statement" => statement.named_child(0).map(|e| (e, false)),
            "expression_statement" => statement.named_child(0).map(|e| (e, true)),
            _ => None,
        },
        _ => None,
    }
}

/// Text of `expression` with every parameter replaced by the call's argument.
fn substitute(
    expression: Node,
    source: &str,
    params: &[(&str, &str)],
    call: Node,
) -> Result<String, StrategyError> {
    let args = java::call_arguments(call);
    if args.len() != params.len() {
        return Err(StrategyError::apply(
            NAME,
            format!("call at line {} has {} arguments, expected {}", java::line_of(&call), args.len(), params.len()),
        ));
    }

    let base = expression.start_byte();
    let text = java::text(&expression, source);
    let mut edits = Vec::new();
    // Arguments run left to right before the body; effectful ones must
    // still appear in parameter order once spliced in.
    let mut last_effect: Option<(usize, &str)> = None;
    for ((_, param), arg) in params.iter().zip(&args) {
        let uses = java::variable_references(expression, source, param);
        if java::has_side_effects(*arg) {
            if uses.len() != 1 {
                return Err(StrategyError::apply(
                    NAME,
                    format!(
                        "argument for {param} at line {} has side effects and is used {} times",
                        java::line_of(&call),
                        uses.len()
                    ),
                ));
            }
            let at = uses[0].start_byte();
            if let Some((_, earlier)) = last_effect.filter(|(previous, _)| at < *previous) {
                return Err(StrategyError::apply(
                    NAME,
                    format!(
                        "arguments for {earlier} and {param} at line {} have side effects and would run out of order",
                        java::line_of(&call)
                    ),
                ));
            }
            last_effect = Some((at, *param));
        }
        let arg_text = java::text(arg, source);
        let replacement = if PRIMARY.contains(&arg.kind()) {
            arg_text.to_string()
        } else {
            format!("({arg_text})")
        };
        for usage in uses {
            edits.push(TextEdit::replace(
                usage.start_byte() - base,
                usage.end_byte() - base,
                replacement.clone(),
                format!("substitute {param}"),
            ));
        }
    }
    Ok(EditSet::new(edits, text.len())?.apply(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"class Calc {
    int run(int a) {
        int b = twice(a + 1) + 3;
        return twice(b);
    }

    private int twice(int x) {
        return x * 2;
    }
}
"#;

    fn content(source: &str, record: &DefectRecord) -> Result<String, StrategyError> {
        match compute_rewrite(&InlineMethod, record, source)? {
            Rewrite::Edit { content, .. } => Ok(content),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_inlines_all_call_sites() {
        let record = DefectRecord::new("lazy-method", "Calc.java", 7).with_element("twice");
        let result = content(SOURCE, &record).unwrap();
        assert!(result.contains("int b = ((a + 1) * 2) + 3;"));
        assert!(result.contains("return b * 2;"));
        assert!(!result.contains("twice"));
    }

    #[test]
    fn test_side_effect_argument_used_twice_is_refused() {
        let source = r#"class Calc {
    int run() {
        return square(next());
    }

    private int next() {
        return 4;
    }

    private int square(int x) {
        return x * x;
    }
}
"#;
        let record = DefectRecord::new("trivial-method", "Calc.java", 10).with_element("square");
        let err = content(source, &record).unwrap_err();
        assert!(err.to_string().contains("side effects"));
    }

    #[test]
    fn test_effectful_arguments_keep_evaluation_order() {
        let source = r#"class Calc {
    int run() {
        return diff(a(), b());
    }

    int sum() {
        return plus(a(), b());
    }

    private int a() {
        return 1;
    }

    private int b() {
        return 2;
    }

    private int diff(int x, int y) {
        return y - x;
    }

    private int plus(int x, int y) {
        return x + y;
    }
}
"#;
        let reversed = DefectRecord::new("trivial-method", "Calc.java", 18).with_element("diff");
        let err = content(source, &reversed).unwrap_err();
        assert!(err.to_string().contains("out of order"), "{err}");

        let ordered = DefectRecord::new("trivial-method", "Calc.java", 22).with_element("plus");
        let result = content(source, &ordered).unwrap();
        assert!(result.contains("return a() + b();"));
        assert!(result.contains("return diff(a(), b());"));
    }

    #[test]
    fn test_public_and_uncalled_methods_are_refused() {
        let source = "class A {\n    public int one() {\n        return 1;\n    }\n\n    private int two() {\n        return 2;\n    }\n}\n";
        let public = DefectRecord::new("middle-man", "A.java", 2);
        assert!(content(source, &public).unwrap_err().to_string().contains("not private"));
        let uncalled = DefectRecord::new("middle-man", "A.java", 6);
        assert!(content(source, &uncalled).unwrap_err().to_string().contains("no callers"));
    }
}
