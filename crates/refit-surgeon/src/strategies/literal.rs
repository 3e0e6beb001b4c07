//! Replace a magic literal with a named `private static final` constant.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use crate::format::{extract_line_prefix, indent_deeper, infer_indent_style};
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "literal-extraction";

/// Well-known values that get a conventional name instead of a generated one.
const KNOWN_CONSTANTS: &[(f64, &str)] = &[
    (std::f64::consts::PI, "PI"),
    (std::f64::consts::E, "E"),
];

pub struct ExtractConstant;

/// The literal picked on the defect line.
struct Target<'t> {
    /// Node replaced by the constant name (the literal, or its negation).
    node: Node<'t>,
    /// Value text used as the initializer.
    value: String,
    java_type: &'static str,
}

impl Strategy for ExtractConstant {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["magic-literal", "magic-number", "magic-string"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let root = tree.root_node();
        let target = pick_literal(root, source, record)?;
        let host = constant_host(target.node, source)?;

        let replace = |name: &str| {
            TextEdit::replace(
                target.node.start_byte(),
                target.node.end_byte(),
                name,
                format!("use constant {name}"),
            )
        };

        if let Some(existing) = existing_constant(host.members, source, &target) {
            let description = format!("Replaced {} with existing constant {}", target.value, existing);
            return Ok(Rewrite::from_edits(source, vec![replace(&existing)], description)?);
        }

        let name = java::unique_name(&constant_name(record, &target), &host.taken);
        let declaration = format!(
            "\n{}{} {} {} = {};\n",
            host.indent, host.modifiers, target.java_type, name, target.value
        );

        let edits = vec![
            TextEdit::insert(host.insert_at, declaration, format!("declare {name}")),
            replace(&name),
        ];
        let description = format!(
            "Extracted {} into constant {} {}",
            target.value, target.java_type, name
        );
        Ok(Rewrite::from_edits(source, edits, description)?)
    }
}

/// Where a new constant goes in the nearest enclosing type.
struct Host<'t> {
    /// Node whose direct children are the type's fields.
    members: Node<'t>,
    insert_at: usize,
    modifiers: &'static str,
    indent: String,
    taken: Vec<String>,
}

fn constant_host<'t>(node: Node<'t>, source: &str) -> Result<Host<'t>, StrategyError> {
    let decl = java::ancestor(node, java::TYPE_DECLARATIONS)
        .ok_or_else(|| StrategyError::apply(NAME, "literal is not inside a type"))?;
    let body = decl
        .child_by_field_name("body")
        .ok_or_else(|| StrategyError::apply(NAME, "enclosing type has no body"))?;
    let host = |members: Node<'t>, insert_at: usize, modifiers: &'static str| Host {
        members,
        insert_at,
        modifiers,
        indent: member_indent(body, source),
        taken: java::member_names(body, source),
    };

    match decl.kind() {
        "class_declaration" | "record_declaration" => {
            Ok(host(body, body.start_byte() + 1, "private static final"))
        }
        // Interface fields are implicitly public; `private` is rejected there.
        "interface_declaration" => Ok(host(body, body.start_byte() + 1, "static final")),
        "enum_declaration" => {
            // Constant arguments run before any field below them is initialized.
            let declarations = java::named_children(body)
                .into_iter()
                .find(|n| n.kind() == "enum_body_declarations")
                .filter(|d| d.start_byte() <= node.start_byte() && node.end_byte() <= d.end_byte())
                .ok_or_else(|| {
                    StrategyError::apply(NAME, "literal in an enum constant cannot use a later field")
                })?;
            let mut host = host(declarations, declarations.start_byte() + 1, "private static final");
            host.taken.extend(java::member_names(declarations, source));
            Ok(host)
        }
        other => Err(StrategyError::apply(
            NAME,
            format!("cannot declare a constant in {other}"),
        )),
    }
}

fn pick_literal<'t>(
    root: Node<'t>,
    source: &str,
    record: &DefectRecord,
) -> Result<Target<'t>, StrategyError> {
    let candidates: Vec<Node<'t>> = java::descendants_of_kind(root, java::EXTRACTABLE_LITERALS)
        .into_iter()
        .filter(|n| java::line_of(n) == record.start_line)
        .filter(|n| !inside_constant_declaration(*n, source))
        .collect();

    // Prefer the literal the message quotes; the longest quote wins so "3" never shadows "3.14".
    let quoted = candidates
        .iter()
        .filter(|n| !record.message.is_empty() && record.message.contains(java::text(n, source)))
        .max_by_key(|n| n.end_byte() - n.start_byte());
    let literal = quoted.or(candidates.first()).copied().ok_or_else(|| {
        StrategyError::apply(
            NAME,
            format!("no extractable literal on line {}", record.start_line),
        )
    })?;

    let text = java::text(&literal, source);
    let negated = literal.parent().filter(|p| {
        p.kind() == "unary_expression"
            && p.child_by_field_name("operator")
                .is_some_and(|op| java::text(&op, source) == "-")
    });
    let (node, value) = match negated {
        Some(parent) => (parent, format!("-{text}")),
        None => (literal, text.to_string()),
    };

    Ok(Target {
        node,
        value,
        java_type: literal_type(literal.kind(), text),
    })
}

fn inside_constant_declaration(node: Node, source: &str) -> bool {
    java::ancestor(node, &["field_declaration", "constant_declaration"]).is_some_and(|field| {
        field.kind() == "constant_declaration"
            || (java::has_modifier(&field, source, "static")
                && java::has_modifier(&field, source, "final"))
    })
}

/// Java type implied by the literal's shape.
fn literal_type(kind: &str, text: &str) -> &'static str {
    match kind {
        "string_literal" => "String",
        "character_literal" => "char",
        "decimal_floating_point_literal" => {
            if text.ends_with(['f', 'F']) {
                "float"
            } else {
                "double"
            }
        }
        _ => {
            if text.ends_with(['l', 'L']) {
                "long"
            } else {
                "int"
            }
        }
    }
}

/// A `static final` field of the same type and value, if the class has one.
fn existing_constant(body: Node, source: &str, target: &Target) -> Option<String> {
    for field in java::named_children(body) {
        let is_constant = match field.kind() {
            "constant_declaration" => true,
            "field_declaration" => {
                java::has_modifier(&field, source, "static") && java::has_modifier(&field, source, "final")
            }
            _ => false,
        };
        if !is_constant {
            continue;
        }
        let same_type = field
            .child_by_field_name("type")
            .is_some_and(|t| java::text(&t, source) == target.java_type);
        if !same_type {
            continue;
        }
        let mut cursor = field.walk();
        for declarator in field.children_by_field_name("declarator", &mut cursor) {
            let matches = declarator
                .child_by_field_name("value")
                .is_some_and(|v| same_value(java::text(&v, source), target));
            if matches {
                return java::declared_name(&declarator, source).map(str::to_string);
            }
        }
    }
    None
}

fn same_value(initializer: &str, target: &Target) -> bool {
    if target.java_type == "String" || target.java_type == "char" {
        initializer == target.value
    } else {
        initializer.replace(' ', "") == target.value
    }
}

fn constant_name(record: &DefectRecord, target: &Target) -> String {
    if let Some(element) = record.element() {
        let candidate = java::to_upper_snake(element);
        if element != target.value && java::is_identifier(&candidate) {
            return candidate;
        }
    }

    let generated = match target.java_type {
        "String" => string_constant_name(&target.value),
        "char" => {
            let inner = target.value.trim_matches('\'');
            if inner.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!("CHAR_{}", inner.to_uppercase())
            } else {
                "CHAR_CONSTANT".to_string()
            }
        }
        _ => numeric_constant_name(&target.value),
    };
    if java::is_identifier(&generated) {
        generated
    } else {
        "CONSTANT".to_string()
    }
}

fn string_constant_name(value: &str) -> String {
    let inner = value.trim_matches('"');
    let words: Vec<&str> = inner
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take(4)
        .collect();
    let name = java::to_upper_snake(&words.join(" "));
    match name.chars().next() {
        Some(c) if c.is_alphabetic() => name,
        Some(_) => format!("TEXT_{name}"),
        None => "EMPTY_TEXT".to_string(),
    }
}

fn numeric_constant_name(value: &str) -> String {
    let radix_prefixed = value
        .trim_start_matches('-')
        .get(..2)
        .is_some_and(|p| matches!(p, "0x" | "0X" | "0b" | "0B"));
    let digits = if radix_prefixed {
        value.trim_end_matches(['l', 'L'])
    } else {
        value.trim_end_matches(['l', 'L', 'f', 'F', 'd', 'D'])
    };
    if let Ok(parsed) = digits.replace('_', "").parse::<f64>() {
        for (known, name) in KNOWN_CONSTANTS {
            if digits.contains('.') && (parsed - known).abs() < 1e-3 {
                return name.to_string();
            }
        }
    }
    let sanitized = digits
        .replace('-', "NEG_")
        .replace('.', "_")
        .to_uppercase();
    format!("VALUE_{sanitized}")
}

fn member_indent(body: Node, source: &str) -> String {
    match java::named_children(body).first() {
        Some(member) => extract_line_prefix(source, member.start_byte()),
        None => {
            let decl_prefix = extract_line_prefix(source, body.start_byte());
            indent_deeper(&decl_prefix, &infer_indent_style(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const CIRCLE: &str = r#"public class Circle {
    public double area(double r) {
        return 3.14159 * r * r;
    }
}
"#;

    fn rewrite(source: &str, record: &DefectRecord) -> Result<String, StrategyError> {
        match compute_rewrite(&ExtractConstant, record, source)? {
            Rewrite::Edit { content, .. } => Ok(content),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_extracts_pi() {
        let record = DefectRecord::new("magic-literal", "Circle.java", 3);
        let content = rewrite(CIRCLE, &record).unwrap();
        assert!(content.contains("    private static final double PI = 3.14159;\n"));
        assert!(content.contains("return PI * r * r;"));
    }

    #[test]
    fn test_line_shift_covers_new_constant() {
        let record = DefectRecord::new("magic-literal", "Circle.java", 3);
        match compute_rewrite(&ExtractConstant, &record, CIRCLE).unwrap() {
            Rewrite::Edit { shifts, .. } => {
                assert_eq!(shifts.len(), 1);
                assert_eq!(shifts[0].after_line, 1);
                assert_eq!(shifts[0].delta, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_message_picks_quoted_literal() {
        let source = "class Retry {\n    int wait(int n) {\n        return n * 3 + 250;\n    }\n}\n";
        let record =
            DefectRecord::new("magic-number", "Retry.java", 3).with_message("Magic number 250");
        let content = rewrite(source, &record).unwrap();
        assert!(content.contains("private static final int VALUE_250 = 250;"));
        assert!(content.contains("return n * 3 + VALUE_250;"));
    }

    #[test]
    fn test_element_names_constant_and_negatives_are_kept() {
        let source = "class Probe {\n    int missing() {\n        return -1;\n    }\n}\n";
        let record =
            DefectRecord::new("magic-number", "Probe.java", 3).with_element("notFound");
        let content = rewrite(source, &record).unwrap();
        assert!(content.contains("private static final int NOT_FOUND = -1;"));
        assert!(content.contains("return NOT_FOUND;"));
    }

    #[test]
    fn test_string_literal_and_existing_constant() {
        let source = r#"class Greeter {
    private static final String GREETING = "hello world";

    String greet() {
        return "hello world";
    }
}
"#;
        let record = DefectRecord::new("magic-string", "Greeter.java", 5);
        let content = rewrite(source, &record).unwrap();
        assert!(content.contains("return GREETING;"));
        assert_eq!(content.matches("static final").count(), 1);
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let source = "class Timer {\n    int VALUE_60;\n\n    int minutes(int s) {\n        return s / 60;\n    }\n}\n";
        let record = DefectRecord::new("magic-number", "Timer.java", 5);
        let content = rewrite(source, &record).unwrap();
        assert!(content.contains("private static final int VALUE_602 = 60;"));
    }

    #[test]
    fn test_enum_constant_goes_after_the_constants() {
        let source = "enum Level {\n    LOW, HIGH;\n\n    int weight() {\n        return this == HIGH ? 10 : 1;\n    }\n}\n";
        let record =
            DefectRecord::new("magic-number", "Level.java", 5).with_message("Magic number 10");
        let content = rewrite(source, &record).unwrap();
        assert!(content.starts_with(
            "enum Level {\n    LOW, HIGH;\n    private static final int VALUE_10 = 10;\n"
        ));
        assert!(content.contains("return this == HIGH ? VALUE_10 : 1;"));
    }

    #[test]
    fn test_literal_in_enum_constant_arguments_is_refused() {
        let source = "enum Size {\n    SMALL(1), LARGE(8);\n\n    final int units;\n\n    Size(int units) {\n        this.units = units;\n    }\n}\n";
        let record = DefectRecord::new("magic-number", "Size.java", 2).with_message("8");
        let err = rewrite(source, &record).unwrap_err();
        assert!(err.to_string().contains("enum constant"), "{err}");
    }

    #[test]
    fn test_interface_constant_has_no_private_modifier() {
        let source = "interface Clock {\n    default long millis(long s) {\n        return s * 1000L;\n    }\n}\n";
        let record = DefectRecord::new("magic-number", "Clock.java", 3);
        let content = rewrite(source, &record).unwrap();
        assert!(content.contains("    static final long VALUE_1000 = 1000L;\n"));
        assert!(!content.contains("private"));
        assert!(content.contains("return s * VALUE_1000;"));
    }

    #[test]
    fn test_line_without_literal_is_refused() {
        let record = DefectRecord::new("magic-literal", "Circle.java", 2);
        let err = rewrite(CIRCLE, &record).unwrap_err();
        assert!(matches!(err, StrategyError::Apply { .. }));
    }
}
