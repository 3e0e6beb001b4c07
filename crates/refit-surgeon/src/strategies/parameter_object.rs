//! Bundle a long parameter list into a nested parameter class.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use crate::format::{extract_line_prefix, indent_deeper, infer_indent_style, IndentStyle};
use refit_lang::java;
use tree_sitter::Tree;

const NAME: &str = "parameter-object";

pub struct IntroduceParameterObject {
    max_parameters: usize,
}

impl IntroduceParameterObject {
    pub fn new(max_parameters: usize) -> Self {
        Self { max_parameters }
    }
}

impl Strategy for IntroduceParameterObject {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["long-parameter-list"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let root = tree.root_node();
        let method = java::find_method(root, source, record.element(), record.start_line)
            .ok_or_else(|| StrategyError::apply(NAME, "no method at the defect location"))?;
        if method.kind() != "method_declaration" {
            return Err(StrategyError::apply(NAME, "constructors are not rewritten"));
        }
        let name = java::declared_name(&method, source)
            .ok_or_else(|| StrategyError::apply(NAME, "method has no name"))?;
        let params = java::formal_parameters(&method, source).ok_or_else(|| {
            StrategyError::apply(NAME, "varargs and receiver parameters are not supported")
        })?;
        if params.len() <= self.max_parameters {
            return Err(StrategyError::apply(
                NAME,
                format!(
                    "{name} has {} parameters, limit is {}",
                    params.len(),
                    self.max_parameters
                ),
            ));
        }
        let body = method
            .child_by_field_name("body")
            .ok_or_else(|| StrategyError::apply(NAME, "abstract methods are not rewritten"))?;
        let class_body = java::enclosing_class_body(method)
            .ok_or_else(|| StrategyError::apply(NAME, "method is not inside a class"))?;
        if params.iter().any(|(_, p)| *p == "params") {
            return Err(StrategyError::apply(NAME, "a parameter is already named params"));
        }

        let overloads = java::callables(class_body)
            .into_iter()
            .filter(|m| java::declared_name(m, source) == Some(name))
            .count();
        if overloads > 1 {
            return Err(StrategyError::apply(
                NAME,
                format!("{name} is overloaded; call sites are ambiguous"),
            ));
        }

        let taken = java::member_names(class_body, source);
        let class_name = java::unique_name(&format!("{}Params", java::to_pascal_case(name)), &taken);
        let style = infer_indent_style(source);
        let member_indent = extract_line_prefix(source, method.start_byte());
        let parameter_list = method
            .child_by_field_name("parameters")
            .ok_or_else(|| StrategyError::apply(NAME, "method has no parameter list"))?;

        let mut edits = vec![
            TextEdit::replace(
                parameter_list.start_byte(),
                parameter_list.end_byte(),
                format!("({class_name} params)"),
                "replace parameter list",
            ),
            TextEdit::insert(
                body.start_byte() + 1,
                unpack_fields(&params, &member_indent, &style),
                "unpack parameter object",
            ),
            TextEdit::insert(
                method.end_byte(),
                format!(
                    "\n\n{}",
                    parameter_class(&class_name, &params, &member_indent, &style)
                ),
                format!("declare {class_name}"),
            ),
        ];

        let mut rewritten_calls = 0;
        for call in java::local_calls(root, source, name) {
            let args = java::call_arguments(call);
            if args.len() != params.len() {
                continue;
            }
            let Some(arguments) = call.child_by_field_name("arguments") else {
                continue;
            };
            let joined: Vec<&str> = args.iter().map(|a| java::text(a, source)).collect();
            edits.push(TextEdit::replace(
                arguments.start_byte(),
                arguments.end_byte(),
                format!("(new {class_name}({}))", joined.join(", ")),
                format!("wrap arguments at line {}", java::line_of(&call)),
            ));
            rewritten_calls += 1;
        }

        Ok(Rewrite::from_edits(
            source,
            edits,
            format!(
                "Introduced {class_name} for {name} ({} parameters, {rewritten_calls} call site(s))",
                params.len()
            ),
        )?)
    }
}

/// Local copies of every field, placed at the top of the body.
fn unpack_fields(params: &[(&str, &str)], member_indent: &str, style: &IndentStyle) -> String {
    let indent = indent_deeper(member_indent, style);
    params
        .iter()
        .map(|(ty, name)| format!("\n{indent}{ty} {name} = params.{name};"))
        .collect()
}

fn parameter_class(
    class_name: &str,
    params: &[(&str, &str)],
    member_indent: &str,
    style: &IndentStyle,
) -> String {
    let field_indent = indent_deeper(member_indent, style);
    let body_indent = indent_deeper(&field_indent, style);

    let mut out = format!("{member_indent}static final class {class_name} {{\n");
    for (ty, name) in params {
        out.push_str(&format!("{field_indent}final {ty} {name};\n"));
    }
    let signature: Vec<String> = params.iter().map(|(ty, name)| format!("{ty} {name}")).collect();
    out.push_str(&format!(
        "\n{field_indent}{class_name}({}) {{\n",
        signature.join(", ")
    ));
    for (_, name) in params {
        out.push_str(&format!("{body_indent}this.{name} = {name};\n"));
    }
    out.push_str(&format!("{field_indent}}}\n{member_indent}}}"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::compute_rewrite;

    const SOURCE: &str = r#"class Accounts {
    int create(String name, int age, String email, boolean admin) {
        return name.length() + age + email.length() + (admin ? 1 : 0);
    }

    int seed() {
        return create("root", 40, "root@example.com", true);
    }
}
"#;

    #[test]
    fn test_introduces_parameter_class() {
        let strategy = IntroduceParameterObject::new(3);
        let record = DefectRecord::new("long-parameter-list", "Accounts.java", 2);
        let content = match compute_rewrite(&strategy, &record, SOURCE).unwrap() {
            Rewrite::Edit { content, .. } => content,
            other => panic!("unexpected {other:?}"),
        };

        assert!(content.contains("    int create(CreateParams params) {\n        String name = params.name;\n        int age = params.age;"));
        assert!(content.contains("    static final class CreateParams {\n        final String name;\n"));
        assert!(content.contains("        CreateParams(String name, int age, String email, boolean admin) {\n            this.name = name;\n"));
        assert!(content.contains(r#"return create(new CreateParams("root", 40, "root@example.com", true));"#));
    }

    #[test]
    fn test_short_list_is_refused() {
        let strategy = IntroduceParameterObject::new(4);
        let record = DefectRecord::new("long-parameter-list", "Accounts.java", 2).with_element("create");
        let err = compute_rewrite(&strategy, &record, SOURCE).unwrap_err();
        assert!(err.to_string().contains("limit is 4"));
    }
}
