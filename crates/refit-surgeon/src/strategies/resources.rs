//! Turn a manually closed resource into try-with-resources.

use super::{Rewrite, Strategy, StrategyError};
use crate::defect::DefectRecord;
use crate::edit::TextEdit;
use crate::format::{extract_line_prefix, indent_code, indent_unit, infer_indent_style};
use refit_lang::java;
use tree_sitter::{Node, Tree};

const NAME: &str = "resource-management";

pub struct TryWithResources;

impl Strategy for TryWithResources {
    fn name(&self) -> &'static str {
        NAME
    }

    fn categories(&self) -> &'static [&'static str] {
        &["resource-leak", "unclosed-resource"]
    }

    fn rewrite(
        &self,
        record: &DefectRecord,
        source: &str,
        tree: &Tree,
    ) -> Result<Rewrite, StrategyError> {
        let declaration = resource_declaration(tree.root_node(), source, record)?;
        let block = declaration
            .parent()
            .filter(|p| p.kind() == "block")
            .ok_or_else(|| StrategyError::apply(NAME, "resource is not declared in a block"))?;
        let resource = resource_name(declaration, source)?;

        let statements = java::named_children(block);
        let at = statements
            .iter()
            .position(|s| s.id() == declaration.id())
            .ok_or_else(|| StrategyError::apply(NAME, "declaration not found in its block"))?;
        let following = &statements[at + 1..];

        let close = following
            .iter()
            .position(|s| is_close_call(*s, source, resource));
        let (region, replaced_end, rest) = match close {
            Some(c) => (&following[..c], following[c].end_byte(), &following[c + 1..]),
            None => {
                let last = following
                    .iter()
                    .rposition(|s| !java::variable_references(*s, source, resource).is_empty())
                    .ok_or_else(|| {
                        StrategyError::apply(NAME, format!("{resource} is never used"))
                    })?;
                (&following[..=last], following[last].end_byte(), &following[last + 1..])
            }
        };

        if rest
            .iter()
            .any(|s| !java::variable_references(*s, source, resource).is_empty())
        {
            return Err(StrategyError::apply(
                NAME,
                format!("{resource} is used after it is closed"),
            ));
        }
        for local in declared_locals(region, source) {
            if rest
                .iter()
                .any(|s| !java::variable_references(*s, source, &local).is_empty())
            {
                return Err(StrategyError::apply(
                    NAME,
                    format!("{local} is declared inside the resource scope and used after it"),
                ));
            }
        }

        let indent = extract_line_prefix(source, declaration.start_byte());
        let unit = indent_unit(&infer_indent_style(source));
        let header = java::text(&declaration, source).trim_end_matches(';').trim_end();
        let body = match (region.first(), region.last()) {
            (Some(first), Some(last)) => {
                let from = java::line_start(source, first.start_byte());
                let text = &source[from..last.end_byte()];
                format!("{unit}{}\n", indent_code(text, &unit))
            }
            _ => String::new(),
        };
        let replacement = format!("try ({header}) {{\n{body}{indent}}}");

        let edits = vec![TextEdit::replace(
            declaration.start_byte(),
            replaced_end,
            replacement,
            format!("wrap {resource} in try-with-resources"),
        )];
        Ok(Rewrite::from_edits(
            source,
            edits,
            format!("Wrapped {resource} in try-with-resources"),
        )?)
    }
}

fn resource_declaration<'t>(
    root: Node<'t>,
    source: &str,
    record: &DefectRecord,
) -> Result<Node<'t>, StrategyError> {
    java::descendants_of_kind(root, &["local_variable_declaration"])
        .into_iter()
        .filter(|d| java::line_of(d) == record.start_line)
        .filter(|d| match record.element() {
            Some(element) => resource_name(*d, source).ok() == Some(element),
            None => true,
        })
        .find(|d| {
            let mut cursor = d.walk();
            let allocates = d.children_by_field_name("declarator", &mut cursor).any(|v| {
                v.child_by_field_name("value").is_some_and(|value| {
                    matches!(value.kind(), "object_creation_expression" | "method_invocation")
                })
            });
            allocates
        })
        .ok_or_else(|| {
            StrategyError::apply(
                NAME,
                format!("no resource allocation on line {}", record.start_line),
            )
        })
}

fn resource_name<'a>(declaration: Node, source: &'a str) -> Result<&'a str, StrategyError> {
    let mut cursor = declaration.walk();
    let declarators: Vec<Node> = declaration
        .children_by_field_name("declarator", &mut cursor)
        .collect();
    match declarators.as_slice() {
        [only] => java::declared_name(only, source)
            .ok_or_else(|| StrategyError::apply(NAME, "declarator has no name")),
        _ => Err(StrategyError::apply(
            NAME,
            "declaration introduces more than one variable",
        )),
    }
}

/// `resource.close();`
fn is_close_call(statement: Node, source: &str, resource: &str) -> bool {
    if statement.kind() != "expression_statement" {
        return false;
    }
    let Some(call) = statement.named_child(0).filter(|c| c.kind() == "method_invocation") else {
        return false;
    };
    let on_resource = call
        .child_by_field_name("object")
        .is_some_and(|o| o.kind() == "identifier" && java::text(&o, source) == resource);
    on_resource
        && java::declared_name(&call, source) == Some("close")
        && java::call_arguments(call).is_empty()
}

/// Names declared by the top-level statements of `region`.
fn declared_locals(region: &[Node], source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for statement in region.iter().filter(|s| s.kind() == "local_variable_declaration") {
        let mut cursor = statement.walk();
        for declarator in statement.children_by_field_name("declarator", &mut cursor) {
            if let Some(name) = java::declared_name(&declarator, source) {
                names.push(name.to_string());
            }
        }
    }
    names
}
