//! Turning accepted blocks into new private methods.
//!
//! Blocks are extracted one at a time. Each pass re-parses the unit,
//! finds the method again by its start byte and looks for the next block
//! after the call that replaced the previous one.

use super::blocks::{find_blocks_from, BlockParameter, BlockReturn, BlockSettings, CandidateBlock};
use super::ExtractError;
use crate::edit::{EditSet, TextEdit};
use crate::format::extract_line_prefix;
use crate::validate::{verify_parse, ValidationError};
use refit_lang::java;
use serde::Serialize;
use tree_sitter::Node;

/// Method names chosen by keywords found in the block text, first match wins.
const NAME_KEYWORDS: &[(&[&str], &str)] = &[
    (&["calculate", "compute", "sum", "total"], "calculateTotals"),
    (&["validate", "check", "verify"], "validateInputs"),
    (&["process", "handle"], "processItems"),
    (&["print", "log", "println"], "logDetails"),
    (&["load", "read"], "loadData"),
    (&["save", "write", "store"], "saveData"),
    (&["init", "setup"], "initializeState"),
    (&["build", "create"], "buildResult"),
];

/// One block lifted out of the method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub method_name: String,
    /// Lines of the block in the text it was extracted from.
    pub start_line: usize,
    pub end_line: usize,
    pub parameters: Vec<BlockParameter>,
    pub return_type: String,
}

#[derive(Debug, Clone)]
pub struct ExtractOutcome {
    pub content: String,
    pub extractions: Vec<Extraction>,
}

/// Extract every acceptable block of the method starting at `method_start`.
pub fn extract_all(
    source: &str,
    method_start: usize,
    settings: BlockSettings,
) -> Result<ExtractOutcome, ExtractError> {
    let mut current = source.to_string();
    let mut resume = 0;
    let mut extractions = Vec::new();
    while let Some((next, extraction, call_index)) =
        extract_next(&current, method_start, settings, resume)?
    {
        tracing::debug!(
            "Extracted lines {}-{} into {}",
            extraction.start_line,
            extraction.end_line,
            extraction.method_name
        );
        extractions.push(extraction);
        resume = call_index + 1;
        current = next;
    }
    Ok(ExtractOutcome {
        content: current,
        extractions,
    })
}

fn extract_next(
    source: &str,
    method_start: usize,
    settings: BlockSettings,
    resume: usize,
) -> Result<Option<(String, Extraction, usize)>, ExtractError> {
    let tree = verify_parse(source, &refit_lang::java()).map_err(|e| match e {
        ValidationError::SyntaxErrors { errors, .. } => ExtractError::InvalidResult { errors },
        other => ExtractError::Parser(other.to_string()),
    })?;
    let method = java::callables(tree.root_node())
        .into_iter()
        .find(|m| m.start_byte() == method_start)
        .ok_or(ExtractError::MethodLost(method_start))?;

    let Some(block) = find_blocks_from(method, source, settings, resume)
        .into_iter()
        .next()
    else {
        return Ok(None);
    };

    let taken = java::enclosing_class_body(method)
        .map(|body| java::member_names(body, source))
        .unwrap_or_default();
    let name = method_name(&source[block.start_byte..block.end_byte], &taken);
    let edits = extraction_edits(method, source, &block, &name);
    let next = EditSet::new(edits, source.len())?.apply(source);

    let extraction = Extraction {
        method_name: name,
        start_line: block.start_line,
        end_line: block.end_line,
        return_type: block.returns.java_type().to_string(),
        parameters: block.parameters,
    };
    Ok(Some((next, extraction, block.start_index)))
}

/// Name for a method holding `block_text`, unique among `taken`.
pub fn method_name(block_text: &str, taken: &[String]) -> String {
    let lower = block_text.to_lowercase();
    let keyword_name = NAME_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, name)| *name);
    match keyword_name {
        Some(base) => java::unique_name(base, taken),
        None => (1..)
            .map(|n| format!("extractedBlock{n}"))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_else(|| "extractedBlock".to_string()),
    }
}

/// The call replacing the block and the new method after `method`.
pub fn extraction_edits(
    method: Node,
    source: &str,
    block: &CandidateBlock,
    name: &str,
) -> Vec<TextEdit> {
    let indent = extract_line_prefix(source, block.start_byte);
    let member_indent = extract_line_prefix(source, method.start_byte());
    let arguments: Vec<&str> = block.parameters.iter().map(|p| p.name.as_str()).collect();
    let call = format!("{name}({})", arguments.join(", "));

    let replacement = match &block.returns {
        BlockReturn::Nothing => format!("{call};"),
        BlockReturn::Exit => format!("{call};\n{indent}return;"),
        BlockReturn::Value { .. } => format!("return {call};"),
        BlockReturn::Variable { name: var, java_type } => format!("{java_type} {var} = {call};"),
    };

    let mut body = source[java::line_start(source, block.start_byte)..block.end_byte].to_string();
    if let BlockReturn::Variable { name: var, .. } = &block.returns {
        body.push_str(&format!("\n{indent}return {var};"));
    }

    let modifiers = if java::has_modifier(&method, source, "static") {
        "private static "
    } else {
        "private "
    };
    let type_parameters = method
        .child_by_field_name("type_parameters")
        .map(|t| format!("{} ", java::text(&t, source)))
        .unwrap_or_default();
    let throws = java::named_children(method)
        .into_iter()
        .find(|c| c.kind() == "throws")
        .map(|t| format!(" {}", java::text(&t, source)))
        .unwrap_or_default();
    let signature: Vec<String> = block
        .parameters
        .iter()
        .map(|p| format!("{} {}", p.java_type, p.name))
        .collect();
    let declaration = format!(
        "\n\n{member_indent}{modifiers}{type_parameters}{} {name}({}){throws} {{\n{body}\n{member_indent}}}",
        block.returns.java_type(),
        signature.join(", "),
    );

    vec![
        TextEdit::replace(
            block.start_byte,
            block.end_byte,
            replacement,
            format!("call {name}"),
        ),
        TextEdit::insert(method.end_byte(), declaration, format!("declare {name}")),
    ]
}
