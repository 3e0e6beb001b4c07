//! Cohesive statement windows that can be lifted into their own method.

use super::def_use::{statement_facts, MethodScope, StatementFacts};
use refit_lang::java;
use serde::Serialize;
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Window bounds, in top-level statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSettings {
    pub min_size: usize,
    pub max_size: usize,
}

impl BlockSettings {
    pub fn new(min_size: usize, max_size: usize) -> Self {
        let min_size = min_size.max(1);
        Self {
            min_size,
            max_size: max_size.max(min_size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockParameter {
    pub name: String,
    pub java_type: String,
}

/// How control and data leave an extracted block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReturn {
    /// Falls through; the call is a bare statement.
    Nothing,
    /// Ends with `return expr;`.
    Value { java_type: String },
    /// Ends with a bare `return;`.
    Exit,
    /// Declares a variable the rest of the method reads.
    Variable { name: String, java_type: String },
}

impl BlockReturn {
    pub fn java_type(&self) -> &str {
        match self {
            Self::Nothing | Self::Exit => "void",
            Self::Value { java_type } | Self::Variable { java_type, .. } => java_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateBlock {
    /// Index of the first statement in the method body.
    pub start_index: usize,
    /// Index of the last statement, inclusive.
    pub end_index: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    pub used: BTreeSet<String>,
    pub defined: BTreeSet<String>,
    /// `used − defined`, in order of first read.
    pub parameters: Vec<BlockParameter>,
    pub returns: BlockReturn,
}

impl CandidateBlock {
    pub fn statement_count(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn parameter_names(&self) -> BTreeSet<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// All accepted blocks of `method`, ordered and non-overlapping.
pub fn find_blocks(method: Node, source: &str, settings: BlockSettings) -> Vec<CandidateBlock> {
    find_blocks_from(method, source, settings, 0)
}

/// Like [`find_blocks`], ignoring statements before `from_index`.
pub fn find_blocks_from(
    method: Node,
    source: &str,
    settings: BlockSettings,
    from_index: usize,
) -> Vec<CandidateBlock> {
    let statements = java::body_statements(method);
    let scope = MethodScope::of(method, source);
    let facts: Vec<StatementFacts> = statements
        .iter()
        .map(|s| statement_facts(*s, source, &scope))
        .collect();
    let context = Context {
        method,
        source,
        scope: &scope,
        statements: &statements,
        facts: &facts,
    };

    let mut blocks = Vec::new();
    let mut start = from_index;
    while statements.len().saturating_sub(start) >= settings.min_size {
        let end = grow_window(&facts, start, settings);
        if end + 1 - start < settings.min_size {
            start += 1;
            continue;
        }
        match context.accept(start, end) {
            Ok(block) => {
                tracing::debug!(
                    "Accepted block {}..={} (lines {}-{})",
                    start,
                    end,
                    block.start_line,
                    block.end_line
                );
                blocks.push(block);
                start = end + 1;
            }
            Err(reason) => {
                tracing::debug!("Rejected block {}..={}: {}", start, end, reason);
                start += 1;
            }
        }
    }
    blocks
}

/// Last index of the window opened at `start`.
fn grow_window(facts: &[StatementFacts], start: usize, settings: BlockSettings) -> usize {
    let mut defined = facts[start].defined();
    let mut end = start;
    loop {
        let size = end + 1 - start;
        if size >= settings.max_size || end + 1 >= facts.len() {
            return end;
        }
        let next = &facts[end + 1];
        if size >= settings.min_size && next.used.is_disjoint(&defined) {
            return end;
        }
        end += 1;
        defined.extend(next.defined());
    }
}

struct Context<'a, 't> {
    method: Node<'t>,
    source: &'a str,
    scope: &'a MethodScope,
    statements: &'a [Node<'t>],
    facts: &'a [StatementFacts],
}

impl Context<'_, '_> {
    fn accept(&self, start: usize, end: usize) -> Result<CandidateBlock, String> {
        let window = &self.facts[start..=end];
        let mut used = BTreeSet::new();
        let mut declared = BTreeSet::new();
        let mut assigned = BTreeSet::new();
        let mut reads_in_order: Vec<&str> = Vec::new();
        for facts in window {
            used.extend(facts.used.iter().cloned());
            declared.extend(facts.declared.iter().cloned());
            assigned.extend(facts.assigned.iter().cloned());
            for name in &facts.reads_in_order {
                if !reads_in_order.contains(&name.as_str()) {
                    reads_in_order.push(name);
                }
            }
        }

        let foreign_writes: Vec<&String> = assigned.difference(&declared).collect();
        if !foreign_writes.is_empty() {
            return Err(format!("writes outer variable(s) {foreign_writes:?}"));
        }
        if window.iter().any(|f| f.has_escaping_jump) {
            return Err("break or continue leaves the block".into());
        }
        let last = self.statements[end];
        let returns_early = window[..window.len() - 1].iter().any(|f| f.has_return);
        let has_return = returns_early || window[window.len() - 1].has_return;
        if has_return && (returns_early || last.kind() != "return_statement") {
            return Err("return is not the last statement".into());
        }

        let defined: BTreeSet<String> = declared.union(&assigned).cloned().collect();
        let mut parameters = Vec::new();
        for name in reads_in_order.iter().filter(|n| !defined.contains(**n)) {
            let java_type = self
                .scope
                .type_of(name)
                .ok_or_else(|| format!("type of {name} is unknown"))?;
            parameters.push(BlockParameter {
                name: name.to_string(),
                java_type: java_type.to_string(),
            });
        }

        let returns = if has_return {
            match last.named_child(0) {
                Some(value) => BlockReturn::Value {
                    java_type: self.infer_type(value),
                },
                None => BlockReturn::Exit,
            }
        } else {
            self.escaping_variable(start, end)?
        };

        let first = self.statements[start];
        Ok(CandidateBlock {
            start_index: start,
            end_index: end,
            start_line: java::line_of(&first),
            end_line: java::end_line_of(&last),
            start_byte: first.start_byte(),
            end_byte: last.end_byte(),
            used,
            defined,
            parameters,
            returns,
        })
    }

    /// The one top-level declaration of the block read after it, if any.
    fn escaping_variable(&self, start: usize, end: usize) -> Result<BlockReturn, String> {
        let later = &self.statements[end + 1..];
        let mut escaping = Vec::new();
        for index in start..=end {
            for name in &self.facts[index].declared_top_level {
                let read_later = later
                    .iter()
                    .any(|s| !java::variable_references(*s, self.source, name).is_empty());
                if read_later {
                    escaping.push(name.as_str());
                }
            }
        }
        match escaping.as_slice() {
            [] => Ok(BlockReturn::Nothing),
            [name] => {
                let java_type = self
                    .scope
                    .type_of(name)
                    .ok_or_else(|| format!("type of returned {name} is unknown"))?;
                Ok(BlockReturn::Variable {
                    name: name.to_string(),
                    java_type: java_type.to_string(),
                })
            }
            many => Err(format!("{} variables escape the block", many.len())),
        }
    }

    /// Type of a returned expression from its literal shape.
    fn infer_type(&self, value: Node) -> String {
        let text = java::text(&value, self.source);
        let shaped = match value.kind() {
            "string_literal" | "text_block" => Some("String".to_string()),
            "character_literal" => Some("char".to_string()),
            "true" | "false" => Some("boolean".to_string()),
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => Some(
                if text.ends_with(['l', 'L']) { "long" } else { "int" }.to_string(),
            ),
            "decimal_floating_point_literal" => Some(
                if text.ends_with(['f', 'F']) { "float" } else { "double" }.to_string(),
            ),
            "object_creation_expression" => value
                .child_by_field_name("type")
                .map(|t| java::text(&t, self.source).to_string())
                .filter(|t| !t.ends_with("<>")),
            _ => None,
        };
        shaped.unwrap_or_else(|| java::return_type(&self.method, self.source).to_string())
    }
}
