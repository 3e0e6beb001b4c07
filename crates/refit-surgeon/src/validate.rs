//! Re-parse after an edit and locate any syntax errors.

use serde::Serialize;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Tree};

#[derive(Debug, Clone, Error, Serialize)]
pub enum ValidationError {
    #[error("Java grammar is incompatible with the linked tree-sitter runtime")]
    Language,
    #[error("Parser produced no tree")]
    ParseFailed,
    #[error("{count} syntax error(s), first at line {}", .errors.first().map_or(0, |e| e.line))]
    SyntaxErrors {
        count: usize,
        errors: Vec<SyntaxError>,
    },
}

/// An ERROR or MISSING node in the re-parsed tree.
#[derive(Debug, Clone, Serialize)]
pub struct SyntaxError {
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    /// The source line holding the error, trimmed.
    pub context: String,
    pub node_kind: String,
}

/// The tree for `source`, or every syntax error in it.
pub fn verify_parse(source: &str, language: &Language) -> Result<Tree, ValidationError> {
    let tree = parse_best_effort(source, language)?;
    if !tree.root_node().has_error() {
        return Ok(tree);
    }
    let errors = error_nodes(tree.root_node(), source);
    Err(ValidationError::SyntaxErrors {
        count: errors.len(),
        errors,
    })
}

/// Parse without rejecting error nodes.
pub fn parse_best_effort(source: &str, language: &Language) -> Result<Tree, ValidationError> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|_| ValidationError::Language)?;
    parser.parse(source, None).ok_or(ValidationError::ParseFailed)
}

/// Syntax errors in `source`, empty when it parses cleanly.
pub fn syntax_errors(source: &str, language: &Language) -> Result<Vec<SyntaxError>, ValidationError> {
    match verify_parse(source, language) {
        Ok(_) => Ok(Vec::new()),
        Err(ValidationError::SyntaxErrors { errors, .. }) => Ok(errors),
        Err(other) => Err(other),
    }
}

/// Pre-order walk that only descends into subtrees containing errors.
fn error_nodes(root: Node, source: &str) -> Vec<SyntaxError> {
    let lines: Vec<&str> = source.lines().collect();
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let at = node.start_position();
            found.push(SyntaxError {
                line: at.row + 1,
                column: at.column + 1,
                context: lines.get(at.row).map(|l| l.trim().to_string()).unwrap_or_default(),
                node_kind: if node.is_missing() {
                    format!("MISSING {}", node.kind())
                } else {
                    node.kind().to_string()
                },
            });
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node
            .children(&mut cursor)
            .filter(|c| c.has_error() || c.is_missing())
            .collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_source_parses() {
        let tree = verify_parse("class A { void f() { int x = 1; } }", &refit_lang::java()).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_broken_source_reports_location() {
        let source = "class A {\n    void f() {\n        int x = ;\n    }\n}\n";
        let errors = syntax_errors(source, &refit_lang::java()).unwrap();
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.line == 3));
    }

    #[test]
    fn test_context_is_the_offending_line() {
        let source = "class Été {\n    void f() { int x = ; }\n}\n";
        let errors = syntax_errors(source, &refit_lang::java()).unwrap();
        assert!(!errors.is_empty());
        assert!(errors.iter().any(|e| e.context == "void f() { int x = ; }"));
    }
}
