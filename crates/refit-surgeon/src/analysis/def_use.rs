//! Per-statement def/use facts over a method's own variables.
//!
//! Only names declared by the method (parameters and locals) count.
//! Fields, method names, types and package segments never appear in
//! these sets.

use refit_lang::java;
use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::Node;

/// Variables declared by a method and their declared types.
#[derive(Debug, Clone, Default)]
pub struct MethodScope {
    /// `None` when the type is unknown, inferred (`var`, lambda) or
    /// differs between two declarations of the same name.
    types: BTreeMap<String, Option<String>>,
}

impl MethodScope {
    pub fn of(method: Node, source: &str) -> Self {
        let mut types: BTreeMap<String, Option<String>> = BTreeMap::new();
        java::walk(method, &mut |n| {
            if n.kind() == "class_body" {
                return false;
            }
            if n.kind() == "identifier" && java::is_declaration_site(&n) {
                let name = java::text(&n, source).to_string();
                let declared = declared_type(n, source).filter(|t| t != "var");
                types
                    .entry(name)
                    .and_modify(|existing| {
                        if *existing != declared {
                            *existing = None;
                        }
                    })
                    .or_insert(declared);
            }
            true
        });
        Self { types }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Declared type of `name`, if it is known and unambiguous.
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.types.get(name).and_then(|t| t.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

fn declared_type(name: Node, source: &str) -> Option<String> {
    let parent = name.parent()?;
    let holder = match parent.kind() {
        "variable_declarator" => parent.parent()?,
        "catch_formal_parameter" => {
            let catch_type = java::named_children(parent)
                .into_iter()
                .find(|c| c.kind() == "catch_type")?;
            return Some(java::text(&catch_type, source).to_string());
        }
        _ => parent,
    };
    holder
        .child_by_field_name("type")
        .map(|t| java::text(&t, source).to_string())
}

/// What one statement reads, declares and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementFacts {
    /// Names read (compound assignments and increments both read and write).
    pub used: BTreeSet<String>,
    /// Names introduced by a declaration anywhere in the statement.
    pub declared: BTreeSet<String>,
    /// Names introduced by a declaration that is the statement itself.
    pub declared_top_level: BTreeSet<String>,
    /// Names written by assignment or increment.
    pub assigned: BTreeSet<String>,
    /// Names read, in first-appearance order.
    pub reads_in_order: Vec<String>,
    /// A `return` that exits the enclosing method.
    pub has_return: bool,
    /// A `break`/`continue` that leaves the statement.
    pub has_escaping_jump: bool,
}

impl StatementFacts {
    /// `declared ∪ assigned`.
    pub fn defined(&self) -> BTreeSet<String> {
        self.declared.union(&self.assigned).cloned().collect()
    }
}

/// Loop and switch constructs that capture an unlabeled `break`/`continue`.
const JUMP_TARGETS: &[&str] = &[
    "for_statement",
    "enhanced_for_statement",
    "while_statement",
    "do_statement",
    "switch_expression",
    "switch_statement",
];

pub fn statement_facts(statement: Node, source: &str, scope: &MethodScope) -> StatementFacts {
    let mut facts = StatementFacts::default();
    if statement.kind() == "local_variable_declaration" {
        let mut cursor = statement.walk();
        for declarator in statement.children_by_field_name("declarator", &mut cursor) {
            if let Some(name) = java::declared_name(&declarator, source) {
                facts.declared_top_level.insert(name.to_string());
            }
        }
    }

    java::walk(statement, &mut |n| {
        match n.kind() {
            "return_statement" => facts.has_return = true,
            "break_statement" | "continue_statement" => {
                if jump_leaves(n, statement) {
                    facts.has_escaping_jump = true;
                }
            }
            "lambda_expression" | "class_body" => {
                // returns in here belong to the nested body; reads still count
                collect_names(n, source, scope, &mut facts);
                return false;
            }
            "identifier" => record_identifier(n, source, scope, &mut facts),
            _ => {}
        }
        true
    });
    facts
}

fn collect_names(node: Node, source: &str, scope: &MethodScope, facts: &mut StatementFacts) {
    java::walk(node, &mut |n| {
        if n.kind() == "identifier" {
            record_identifier(n, source, scope, facts);
        }
        true
    });
}

fn record_identifier(n: Node, source: &str, scope: &MethodScope, facts: &mut StatementFacts) {
    let name = java::text(&n, source);
    if !scope.contains(name) || !java::is_variable_name(&n) {
        return;
    }
    if java::is_declaration_site(&n) {
        facts.declared.insert(name.to_string());
        return;
    }

    let (reads, writes) = access_kind(n, source);
    if writes {
        facts.assigned.insert(name.to_string());
    }
    if reads && facts.used.insert(name.to_string()) {
        facts.reads_in_order.push(name.to_string());
    }
}

/// Whether the identifier is read, written, or both.
fn access_kind(n: Node, source: &str) -> (bool, bool) {
    let Some(parent) = n.parent() else {
        return (true, false);
    };
    match parent.kind() {
        "assignment_expression" => {
            let is_target = parent
                .child_by_field_name("left")
                .is_some_and(|l| l.id() == n.id());
            if !is_target {
                return (true, false);
            }
            let plain = parent
                .child_by_field_name("operator")
                .is_some_and(|op| java::text(&op, source) == "=");
            (!plain, true)
        }
        "update_expression" => (true, true),
        _ => (true, false),
    }
}

/// An unlabeled jump whose target loop lies outside `statement`, or any labeled jump.
fn jump_leaves(jump: Node, statement: Node) -> bool {
    if java::named_children(jump).iter().any(|c| c.kind() == "identifier") {
        return true;
    }
    let mut current = jump.parent();
    while let Some(node) = current {
        if node.id() == statement.id() {
            return !JUMP_TARGETS.contains(&node.kind());
        }
        if JUMP_TARGETS.contains(&node.kind()) {
            return false;
        }
        current = node.parent();
    }
    true
}
