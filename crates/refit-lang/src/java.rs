//! Java node vocabulary and navigation helpers.
//!
//! Everything here is a pure function over a tree-sitter-java tree and
//! its source text. Lines are 1-indexed, byte offsets index the source.

use tree_sitter::Node;

/// Node kinds that declare a type with a body.
pub const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// Type declarations whose body accepts `private static final` fields and nested classes.
pub const CLASS_LIKE: &[&str] = &["class_declaration", "record_declaration"];

/// Declarations that own a parameter list and a body.
pub const CALLABLES: &[&str] = &["method_declaration", "constructor_declaration"];

/// Statements after which nothing in the same block is reachable.
pub const TERMINATORS: &[&str] = &[
    "return_statement",
    "throw_statement",
    "break_statement",
    "continue_statement",
];

/// Literal node kinds a constant can be extracted from.
pub const EXTRACTABLE_LITERALS: &[&str] = &[
    "decimal_integer_literal",
    "hex_integer_literal",
    "octal_integer_literal",
    "binary_integer_literal",
    "decimal_floating_point_literal",
    "string_literal",
    "character_literal",
];

/// Node kinds that introduce their own variable scope and are not
/// part of the enclosing method's straight-line flow.
pub const NESTED_SCOPES: &[&str] = &[
    "lambda_expression",
    "class_body",
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "final",
    "finally", "float", "for", "goto", "if", "implements", "import", "instanceof", "int",
    "interface", "long", "native", "new", "package", "private", "protected", "public",
    "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
    "throw", "throws", "transient", "try", "void", "volatile", "while", "true", "false",
    "null", "var", "yield", "record",
];

/// Source text covered by `node`.
pub fn text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// 1-indexed line of the node's first byte.
pub fn line_of(node: &Node) -> usize {
    node.start_position().row + 1
}

/// 1-indexed line of the node's last byte.
pub fn end_line_of(node: &Node) -> usize {
    node.end_position().row + 1
}

pub fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

/// Pre-order walk over named nodes. Returning `false` from `visit`
/// skips the node's children.
pub fn walk<'t>(node: Node<'t>, visit: &mut dyn FnMut(Node<'t>) -> bool) {
    if !visit(node) {
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.named_children(&mut cursor).collect();
    for child in children {
        walk(child, visit);
    }
}

/// All descendants (including `node`) whose kind is in `kinds`, in source order.
pub fn descendants_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk(node, &mut |n| {
        if kinds.contains(&n.kind()) {
            found.push(n);
        }
        true
    });
    found
}

/// Nearest strict ancestor whose kind is in `kinds`.
pub fn ancestor<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(parent) = current {
        if kinds.contains(&parent.kind()) {
            return Some(parent);
        }
        current = parent.parent();
    }
    None
}

/// Named children of `node`, comments excluded.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| !is_comment(c))
        .collect()
}

/// Text of the `name` field, if the node has one.
pub fn declared_name<'a>(node: &Node, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name").map(|n| text(&n, source))
}

/// Whether a declaration carries `modifier` (e.g. `private`, `static`).
pub fn has_modifier(node: &Node, source: &str, modifier: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
        .map(|m| text(&m, source).split_whitespace().any(|w| w == modifier))
        .unwrap_or(false);
    found
}

/// Statements of a method or constructor body, comments excluded.
pub fn body_statements<'t>(callable: Node<'t>) -> Vec<Node<'t>> {
    match callable.child_by_field_name("body") {
        Some(body) => named_children(body),
        None => Vec::new(),
    }
}

/// Declared type text of a method (`void` for constructors).
pub fn return_type<'a>(method: &Node, source: &'a str) -> &'a str {
    method
        .child_by_field_name("type")
        .map(|t| text(&t, source))
        .unwrap_or("void")
}

/// Formal parameters as `(type, name)` pairs. Returns `None` when the list
/// contains varargs or receiver parameters.
pub fn formal_parameters<'a>(callable: &Node, source: &'a str) -> Option<Vec<(&'a str, &'a str)>> {
    let params = callable.child_by_field_name("parameters")?;
    let mut result = Vec::new();
    for param in named_children(params) {
        if param.kind() != "formal_parameter" {
            return None;
        }
        let ty = param.child_by_field_name("type")?;
        let name = param.child_by_field_name("name")?;
        result.push((text(&ty, source), text(&name, source)));
    }
    Some(result)
}

/// Every method and constructor declaration in the tree, in source order.
pub fn callables<'t>(root: Node<'t>) -> Vec<Node<'t>> {
    descendants_of_kind(root, CALLABLES)
}

/// Resolve the method a defect points at.
///
/// With a name, picks the method of that name containing `line`, falling
/// back to the first one of that name. Without a name, picks the innermost
/// method whose span contains `line`.
pub fn find_method<'t>(root: Node<'t>, source: &str, name: Option<&str>, line: usize) -> Option<Node<'t>> {
    let all = callables(root);
    let contains = |n: &Node| line_of(n) <= line && line <= end_line_of(n);
    match name {
        Some(wanted) => {
            let named: Vec<Node<'t>> = all
                .into_iter()
                .filter(|m| declared_name(m, source) == Some(wanted))
                .collect();
            named
                .iter()
                .find(|m| contains(m))
                .or_else(|| named.first())
                .copied()
        }
        None => all
            .into_iter()
            .filter(|m| contains(m))
            .min_by_key(|m| m.end_byte() - m.start_byte()),
    }
}

/// Body of the nearest enclosing class or record.
pub fn enclosing_class_body<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let decl = if CLASS_LIKE.contains(&node.kind()) {
        node
    } else {
        ancestor(node, CLASS_LIKE)?
    };
    decl.child_by_field_name("body")
}

/// Names of methods, fields and nested types declared directly in a type body.
pub fn member_names(body: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    for member in named_children(body) {
        match member.kind() {
            "field_declaration" | "constant_declaration" => {
                let mut cursor = member.walk();
                for declarator in member.children_by_field_name("declarator", &mut cursor) {
                    if let Some(n) = declared_name(&declarator, source) {
                        names.push(n.to_string());
                    }
                }
            }
            _ => {
                if let Some(n) = declared_name(&member, source) {
                    names.push(n.to_string());
                }
            }
        }
    }
    names
}

/// Whether an `identifier` node names a variable (local, parameter or field)
/// rather than a method, label, type member or package segment.
pub fn is_variable_name(node: &Node) -> bool {
    if node.kind() != "identifier" {
        return false;
    }
    let Some(parent) = node.parent() else {
        return false;
    };
    let is_field = |field: &str| {
        parent
            .child_by_field_name(field)
            .is_some_and(|n| n.id() == node.id())
    };
    match parent.kind() {
        "method_invocation" => !is_field("name"),
        "field_access" => !is_field("field"),
        "method_reference" => parent
            .named_child(0)
            .is_some_and(|first| first.id() == node.id()),
        "method_declaration"
        | "constructor_declaration"
        | "class_declaration"
        | "interface_declaration"
        | "enum_declaration"
        | "record_declaration"
        | "enum_constant"
        | "labeled_statement"
        | "break_statement"
        | "continue_statement"
        | "scoped_identifier"
        | "marker_annotation"
        | "annotation"
        | "element_value_pair"
        | "package_declaration"
        | "import_declaration" => false,
        _ => true,
    }
}

/// Whether an identifier is the name being introduced by a declaration.
pub fn is_declaration_site(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    let is_name = parent
        .child_by_field_name("name")
        .is_some_and(|n| n.id() == node.id());
    match parent.kind() {
        "variable_declarator"
        | "formal_parameter"
        | "catch_formal_parameter"
        | "enhanced_for_statement"
        | "resource" => is_name,
        "inferred_parameters" => true,
        "lambda_expression" => parent
            .child_by_field_name("parameters")
            .is_some_and(|n| n.id() == node.id()),
        _ => false,
    }
}

/// Variable-name identifiers equal to `name` inside `scope`.
pub fn variable_occurrences<'t>(scope: Node<'t>, source: &str, name: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk(scope, &mut |n| {
        if n.kind() == "identifier" && text(&n, source) == name && is_variable_name(&n) {
            found.push(n);
        }
        true
    });
    found
}

/// Occurrences of `name` inside `scope` that read or write it (declaration sites excluded).
pub fn variable_references<'t>(scope: Node<'t>, source: &str, name: &str) -> Vec<Node<'t>> {
    variable_occurrences(scope, source, name)
        .into_iter()
        .filter(|n| !is_declaration_site(n))
        .collect()
}

/// Calls to a method named `name` on `this` or without a receiver.
pub fn local_calls<'t>(scope: Node<'t>, source: &str, name: &str) -> Vec<Node<'t>> {
    descendants_of_kind(scope, &["method_invocation"])
        .into_iter()
        .filter(|call| {
            let named = declared_name(call, source) == Some(name);
            let local = match call.child_by_field_name("object") {
                None => true,
                Some(obj) => obj.kind() == "this",
            };
            named && local
        })
        .collect()
}

/// Argument expressions of a call or object creation, comments excluded.
pub fn call_arguments<'t>(call: Node<'t>) -> Vec<Node<'t>> {
    call.child_by_field_name("arguments")
        .map(named_children)
        .unwrap_or_default()
}

/// Whether evaluating the expression can have an observable effect.
pub fn has_side_effects(node: Node) -> bool {
    !descendants_of_kind(
        node,
        &[
            "method_invocation",
            "object_creation_expression",
            "assignment_expression",
            "update_expression",
            "array_creation_expression",
        ],
    )
    .is_empty()
}

/// Byte offset of the start of the line containing `byte`.
pub fn line_start(source: &str, byte: usize) -> usize {
    source[..byte].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Byte range `[start, end)` of 1-indexed `line`, newline excluded.
pub fn line_byte_range(source: &str, line: usize) -> Option<(usize, usize)> {
    if line == 0 {
        return None;
    }
    let mut start = 0;
    for (idx, segment) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == line {
            let body = segment.trim_end_matches(['\n', '\r']);
            return Some((start, start + body.len()));
        }
        start += segment.len();
    }
    None
}

/// Widen `[start, end)` to whole lines (trailing newline included) when
/// nothing but whitespace shares those lines. Otherwise returns the range unchanged.
pub fn full_line_span(source: &str, start: usize, end: usize) -> (usize, usize) {
    let first = line_start(source, start);
    let last = source[end..]
        .find('\n')
        .map(|i| end + i + 1)
        .unwrap_or(source.len());
    let before_blank = source[first..start].trim().is_empty();
    let after_blank = source[end..last].trim().is_empty();
    if before_blank && after_blank {
        (first, last)
    } else {
        (start, end)
    }
}

/// `java.util.List<String>[]` becomes `List`.
pub fn simple_type_name(type_text: &str) -> &str {
    let base = type_text
        .split(['<', '['])
        .next()
        .unwrap_or(type_text)
        .trim();
    base.rsplit('.').next().unwrap_or(base)
}

/// Boxed form of a primitive type, for use as a generic argument.
pub fn boxed(type_text: &str) -> &str {
    match type_text {
        "int" => "Integer",
        "long" => "Long",
        "short" => "Short",
        "byte" => "Byte",
        "char" => "Character",
        "boolean" => "Boolean",
        "double" => "Double",
        "float" => "Float",
        other => other,
    }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Whether `word` is a legal Java identifier.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !is_keyword(word)
}

/// `createUser` becomes `CreateUser`.
pub fn to_pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `BufferedReader` becomes `bufferedReader`; `URL` becomes `url`.
pub fn to_lower_camel(name: &str) -> String {
    if name.chars().all(|c| !c.is_lowercase()) {
        return name.to_lowercase();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `createUser` and `create user` both become `CREATE_USER`.
pub fn to_upper_snake(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if c.is_uppercase() && prev_lower && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_uppercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Append `2`, `3`, ... to `base` until `taken` rejects none.
pub fn unique_name(base: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.iter().any(|t| t == candidate))
        .unwrap_or_else(|| base.to_string())
}
