//! Indentation inference and comment-aware removal spans for Java source.

use tree_sitter::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndentStyle {
    Spaces(u8),
    Tabs,
}

/// Guess the indentation unit from how indentation grows between
/// consecutive non-blank lines. Defaults to four spaces.
pub fn infer_indent_style(source: &str) -> IndentStyle {
    let mut steps = [0u32; 9];
    let mut tab_lines = 0u32;
    let mut previous = 0usize;

    for line in source.lines().filter(|l| !l.trim().is_empty()).take(200) {
        if line.starts_with('\t') {
            tab_lines += 1;
            continue;
        }
        let width = line.len() - line.trim_start_matches(' ').len();
        if width > previous && width - previous <= 8 {
            steps[width - previous] += 1;
        }
        previous = width;
    }

    let space_votes: u32 = steps.iter().sum();
    if tab_lines > space_votes {
        return IndentStyle::Tabs;
    }
    // ties go to the smaller unit
    let best = (1..steps.len()).fold(0, |best, i| if steps[i] > steps[best] { i } else { best });
    IndentStyle::Spaces(if best == 0 { 4 } else { best as u8 })
}

/// Leading whitespace of the line that contains `byte_offset`.
pub fn extract_line_prefix(source: &str, byte_offset: usize) -> String {
    let start = source[..byte_offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[start..];
    let body = line.trim_start_matches([' ', '\t']);
    line[..line.len() - body.len()].to_string()
}

/// Prefix every line after the first with `prefix`. Blank lines stay empty.
pub fn indent_code(code: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(code.len() + prefix.len() * 8);
    for (i, line) in code.split_inclusive('\n').enumerate() {
        if i > 0 && !line.trim_end_matches(['\r', '\n']).is_empty() {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    out
}

pub fn indent_unit(style: &IndentStyle) -> String {
    match style {
        IndentStyle::Spaces(n) => " ".repeat(usize::from(*n)),
        IndentStyle::Tabs => "\t".into(),
    }
}

pub fn indent_deeper(prefix: &str, style: &IndentStyle) -> String {
    prefix.to_string() + &indent_unit(style)
}

/// Byte range to delete when removing `node`: the node, the comments
/// directly above it, a comment trailing it on its last line, widened to
/// whole lines when nothing else shares them.
pub fn removal_span(source: &str, node: &Node) -> (usize, usize) {
    let start = leading_comments_start(node).unwrap_or(node.start_byte());
    let end = trailing_comment_end(node).unwrap_or(node.end_byte());
    refit_lang::java::full_line_span(source, start, end)
}

/// Start of the run of comments stacked directly above `node`.
fn leading_comments_start(node: &Node) -> Option<usize> {
    let mut top_row = node.start_position().row;
    let mut start = None;
    let mut prev = node.prev_sibling();
    while let Some(p) = prev.filter(|p| is_comment(p) && top_row - p.end_position().row <= 1) {
        top_row = p.start_position().row;
        start = Some(p.start_byte());
        prev = p.prev_sibling();
    }
    start
}

fn trailing_comment_end(node: &Node) -> Option<usize> {
    let row = node.end_position().row;
    let mut next = node.next_sibling();
    while let Some(n) = next.filter(|n| n.start_position().row == row) {
        if is_comment(&n) {
            return Some(n.end_byte());
        }
        next = n.next_sibling();
    }
    None
}

fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}
