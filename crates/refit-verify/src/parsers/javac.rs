use crate::types::{Diagnostic, Severity};
use regex::Regex;
use std::sync::LazyLock;

/// javac and Gradle compile output, optionally behind Ant's `[javac]` prefix:
///   src/shop/Cart.java:14: error: cannot find symbol
static JAVAC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\[javac\]\s*)?(.+?\.java):(\d+):\s*(error|warning):\s*(.+)$").unwrap()
});

static ANT_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\[javac\] ?").unwrap());

/// Parse javac diagnostics. The column comes from the caret line javac
/// prints two lines below the message, when present.
pub fn parse_javac_diagnostics(output: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = output.lines().collect();
    let mut diagnostics = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let Some(caps) = JAVAC_LINE.captures(raw.trim()) else {
            continue;
        };
        let column = lines
            .get(i + 2)
            .map(|l| ANT_PREFIX.replace(l, ""))
            .filter(|l| l.trim() == "^")
            .and_then(|l| l.find('^'))
            .map(|c| c + 1)
            .unwrap_or(0);

        diagnostics.push(Diagnostic {
            file: caps[1].to_string(),
            line: caps[2].parse().unwrap_or(0),
            column,
            message: caps[4].trim().to_string(),
            severity: if &caps[3] == "error" {
                Severity::Error
            } else {
                Severity::Warning
            },
        });
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_caret_column() {
        let output = "src/shop/Cart.java:14: error: cannot find symbol\n        total = totl + 1;\n                ^\n1 error\n";
        let diagnostics = parse_javac_diagnostics(output);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file, "src/shop/Cart.java");
        assert_eq!(diagnostics[0].line, 14);
        assert_eq!(diagnostics[0].column, 17);
        assert_eq!(diagnostics[0].message, "cannot find symbol");
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_parse_ant_prefixed_warning() {
        let output = "    [javac] /work/src/Item.java:3: warning: [deprecation] Date in java.util has been deprecated\n";
        let diagnostics = parse_javac_diagnostics(output);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file, "/work/src/Item.java");
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].column, 0);
    }

    #[test]
    fn test_ignores_other_lines() {
        assert!(parse_javac_diagnostics("BUILD SUCCESSFUL in 2s\n").is_empty());
    }
}
