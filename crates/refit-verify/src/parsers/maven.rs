use crate::types::{Diagnostic, Severity, TestCounts};
use regex::Regex;
use std::sync::LazyLock;

/// Maven compiler plugin output:
///   [ERROR] /src/main/java/Foo.java:[12,8] cannot find symbol
static MAVEN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(ERROR|WARNING)\]\s+(.+?\.java):\[(\d+),(\d+)\]\s+(.+)$").unwrap()
});

/// Surefire (and Ant JUnit) summary:
///   Tests run: 12, Failures: 1, Errors: 0, Skipped: 2
static SUREFIRE_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Tests run:\s*(\d+),\s*Failures:\s*(\d+),\s*Errors:\s*(\d+),\s*Skipped:\s*(\d+)")
        .unwrap()
});

pub fn parse_maven_diagnostics(output: &str) -> Vec<Diagnostic> {
    output
        .lines()
        .filter_map(|line| MAVEN_LINE.captures(line.trim()))
        .map(|caps| Diagnostic {
            file: caps[2].to_string(),
            line: caps[3].parse().unwrap_or(0),
            column: caps[4].parse().unwrap_or(0),
            message: caps[5].trim().to_string(),
            severity: if &caps[1] == "ERROR" {
                Severity::Error
            } else {
                Severity::Warning
            },
        })
        .collect()
}

/// The last summary line wins: Surefire prints one per class, then the totals.
pub fn parse_surefire_summary(output: &str) -> Option<TestCounts> {
    let caps = SUREFIRE_SUMMARY.captures_iter(output).last()?;
    let n = |i: usize| caps[i].parse().unwrap_or(0);
    Some(TestCounts {
        run: n(1),
        failures: n(2),
        errors: n(3),
        skipped: n(4),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_compile_errors() {
        let output = "[INFO] Compiling 3 source files\n\
[ERROR] /work/src/main/java/shop/Cart.java:[14,21] cannot find symbol\n\
[WARNING] /work/src/main/java/shop/Item.java:[3,1] deprecated API\n\
[ERROR] Failed to execute goal org.apache.maven.plugins:maven-compiler-plugin";
        let diagnostics = parse_maven_diagnostics(output);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].file, "/work/src/main/java/shop/Cart.java");
        assert_eq!(diagnostics[0].line, 14);
        assert_eq!(diagnostics[0].column, 21);
        assert_eq!(diagnostics[0].message, "cannot find symbol");
        assert_eq!(diagnostics[1].severity, Severity::Warning);
    }

    #[test]
    fn test_surefire_totals_are_last() {
        let output = "Tests run: 3, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 0.1 s - in shop.CartTest\n\
Tests run: 4, Failures: 1, Errors: 1, Skipped: 0, Time elapsed: 0.2 s <<< FAILURE! - in shop.ItemTest\n\
\n\
Results:\n\
\n\
Tests run: 7, Failures: 1, Errors: 1, Skipped: 0\n";
        let counts = parse_surefire_summary(output).unwrap();
        assert_eq!(counts.run, 7);
        assert_eq!(counts.failures, 1);
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.passed(), 5);
        assert!(counts.has_failures());
    }

    #[test]
    fn test_no_summary() {
        assert!(parse_surefire_summary("BUILD SUCCESS").is_none());
    }
}
