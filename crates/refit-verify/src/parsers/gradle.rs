use crate::types::TestCounts;
use regex::Regex;
use std::sync::LazyLock;

/// Gradle test summary:
///   12 tests completed, 2 failed, 1 skipped
static GRADLE_TESTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) tests? completed(?:, (\d+) failed)?(?:, (\d+) skipped)?").unwrap()
});

pub fn parse_gradle_tests(output: &str) -> Option<TestCounts> {
    let caps = GRADLE_TESTS.captures_iter(output).last()?;
    let n = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    Some(TestCounts {
        run: n(1),
        failures: n(2),
        errors: 0,
        skipped: n(3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failed_summary() {
        let counts = parse_gradle_tests("CartTest > total FAILED\n\n5 tests completed, 2 failed\n").unwrap();
        assert_eq!(counts.run, 5);
        assert_eq!(counts.failures, 2);
        assert_eq!(counts.passed(), 3);
    }

    #[test]
    fn test_parse_skipped() {
        let counts = parse_gradle_tests("1 test completed, 1 skipped").unwrap();
        assert_eq!(counts.run, 1);
        assert_eq!(counts.failures, 0);
        assert_eq!(counts.skipped, 1);
    }

    #[test]
    fn test_no_summary() {
        assert!(parse_gradle_tests("BUILD SUCCESSFUL in 3s").is_none());
    }
}
