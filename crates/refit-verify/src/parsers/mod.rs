pub mod gradle;
pub mod javac;
pub mod maven;

use crate::detection::BuildTool;
use crate::types::{Diagnostic, TestCounts};

/// Compiler diagnostics from a build step, in the format `tool` prints.
pub fn build_diagnostics(tool: Option<BuildTool>, output: &str) -> Vec<Diagnostic> {
    match tool {
        Some(BuildTool::Maven) => {
            let mut found = maven::parse_maven_diagnostics(output);
            if found.is_empty() {
                found = javac::parse_javac_diagnostics(output);
            }
            found
        }
        Some(BuildTool::Gradle) | Some(BuildTool::Ant) => javac::parse_javac_diagnostics(output),
        None => {
            let mut found = javac::parse_javac_diagnostics(output);
            found.extend(maven::parse_maven_diagnostics(output));
            found
        }
    }
}

/// Test totals from a test step, when the output carries a summary.
pub fn test_counts(tool: Option<BuildTool>, output: &str) -> Option<TestCounts> {
    match tool {
        Some(BuildTool::Maven) | Some(BuildTool::Ant) => maven::parse_surefire_summary(output),
        Some(BuildTool::Gradle) => gradle::parse_gradle_tests(output),
        None => maven::parse_surefire_summary(output).or_else(|| gradle::parse_gradle_tests(output)),
    }
}
