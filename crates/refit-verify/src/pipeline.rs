use crate::detection::{resolve_commands, BuildTool};
use crate::error::VerifyError;
use crate::parsers;
use crate::process::{ProcessOutcome, ProcessRunner, TerminationPolicy};
use crate::runners::command::CommandRunner;
use crate::runners::VerificationRunner;
use crate::types::{StepOutcome, StepStatus};
use refit_common::config::BuildSettings;
use std::path::Path;

/// Build then test verification for a project.
///
/// A missing runner means no build tool could be resolved: the step is
/// skipped, or fails with `ToolNotFound` when a build tool is required.
pub struct BuildVerifier {
    tool: Option<BuildTool>,
    compile: Option<Box<dyn VerificationRunner>>,
    test: Option<Box<dyn VerificationRunner>>,
    missing: Option<String>,
    require_build_tool: bool,
}

impl BuildVerifier {
    pub fn new(
        tool: Option<BuildTool>,
        compile: Option<Box<dyn VerificationRunner>>,
        test: Option<Box<dyn VerificationRunner>>,
        require_build_tool: bool,
    ) -> Self {
        Self {
            tool,
            compile,
            test,
            missing: None,
            require_build_tool,
        }
    }

    pub fn from_config(project_root: &Path, settings: &BuildSettings) -> Self {
        let commands = resolve_commands(project_root, settings);
        let process = ProcessRunner::new(TerminationPolicy::from_settings(settings));
        let tool_name = commands.tool.map(BuildTool::name).unwrap_or("build");
        let runner = |step: &str, argv: Option<Vec<String>>| {
            argv.map(|argv| {
                Box::new(CommandRunner::new(format!("{tool_name} {step}"), argv, process))
                    as Box<dyn VerificationRunner>
            })
        };

        if let Some(reason) = &commands.missing {
            tracing::warn!("Build verification limited: {}", reason);
        }
        Self {
            tool: commands.tool,
            compile: runner("compile", commands.compile),
            test: runner("test", commands.test),
            missing: commands.missing,
            require_build_tool: settings.require_build_tool(),
        }
    }

    pub fn tool(&self) -> Option<BuildTool> {
        self.tool
    }

    pub async fn verify_build(&self, project_root: &Path) -> Result<StepOutcome, VerifyError> {
        let Some(runner) = &self.compile else {
            return self.unavailable("compile");
        };
        let process = runner.run(project_root).await?;
        let diagnostics = parsers::build_diagnostics(self.tool, &process.output);
        let mut outcome = self.step(runner.as_ref(), process);
        outcome.diagnostics = diagnostics;
        if outcome.failed() && outcome.reason.is_none() {
            outcome.reason = Some(format!(
                "build failed with {} compiler error(s)",
                outcome.error_count()
            ));
        }
        tracing::info!("Build verification: {:?}", outcome.status);
        Ok(outcome)
    }

    pub async fn verify_tests(&self, project_root: &Path) -> Result<StepOutcome, VerifyError> {
        let Some(runner) = &self.test else {
            return self.unavailable("test");
        };
        let process = runner.run(project_root).await?;
        let counts = parsers::test_counts(self.tool, &process.output);
        let mut outcome = self.step(runner.as_ref(), process);
        outcome.tests = counts;

        if let Some(counts) = counts {
            if counts.has_failures() {
                outcome.status = StepStatus::Failed;
            }
        }
        if outcome.failed() && outcome.reason.is_none() {
            outcome.reason = Some(match counts {
                Some(c) => format!("{} of {} test(s) failed", c.failures + c.errors, c.run),
                None => "test run failed".to_string(),
            });
        }
        tracing::info!("Test verification: {:?}", outcome.status);
        Ok(outcome)
    }

    fn step(&self, runner: &dyn VerificationRunner, process: ProcessOutcome) -> StepOutcome {
        let reason = process.timed_out.then(|| {
            VerifyError::Timeout {
                tool: runner.name().to_string(),
                seconds: runner.timeout().unwrap_or(process.elapsed).as_secs(),
            }
            .to_string()
        });
        StepOutcome {
            status: if process.success {
                StepStatus::Passed
            } else {
                StepStatus::Failed
            },
            tool: Some(runner.name().to_string()),
            command: runner.command(),
            reason,
            diagnostics: Vec::new(),
            tests: None,
            process: Some(process),
        }
    }

    fn unavailable(&self, step: &str) -> Result<StepOutcome, VerifyError> {
        let reason = self
            .missing
            .clone()
            .unwrap_or_else(|| format!("no {step} command configured"));
        if self.require_build_tool {
            return Err(VerifyError::ToolNotFound { tool: reason });
        }
        tracing::warn!("Skipping {} step: {}", step, reason);
        Ok(StepOutcome::skipped(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::TerminationPath;
    use std::time::Duration;

    struct Canned {
        exit_code: i32,
        output: &'static str,
        timed_out: bool,
    }

    #[async_trait::async_trait]
    impl VerificationRunner for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        fn command(&self) -> Vec<String> {
            vec!["canned".into()]
        }

        async fn run(&self, _project_root: &Path) -> Result<ProcessOutcome, VerifyError> {
            Ok(ProcessOutcome {
                success: self.exit_code == 0,
                exit_code: self.exit_code,
                output: self.output.to_string(),
                // Includes the grace period spent killing the group.
                elapsed: if self.timed_out {
                    Duration::from_secs(13)
                } else {
                    Duration::from_millis(5)
                },
                timed_out: self.timed_out,
                termination: if self.timed_out {
                    TerminationPath::Killed
                } else {
                    TerminationPath::Completed
                },
            })
        }

        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_secs(10))
        }
    }

    fn canned(exit_code: i32, output: &'static str) -> Option<Box<dyn VerificationRunner>> {
        Some(Box::new(Canned {
            exit_code,
            output,
            timed_out: false,
        }))
    }

    #[tokio::test]
    async fn test_build_failure_collects_diagnostics() {
        let verifier = BuildVerifier::new(
            Some(BuildTool::Maven),
            canned(1, "[ERROR] /p/src/A.java:[3,5] cannot find symbol\n"),
            None,
            false,
        );
        let outcome = verifier.verify_build(Path::new(".")).await.unwrap();
        assert!(outcome.failed());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.reason.as_deref(), Some("build failed with 1 compiler error(s)"));
    }

    #[tokio::test]
    async fn test_failing_tests_fail_the_step_even_on_zero_exit() {
        let verifier = BuildVerifier::new(
            Some(BuildTool::Gradle),
            None,
            canned(0, "4 tests completed, 1 failed\n"),
            false,
        );
        let outcome = verifier.verify_tests(Path::new(".")).await.unwrap();
        assert!(outcome.failed());
        assert_eq!(outcome.tests.unwrap().run, 4);
        assert_eq!(outcome.reason.as_deref(), Some("1 of 4 test(s) failed"));
    }

    #[tokio::test]
    async fn test_passing_tests() {
        let verifier = BuildVerifier::new(
            Some(BuildTool::Maven),
            None,
            canned(0, "Tests run: 2, Failures: 0, Errors: 0, Skipped: 0\n"),
            false,
        );
        let outcome = verifier.verify_tests(Path::new(".")).await.unwrap();
        assert!(outcome.passed());
        assert_eq!(outcome.tests.unwrap().passed(), 2);
    }

    #[tokio::test]
    async fn test_timeout_reports_configured_limit() {
        let hung = Canned {
            exit_code: -1,
            output: "",
            timed_out: true,
        };
        let verifier = BuildVerifier::new(Some(BuildTool::Maven), Some(Box::new(hung)), None, false);
        let outcome = verifier.verify_build(Path::new(".")).await.unwrap();
        assert!(outcome.failed());
        assert_eq!(outcome.reason.as_deref(), Some("'canned' timed out after 10s"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_skipped_unless_required() {
        let lenient = BuildVerifier::new(None, None, None, false);
        let outcome = lenient.verify_build(Path::new(".")).await.unwrap();
        assert_eq!(outcome.status, StepStatus::Skipped);

        let strict = BuildVerifier::new(None, None, None, true);
        let err = strict.verify_build(Path::new(".")).await.unwrap_err();
        assert!(matches!(err, VerifyError::ToolNotFound { .. }));
    }
}
