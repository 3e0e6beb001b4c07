//! Post-write correctness check for a single Java file.
//!
//! Tier one is a tree-sitter syntax check and always runs. Tier two
//! compiles the file with `javac` and only runs when tier one passes and a
//! compiler is configured or on PATH.

use crate::detection::detect_build_tool;
use crate::error::VerifyError;
use crate::parsers::javac::parse_javac_diagnostics;
use crate::process::{ProcessOutcome, ProcessRunner, TerminationPolicy};
use crate::types::Severity;
use refit_common::config::{BuildSettings, ValidatorSettings};
use refit_common::project::source_roots;
use refit_surgeon::validate::syntax_errors;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const DEGRADED_WARNING: &str = "full compilation unavailable; syntax-only check performed";

/// Compiled-class directories Maven and Gradle leave behind.
const BUILD_OUTPUT_DIRS: &[&str] = &[
    "target/classes",
    "target/test-classes",
    "build/classes/java/main",
    "build/classes/java/test",
];

/// Directories whose jars join the derived classpath.
const JAR_DIRS: &[&str] = &["target/dependency", "build/dependencies", "lib", "libs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationTier {
    SyntaxOnly,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    /// `syntax` for parse errors, `javac` for compiler errors.
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilationWarning {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub tier: ValidationTier,
    /// The full tier was wanted but could not run.
    pub degraded: bool,
    pub errors: Vec<CompilationError>,
    pub warnings: Vec<CompilationWarning>,
}

impl ValidationOutcome {
    fn syntax_only() -> Self {
        Self {
            success: true,
            tier: ValidationTier::SyntaxOnly,
            degraded: false,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Interpret a finished javac run.
    pub fn from_javac(process: &ProcessOutcome) -> Self {
        let mut outcome = Self {
            tier: ValidationTier::Full,
            ..Self::syntax_only()
        };
        for diagnostic in parse_javac_diagnostics(&process.output) {
            match diagnostic.severity {
                Severity::Error => outcome.errors.push(CompilationError {
                    line: diagnostic.line,
                    column: diagnostic.column,
                    message: diagnostic.message,
                    code: "javac".into(),
                }),
                Severity::Warning => outcome.warnings.push(CompilationWarning {
                    line: diagnostic.line,
                    message: diagnostic.message,
                }),
            }
        }
        if !process.success && outcome.errors.is_empty() {
            let summary = process
                .output
                .lines()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("javac failed without diagnostics")
                .trim()
                .to_string();
            outcome.errors.push(CompilationError {
                line: 0,
                column: 0,
                message: summary,
                code: "javac".into(),
            });
        }
        outcome.success = outcome.errors.is_empty();
        outcome
    }

    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}:{}: {}", e.line, e.column, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub struct CompilationValidator {
    full_compile: bool,
    javac: Option<PathBuf>,
    classpath: Option<String>,
    source_roots: Vec<PathBuf>,
    process: ProcessRunner,
}

impl CompilationValidator {
    /// Syntax checking only.
    pub fn syntax_only() -> Self {
        Self {
            full_compile: false,
            javac: None,
            classpath: None,
            source_roots: Vec::new(),
            process: ProcessRunner::new(TerminationPolicy::from_settings(&BuildSettings::default())),
        }
    }

    pub fn from_config(
        project_root: &Path,
        settings: &ValidatorSettings,
        build: &BuildSettings,
    ) -> Self {
        let javac = settings
            .javac
            .clone()
            .or_else(|| which::which("javac").ok());
        let mut roots: Vec<PathBuf> = settings
            .source_roots
            .iter()
            .map(|r| if r.is_absolute() { r.clone() } else { project_root.join(r) })
            .collect();
        if roots.is_empty() {
            roots = source_roots(project_root);
        }
        let classpath = settings
            .classpath
            .clone()
            .or_else(|| derived_classpath(project_root));
        if settings.full_compile() && classpath.is_none() && detect_build_tool(project_root).is_some() {
            tracing::warn!(
                "No validator.classpath and no build output under {}; javac will reject edits that reference dependencies. Build once (with dependencies copied) or set validator.classpath",
                project_root.display()
            );
        }
        Self {
            full_compile: settings.full_compile(),
            javac,
            classpath,
            source_roots: roots,
            process: ProcessRunner::new(TerminationPolicy::from_settings(build)),
        }
    }

    pub async fn validate(&self, path: &Path) -> ValidationOutcome {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                return Self::failure(0, format!("cannot read {}: {}", path.display(), e), "io");
            }
        };

        let syntax = self.check_syntax(&source);
        if !syntax.success || !self.full_compile {
            return syntax;
        }

        let Some(javac) = self.javac.as_ref().filter(|j| j.exists() || j.components().count() == 1) else {
            tracing::warn!("{} ({})", DEGRADED_WARNING, path.display());
            return Self::degraded(syntax);
        };

        match self.compile(javac, path).await {
            Ok(process) => {
                let outcome = ValidationOutcome::from_javac(&process);
                tracing::debug!(
                    "javac on {}: {} error(s), {} warning(s)",
                    path.display(),
                    outcome.errors.len(),
                    outcome.warnings.len()
                );
                outcome
            }
            Err(e) => {
                tracing::warn!("javac could not run: {}", e);
                Self::degraded(syntax)
            }
        }
    }

    /// Tier one alone, against in-memory content.
    pub fn check_syntax(&self, source: &str) -> ValidationOutcome {
        match syntax_errors(source, &refit_lang::java()) {
            Ok(errors) => ValidationOutcome {
                success: errors.is_empty(),
                errors: errors
                    .into_iter()
                    .map(|e| CompilationError {
                        line: e.line,
                        column: e.column,
                        message: format!("unexpected {} near `{}`", e.node_kind, e.context.trim()),
                        code: "syntax".into(),
                    })
                    .collect(),
                ..ValidationOutcome::syntax_only()
            },
            Err(e) => Self::failure(0, e.to_string(), "syntax"),
        }
    }

    async fn compile(&self, javac: &Path, file: &Path) -> Result<ProcessOutcome, VerifyError> {
        let out_dir = tempfile::tempdir().map_err(|e| VerifyError::ToolExecution {
            tool: "javac".into(),
            source: e,
        })?;
        let mut argv = vec![
            javac.to_string_lossy().into_owned(),
            "-d".into(),
            out_dir.path().to_string_lossy().into_owned(),
            "-proc:none".into(),
            "-implicit:none".into(),
        ];
        if !self.source_roots.is_empty() {
            let joined = std::env::join_paths(&self.source_roots)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            argv.push("-sourcepath".into());
            argv.push(joined);
        }
        if let Some(cp) = &self.classpath {
            argv.push("-cp".into());
            argv.push(cp.clone());
        }
        argv.push(file.to_string_lossy().into_owned());

        let cwd = file.parent().unwrap_or_else(|| Path::new("."));
        self.process.run(&argv, cwd).await
    }

    fn degraded(mut syntax: ValidationOutcome) -> ValidationOutcome {
        syntax.degraded = true;
        syntax.warnings.push(CompilationWarning {
            line: 0,
            message: DEGRADED_WARNING.into(),
        });
        syntax
    }

    fn failure(line: usize, message: String, code: &str) -> ValidationOutcome {
        ValidationOutcome {
            success: false,
            errors: vec![CompilationError {
                line,
                column: 0,
                message,
                code: code.into(),
            }],
            ..ValidationOutcome::syntax_only()
        }
    }
}

/// Classpath assembled from existing build output and dependency jars.
pub fn derived_classpath(project_root: &Path) -> Option<String> {
    let mut entries: Vec<PathBuf> = BUILD_OUTPUT_DIRS
        .iter()
        .map(|d| project_root.join(d))
        .filter(|d| d.is_dir())
        .collect();
    for dir in JAR_DIRS {
        let Ok(listing) = std::fs::read_dir(project_root.join(dir)) else {
            continue;
        };
        let mut jars: Vec<PathBuf> = listing
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jar"))
            .collect();
        jars.sort();
        entries.extend(jars);
    }
    if entries.is_empty() {
        return None;
    }
    std::env::join_paths(&entries)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::TerminationPath;
    use std::fs;
    use std::time::Duration;

    fn validator(full: bool, javac: Option<PathBuf>) -> CompilationValidator {
        CompilationValidator {
            full_compile: full,
            javac,
            ..CompilationValidator::syntax_only()
        }
    }

    #[test]
    fn test_classpath_derived_from_build_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("pom.xml"), "<project/>").unwrap();
        fs::create_dir_all(root.join("target/classes")).unwrap();
        fs::create_dir_all(root.join("target/dependency")).unwrap();
        fs::write(root.join("target/dependency/guava.jar"), "").unwrap();
        fs::write(root.join("target/dependency/commons-lang3.jar"), "").unwrap();
        fs::write(root.join("target/dependency/README.txt"), "").unwrap();

        let validator = CompilationValidator::from_config(
            root,
            &ValidatorSettings::default(),
            &BuildSettings::default(),
        );
        let classpath = validator.classpath.unwrap();
        let entries: Vec<PathBuf> = std::env::split_paths(&classpath).collect();
        assert_eq!(
            entries,
            vec![
                root.join("target/classes"),
                root.join("target/dependency/commons-lang3.jar"),
                root.join("target/dependency/guava.jar"),
            ]
        );
    }

    #[test]
    fn test_configured_classpath_wins_and_bare_project_has_none() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("target/classes")).unwrap();
        let settings = ValidatorSettings {
            classpath: Some("/opt/libs/app.jar".into()),
            ..ValidatorSettings::default()
        };
        let configured = CompilationValidator::from_config(dir.path(), &settings, &BuildSettings::default());
        assert_eq!(configured.classpath.as_deref(), Some("/opt/libs/app.jar"));

        let bare = tempfile::tempdir().unwrap();
        assert!(derived_classpath(bare.path()).is_none());
    }

    #[tokio::test]
    async fn test_syntax_error_reports_line_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "class A {\n    void f() {\n        int x = ;\n    }\n}\n").unwrap();

        let outcome = validator(true, None).validate(&file).await;
        assert!(!outcome.success);
        assert_eq!(outcome.tier, ValidationTier::SyntaxOnly);
        assert!(!outcome.degraded);
        assert_eq!(outcome.errors[0].code, "syntax");
        assert_eq!(outcome.errors[0].line, 3);
    }

    #[tokio::test]
    async fn test_disabled_full_compile_is_not_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "class A {}\n").unwrap();

        let outcome = validator(false, None).validate(&file).await;
        assert!(outcome.success);
        assert!(!outcome.degraded);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_javac_degrades_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "class A {}\n").unwrap();

        let outcome = validator(true, Some(dir.path().join("no-such-javac"))).validate(&file).await;
        assert!(outcome.success);
        assert!(outcome.degraded);
        assert_eq!(outcome.tier, ValidationTier::SyntaxOnly);
        assert_eq!(outcome.warnings[0].message, DEGRADED_WARNING);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = validator(false, None).validate(&dir.path().join("Gone.java")).await;
        assert!(!outcome.success);
        assert_eq!(outcome.errors[0].code, "io");
    }

    #[test]
    fn test_javac_output_is_interpreted() {
        let process = ProcessOutcome {
            success: false,
            exit_code: 1,
            output: "A.java:3: error: cannot find symbol\n        return totl;\n               ^\nA.java:1: warning: [rawtypes] found raw type\n1 error\n".into(),
            elapsed: Duration::from_millis(300),
            timed_out: false,
            termination: TerminationPath::Completed,
        };
        let outcome = ValidationOutcome::from_javac(&process);
        assert!(!outcome.success);
        assert_eq!(outcome.tier, ValidationTier::Full);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line, 3);
        assert_eq!(outcome.errors[0].column, 16);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.error_summary(), "3:16: cannot find symbol");
    }

    #[test]
    fn test_silent_javac_failure_still_fails() {
        let process = ProcessOutcome {
            success: false,
            exit_code: 2,
            output: "error: invalid flag: -bogus\n".into(),
            elapsed: Duration::from_millis(10),
            timed_out: false,
            termination: TerminationPath::Completed,
        };
        let outcome = ValidationOutcome::from_javac(&process);
        assert!(!outcome.success);
        assert_eq!(outcome.errors[0].message, "error: invalid flag: -bogus");
    }
}
