//! `RefitConfig`: the optional `.refit/config.json` file.
//!
//! Every field is optional on disk; the accessor methods supply defaults
//! so callers never deal with `Option` for tunables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Location of the config file relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = ".refit/config.json";
/// Default snapshot directory relative to the project root.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".refit/backups";

const MIN_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefitConfig {
    #[serde(default)]
    pub snapshots: SnapshotSettings,
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub validator: ValidatorSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
    #[serde(default)]
    pub extract_method: ExtractMethodSettings,
    #[serde(default)]
    pub parameter_object: ParameterObjectSettings,
}

impl RefitConfig {
    /// Load the config for `project_root`.
    ///
    /// An explicit path must exist. The default location is optional and
    /// falls back to built-in defaults when absent.
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = project_root.join(DEFAULT_CONFIG_PATH);
                if !default.exists() {
                    tracing::debug!("No config at {}, using defaults", default.display());
                    return Ok(Self::default());
                }
                default
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Parse { path, source: e })?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumPolicy {
    /// A checksum mismatch on restore is an error.
    #[default]
    Strict,
    /// A checksum mismatch on restore is logged and the restore proceeds.
    Advisory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotSettings {
    pub dir: Option<PathBuf>,
    pub keep: Option<usize>,
    pub checksum_policy: Option<ChecksumPolicy>,
    pub lock_stale_secs: Option<u64>,
}

impl SnapshotSettings {
    /// Snapshot directory, resolved against the project root when relative.
    pub fn dir(&self, project_root: &Path) -> PathBuf {
        match &self.dir {
            Some(d) if d.is_absolute() => d.clone(),
            Some(d) => project_root.join(d),
            None => project_root.join(DEFAULT_SNAPSHOT_DIR),
        }
    }

    pub fn keep(&self) -> usize {
        self.keep.unwrap_or(5).max(1)
    }

    pub fn checksum_policy(&self) -> ChecksumPolicy {
        self.checksum_policy.unwrap_or_default()
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs.unwrap_or(600))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSettings {
    pub timeout_secs: Option<u64>,
    pub grace_secs: Option<u64>,
    /// Full argv for the compile step, overriding detection.
    pub compile_command: Option<Vec<String>>,
    /// Full argv for the test step, overriding detection.
    pub test_command: Option<Vec<String>>,
    pub require_build_tool: Option<bool>,
}

impl BuildSettings {
    /// Process timeout, clamped to `[10s, 3600s]`.
    pub fn timeout(&self) -> Duration {
        let secs = self
            .timeout_secs
            .unwrap_or(300)
            .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs.unwrap_or(5))
    }

    pub fn require_build_tool(&self) -> bool {
        self.require_build_tool.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatorSettings {
    pub full_compile: Option<bool>,
    pub javac: Option<PathBuf>,
    pub classpath: Option<String>,
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,
}

impl ValidatorSettings {
    pub fn full_compile(&self) -> bool {
        self.full_compile.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub dry_run: Option<bool>,
    pub stop_on_first_failure: Option<bool>,
    pub run_build: Option<bool>,
    pub run_tests: Option<bool>,
}

impl WorkflowSettings {
    pub fn dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }

    pub fn stop_on_first_failure(&self) -> bool {
        self.stop_on_first_failure.unwrap_or(true)
    }

    pub fn run_build(&self) -> bool {
        self.run_build.unwrap_or(true)
    }

    pub fn run_tests(&self) -> bool {
        self.run_tests.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractMethodSettings {
    pub threshold: Option<usize>,
    pub min_block: Option<usize>,
    pub max_block: Option<usize>,
    pub auto_apply: Option<bool>,
}

impl ExtractMethodSettings {
    /// A method is a candidate once its statement count exceeds this.
    pub fn threshold(&self) -> usize {
        self.threshold.unwrap_or(15)
    }

    pub fn min_block(&self) -> usize {
        self.min_block.unwrap_or(5).max(1)
    }

    pub fn max_block(&self) -> usize {
        self.max_block.unwrap_or(15).max(self.min_block())
    }

    pub fn auto_apply(&self) -> bool {
        self.auto_apply.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterObjectSettings {
    pub max_parameters: Option<usize>,
}

impl ParameterObjectSettings {
    pub fn max_parameters(&self) -> usize {
        self.max_parameters.unwrap_or(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = RefitConfig::default();
        assert_eq!(config.snapshots.keep(), 5);
        assert_eq!(config.snapshots.checksum_policy(), ChecksumPolicy::Strict);
        assert_eq!(config.build.timeout(), Duration::from_secs(300));
        assert_eq!(config.build.grace(), Duration::from_secs(5));
        assert!(config.validator.full_compile());
        assert!(config.workflow.stop_on_first_failure());
        assert!(!config.workflow.dry_run());
        assert_eq!(config.extract_method.threshold(), 15);
        assert_eq!(config.extract_method.min_block(), 5);
        assert_eq!(config.extract_method.max_block(), 15);
        assert!(!config.extract_method.auto_apply());
        assert_eq!(config.parameter_object.max_parameters(), 3);
    }

    #[test]
    fn test_timeout_is_clamped() {
        let mut build = BuildSettings::default();
        build.timeout_secs = Some(1);
        assert_eq!(build.timeout(), Duration::from_secs(10));
        build.timeout_secs = Some(100_000);
        assert_eq!(build.timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RefitConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.snapshots.dir(dir.path()), dir.path().join(".refit/backups"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".refit")).unwrap();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_PATH),
            r#"{"snapshots": {"keep": 2, "checksum_policy": "advisory"}, "workflow": {"dry_run": true}}"#,
        )
        .unwrap();

        let config = RefitConfig::load(dir.path(), None).unwrap();
        assert_eq!(config.snapshots.keep(), 2);
        assert_eq!(config.snapshots.checksum_policy(), ChecksumPolicy::Advisory);
        assert!(config.workflow.dry_run());
        assert!(config.workflow.run_tests());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refit.json");
        fs::write(&path, "{not json").unwrap();
        let err = RefitConfig::load(dir.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RefitConfig::load(dir.path(), Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
