use refit_common::config::BuildSettings;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTool {
    Maven,
    Gradle,
    Ant,
}

impl BuildTool {
    pub fn name(self) -> &'static str {
        match self {
            Self::Maven => "maven",
            Self::Gradle => "gradle",
            Self::Ant => "ant",
        }
    }

    fn binary(self) -> &'static str {
        match self {
            Self::Maven => "mvn",
            Self::Gradle => "gradle",
            Self::Ant => "ant",
        }
    }

    fn wrapper(self) -> Option<&'static str> {
        match self {
            Self::Maven => Some("mvnw"),
            Self::Gradle => Some("gradlew"),
            Self::Ant => None,
        }
    }

    fn compile_args(self) -> &'static [&'static str] {
        match self {
            Self::Maven => &["-B", "-q", "clean", "compile"],
            Self::Gradle => &["clean", "compileJava", "compileTestJava"],
            Self::Ant => &["clean", "compile"],
        }
    }

    fn test_args(self) -> &'static [&'static str] {
        match self {
            Self::Maven => &["-B", "-q", "test"],
            Self::Gradle => &["test"],
            Self::Ant => &["test"],
        }
    }

    /// The project's wrapper script if present, else the tool on PATH.
    pub fn executable(self, project_root: &Path) -> Option<PathBuf> {
        if let Some(wrapper) = self.wrapper() {
            let local = project_root.join(wrapper);
            if local.is_file() {
                return Some(local);
            }
        }
        which::which(self.binary()).ok()
    }
}

/// The build tool a project declares through its manifest, if any.
pub fn detect_build_tool(project_root: &Path) -> Option<BuildTool> {
    if project_root.join("pom.xml").exists() {
        return Some(BuildTool::Maven);
    }
    if project_root.join("build.gradle").exists() || project_root.join("build.gradle.kts").exists() {
        return Some(BuildTool::Gradle);
    }
    if project_root.join("build.xml").exists() {
        return Some(BuildTool::Ant);
    }
    None
}

/// Compile and test command lines for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildCommands {
    pub tool: Option<BuildTool>,
    pub compile: Option<Vec<String>>,
    pub test: Option<Vec<String>>,
    /// Why a command could not be resolved.
    pub missing: Option<String>,
}

/// Resolve the build commands: explicit config first, then detection.
pub fn resolve_commands(project_root: &Path, settings: &BuildSettings) -> BuildCommands {
    let tool = detect_build_tool(project_root);
    let mut commands = BuildCommands {
        tool,
        compile: settings.compile_command.clone().filter(|c| !c.is_empty()),
        test: settings.test_command.clone().filter(|c| !c.is_empty()),
        missing: None,
    };
    if commands.compile.is_some() && commands.test.is_some() {
        return commands;
    }

    let Some(tool) = tool else {
        commands.missing = Some("no pom.xml, build.gradle or build.xml in project root".into());
        return commands;
    };
    let Some(exe) = tool.executable(project_root) else {
        commands.missing = Some(format!("{} not found on PATH", tool.binary()));
        return commands;
    };
    tracing::debug!("Using {} at {}", tool.name(), exe.display());

    let argv = |args: &[&str]| {
        std::iter::once(exe.to_string_lossy().into_owned())
            .chain(args.iter().map(|a| a.to_string()))
            .collect::<Vec<_>>()
    };
    if commands.compile.is_none() {
        commands.compile = Some(argv(tool.compile_args()));
    }
    if commands.test.is_none() {
        commands.test = Some(argv(tool.test_args()));
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detects_by_marker_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_build_tool(dir.path()), None);

        fs::write(dir.path().join("build.xml"), "<project/>").unwrap();
        assert_eq!(detect_build_tool(dir.path()), Some(BuildTool::Ant));

        fs::write(dir.path().join("build.gradle.kts"), "").unwrap();
        assert_eq!(detect_build_tool(dir.path()), Some(BuildTool::Gradle));

        fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        assert_eq!(detect_build_tool(dir.path()), Some(BuildTool::Maven));
    }

    #[test]
    fn test_wrapper_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        fs::write(dir.path().join("mvnw"), "#!/bin/sh\n").unwrap();

        let commands = resolve_commands(dir.path(), &BuildSettings::default());
        assert_eq!(commands.tool, Some(BuildTool::Maven));
        let compile = commands.compile.unwrap();
        assert!(compile[0].ends_with("mvnw"));
        assert_eq!(&compile[1..], &["-B", "-q", "clean", "compile"]);
        assert_eq!(&commands.test.unwrap()[1..], &["-B", "-q", "test"]);
    }

    #[test]
    fn test_config_overrides_detection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = BuildSettings {
            compile_command: Some(vec!["make".into(), "classes".into()]),
            test_command: Some(vec!["make".into(), "check".into()]),
            ..Default::default()
        };
        let commands = resolve_commands(dir.path(), &settings);
        assert_eq!(commands.tool, None);
        assert_eq!(commands.compile, Some(vec!["make".to_string(), "classes".to_string()]));
        assert_eq!(commands.test, Some(vec!["make".to_string(), "check".to_string()]));
        assert!(commands.missing.is_none());
    }

    #[test]
    fn test_no_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let commands = resolve_commands(dir.path(), &BuildSettings::default());
        assert!(commands.compile.is_none());
        assert!(commands.missing.unwrap().contains("pom.xml"));
    }
}
