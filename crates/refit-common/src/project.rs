use std::path::{Path, PathBuf};

/// Files whose presence marks a Maven, Gradle or Ant project root.
const PROJECT_MARKERS: &[&str] = &[
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "build.xml",
];

/// Nearest ancestor of `start` (itself included, or its directory when
/// `start` is a file) holding a build manifest.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let from = if start.is_file() { start.parent()? } else { start };
    from.ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|m| dir.join(m).is_file()))
        .map(Path::to_path_buf)
}

/// Conventional source roots that exist under `project_root`.
pub fn source_roots(project_root: &Path) -> Vec<PathBuf> {
    ["src/main/java", "src/test/java", "src"]
        .iter()
        .map(|r| project_root.join(r))
        .filter(|p| p.is_dir())
        .collect()
}
