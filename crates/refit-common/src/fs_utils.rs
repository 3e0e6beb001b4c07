use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{path} resolves outside the project root {root}")]
    PathTraversal { path: PathBuf, root: PathBuf },

    #[error("Cannot write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },

    #[error("Cannot create directory {path}: {source}")]
    MkdirError { path: PathBuf, source: io::Error },

    #[error("Cannot move temporary file over {path}: {source}")]
    RenameError { path: PathBuf, source: io::Error },
}

/// `path` joined onto `root` (unless absolute) and lexically normalized.
/// Fails when the result leaves `root`.
pub fn resolve_within_root(root: &Path, path: &Path) -> Result<PathBuf, FsError> {
    let resolved = normalize_path(&root.join(path));
    if resolved.starts_with(normalize_path(root)) {
        Ok(resolved)
    } else {
        Err(FsError::PathTraversal {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        })
    }
}

/// Drop `.` and fold `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Identity of a file for maps and locks: canonical when it exists,
/// otherwise absolute and normalized.
pub fn file_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        let absolute = std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf());
        normalize_path(&absolute)
    })
}

/// Replace `target` with `content` through a synced sibling temp file, so
/// readers see either the old bytes or the new ones. An existing target's
/// permissions are kept.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<(), FsError> {
    let dir = match target.parent() {
        None => {
            return Err(FsError::WriteError {
                path: target.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"),
            })
        }
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
    };
    fs::create_dir_all(dir).map_err(|source| FsError::MkdirError {
        path: dir.to_path_buf(),
        source,
    })?;

    let write_error = |source| FsError::WriteError {
        path: target.to_path_buf(),
        source,
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(write_error)?;
    temp.write_all(content).map_err(write_error)?;
    if let Ok(existing) = fs::metadata(target) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_error)?;
    }
    temp.as_file().sync_all().map_err(write_error)?;
    temp.persist(target)
        .map(|_| ())
        .map_err(|e| FsError::RenameError {
            path: target.to_path_buf(),
            source: e.error,
        })
}

/// A trailing newline does not open another line.
pub fn line_count(content: &str) -> usize {
    content.lines().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_within_root() {
        let root = Path::new("/project");
        let cases = [
            ("src/main/java/App.java", Some("/project/src/main/java/App.java")),
            ("src/../lib/./Util.java", Some("/project/lib/Util.java")),
            ("/project/src/A.java", Some("/project/src/A.java")),
            ("../../../etc/passwd", None),
            ("/elsewhere/A.java", None),
            ("src/../../project-other/A.java", None),
        ];
        for (input, expected) in cases {
            let result = resolve_within_root(root, Path::new(input));
            match expected {
                Some(path) => assert_eq!(result.unwrap(), PathBuf::from(path), "{input}"),
                None => assert!(matches!(result, Err(FsError::PathTraversal { .. })), "{input}"),
            }
        }
    }

    #[test]
    fn test_file_key_matches_for_relative_and_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.java");
        fs::write(&file, "class A {}").unwrap();
        let dotted = dir.path().join(".").join("A.java");
        assert_eq!(file_key(&file), file_key(&dotted));
    }

    #[test]
    fn test_atomic_write_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("com").join("acme").join("A.java");
        atomic_write(&target, b"class A {}").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "class A {}");

        atomic_write(&target, b"class A { int x; }").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "class A { int x; }");
        assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_atomic_write_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("A.java");
        fs::write(&target, "original").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        atomic_write(&target, b"replaced").unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 0);
        assert_eq!(line_count("a\nb\n"), 2);
        assert_eq!(line_count("a\nb"), 2);
    }
}
