//! Executable lookup

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::OracleError;

/// Resolve `program` to an executable file.
///
/// Bare names are searched on `PATH`; anything with a directory part is
/// checked as given.
pub fn locate_program(program: &Path) -> Result<PathBuf, OracleError> {
    let not_found = || OracleError::NotFound(program.display().to_string());

    if program.as_os_str().is_empty() {
        return Err(not_found());
    }

    if program.components().count() > 1 || program.is_absolute() {
        return if is_executable(program) {
            Ok(program.to_path_buf())
        } else {
            Err(not_found())
        };
    }

    let path_var = std::env::var_os("PATH").ok_or_else(not_found)?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            debug!("Found {} at {:?}", program.display(), candidate);
            return Ok(candidate);
        }
    }

    Err(not_found())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::script;

    #[test]
    fn test_locate_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = script(dir.path(), "undertaker", "exit 0");
        assert_eq!(locate_program(&oracle).unwrap(), oracle);
    }

    #[test]
    fn test_non_executable_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain");
        std::fs::write(&path, "data").unwrap();
        assert!(matches!(locate_program(&path), Err(OracleError::NotFound(_))));
    }

    #[test]
    fn test_locate_on_path() {
        assert!(locate_program(Path::new("sh")).is_ok());
        assert!(matches!(
            locate_program(Path::new("definitely-not-an-oracle-binary")),
            Err(OracleError::NotFound(_))
        ));
    }
}
