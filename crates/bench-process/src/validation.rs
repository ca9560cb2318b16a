//! Executable validation.

use bench_common::{BenchError, BenchResult};
use std::path::Path;

/// Validate the node binary path before any process is spawned.
///
/// Bare names (no path separator) are resolved through `PATH` at spawn time
/// and only checked for emptiness here.
pub fn validate_executable(path: &str) -> BenchResult<()> {
    if path.trim().is_empty() {
        return Err(BenchError::configuration("Node binary path cannot be empty"));
    }

    if !path.contains(std::path::MAIN_SEPARATOR) && !path.contains('/') {
        return Ok(());
    }

    let candidate = Path::new(path);
    let metadata = std::fs::metadata(candidate).map_err(|e| {
        BenchError::configuration(format!("Node binary {} is not accessible: {}", path, e))
    })?;

    if !metadata.is_file() {
        return Err(BenchError::configuration(format!(
            "Node binary {} is not a file",
            path
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(BenchError::configuration(format!(
                "Node binary {} is not executable",
                path
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_rejected() {
        assert!(validate_executable("").is_err());
        assert!(validate_executable("   ").is_err());
    }

    #[test]
    fn test_bare_name_accepted() {
        assert!(validate_executable("hyperloop_relaynode").is_ok());
    }

    #[test]
    fn test_missing_path_rejected() {
        let err = validate_executable("./target/debug/no_such_node").unwrap_err();
        assert!(matches!(err, BenchError::Configuration { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.txt");
        std::fs::write(&path, "not a binary").unwrap();
        let err = validate_executable(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }
}
