//! Mtime helpers.

use std::path::Path;
use std::time::SystemTime;

/// Get the modification time of a file
///
/// Returns `None` if the file doesn't exist or mtime cannot be read
pub fn get_mtime(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_has_no_mtime() {
        let dir = TempDir::new().unwrap();
        assert!(get_mtime(&dir.path().join("missing.md")).is_none());
    }

    #[test]
    fn test_existing_file_has_mtime() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("POL.md");
        std::fs::write(&path, "# policy").unwrap();
        assert!(get_mtime(&path).unwrap() > SystemTime::UNIX_EPOCH);
    }
}
