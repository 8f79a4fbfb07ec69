//! Rename and delete of single files

use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};

use crate::models::RenameOutcome;

#[derive(Debug, thiserror::Error)]
#[error("Failed to delete {}: {}", .path.display(), .source)]
pub struct MutationError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Remove a file. Any OS error (permissions, not found, in use) is a failure.
pub async fn delete_file(path: &Path) -> Result<(), MutationError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| MutationError {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Deleted {}", path.display());
    Ok(())
}

/// Destination of a rename: same directory, new name
pub fn rename_destination(path: &Path, new_name: &str) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(new_name),
        None => PathBuf::from(new_name),
    }
}

/// Rename `path` to `new_name` within its directory.
///
/// Never returns an error. Collisions are not checked: the OS rename decides
/// whether an existing destination is overwritten or the call fails.
pub fn rename_file(path: &Path, new_name: &str) -> RenameOutcome {
    let destination = rename_destination(path, new_name);
    match std::fs::rename(path, &destination) {
        Ok(()) => {
            info!("Renamed {} -> {}", path.display(), destination.display());
            RenameOutcome {
                path: destination,
                success: true,
            }
        }
        Err(e) => {
            warn!("Failed to rename {}: {}", path.display(), e);
            RenameOutcome {
                path: path.to_path_buf(),
                success: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_rename_destination() {
        assert_eq!(
            rename_destination(Path::new("/a/b/old.txt"), "new.txt"),
            PathBuf::from("/a/b/new.txt")
        );
    }

    #[test]
    fn test_rename_success() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.txt");
        fs::write(&old, "content").unwrap();

        let outcome = rename_file(&old, "new.txt");

        assert!(outcome.success);
        assert_eq!(outcome.path, dir.path().join("new.txt"));
        assert!(!old.exists());
        assert_eq!(fs::read_to_string(dir.path().join("new.txt")).unwrap(), "content");
    }

    #[test]
    fn test_rename_failure_keeps_original_path() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old.txt");
        fs::write(&old, "content").unwrap();
        // A non-empty directory as destination makes the OS refuse
        let blocker = dir.path().join("new.txt");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("inside"), "x").unwrap();

        let outcome = rename_file(&old, "new.txt");

        assert!(!outcome.success);
        assert_eq!(outcome.path, old);
        assert!(old.exists());
    }

    #[test]
    fn test_rename_missing_source() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        let outcome = rename_file(&missing, "other.txt");

        assert_eq!(
            outcome,
            RenameOutcome {
                path: missing,
                success: false
            }
        );
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doomed.txt");
        fs::write(&path, "bye").unwrap();

        delete_file(&path).await.unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_missing_file_fails() {
        let dir = tempdir().unwrap();
        let result = delete_file(&dir.path().join("missing.txt")).await;
        assert!(result.is_err());
    }
}
