//! Directory enumeration

use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};

use crate::models::{FileRecord, FileStat};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Failed to read directory {}: {}", .path.display(), .source)]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("Failed to stat {}: {}", .path.display(), .source)]
    Stat { path: PathBuf, source: io::Error },
}

/// List one directory level under `root`.
///
/// Records carry absolute paths and are sorted by name. Entry metadata is
/// read without following symlinks, so a dangling link still counts.
pub fn list_files(root: &Path) -> Result<Vec<FileRecord>, InventoryError> {
    let root = std::path::absolute(root).map_err(|source| InventoryError::ReadDir {
        path: root.to_path_buf(),
        source,
    })?;

    let entries = std::fs::read_dir(&root).map_err(|source| InventoryError::ReadDir {
        path: root.clone(),
        source,
    })?;

    let paths = entries.filter_map(|entry| match entry {
        Ok(entry) => Some(entry.path()),
        Err(e) => {
            warn!("Skipping unreadable entry in {}: {}", root.display(), e);
            None
        }
    });
    let mut records = records_for(paths);

    records.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Listed {} entries in {}", records.len(), root.display());
    Ok(records)
}

/// Stat each path, skipping entries that vanished or cannot be read
fn records_for(paths: impl IntoIterator<Item = PathBuf>) -> Vec<FileRecord> {
    paths
        .into_iter()
        .filter_map(|path| match record_for(path) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping entry: {}", e);
                None
            }
        })
        .collect()
}

fn record_for(path: PathBuf) -> Result<FileRecord, InventoryError> {
    let meta = std::fs::symlink_metadata(&path).map_err(|source| InventoryError::Stat {
        path: path.clone(),
        source,
    })?;
    Ok(FileRecord::new(path, FileStat::from_metadata(&meta)))
}

/// [`list_files`] for the channel boundary: failures become an empty batch.
pub fn list_files_or_empty(root: &Path) -> Vec<FileRecord> {
    match list_files(root) {
        Ok(records) => records,
        Err(e) => {
            warn!("{}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lists_every_entry() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bee").unwrap();
        fs::write(dir.path().join("a.pdf"), "%PDF").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("deep.txt"), "ignored").unwrap();

        let records = list_files(dir.path()).unwrap();

        assert_eq!(records.len(), 3);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.txt", "nested"]);
        for record in &records {
            assert!(!record.name.is_empty());
            assert!(record.filename.is_absolute());
        }
        assert!(records[2].stat.is_directory);
        assert_eq!(records[1].stat.size, 3);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");

        assert!(matches!(
            list_files(&missing),
            Err(InventoryError::ReadDir { .. })
        ));
        assert!(list_files_or_empty(&missing).is_empty());
    }

    #[test]
    fn test_vanished_entry_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();

        // b.txt was listed by read_dir but removed before it was stat'ed
        let records = records_for(vec![
            dir.path().join("a.txt"),
            dir.path().join("b.txt"),
            dir.path().join("c.txt"),
        ]);

        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
        assert!(matches!(
            record_for(dir.path().join("b.txt")),
            Err(InventoryError::Stat { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_listed() {
        let dir = tempdir().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("link")).unwrap();

        let records = list_files(dir.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert!(records[0].stat.is_symlink);
    }
}
