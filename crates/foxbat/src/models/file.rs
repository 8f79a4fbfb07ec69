//! Local file records produced by the inventory

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of one directory entry
///
/// Not kept in sync with the filesystem. The UI re-enumerates to pick up
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Entry name (last path component)
    pub name: String,
    /// Absolute path of the entry
    pub filename: PathBuf,
    pub stat: FileStat,
}

impl FileRecord {
    pub fn new(filename: impl Into<PathBuf>, stat: FileStat) -> Self {
        let filename = filename.into();
        let name = filename
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            filename,
            stat,
        }
    }

    pub fn path(&self) -> &Path {
        &self.filename
    }
}

/// Subset of filesystem stat info exposed to the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStat {
    /// Last modification time, milliseconds since the Unix epoch
    pub mtime_ms: i64,
    /// Creation time when the platform reports one
    pub birthtime_ms: Option<i64>,
    pub size: u64,
    pub is_directory: bool,
    pub is_file: bool,
    pub is_symlink: bool,
}

impl FileStat {
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            mtime_ms: meta.modified().map(epoch_millis).unwrap_or(0),
            birthtime_ms: meta.created().ok().map(epoch_millis),
            size: meta.len(),
            is_directory: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.file_type().is_symlink(),
        }
    }
}

fn epoch_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
