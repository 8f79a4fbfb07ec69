//! Per-file view state

use chrono::{DateTime, Datelike, Local, TimeZone};

use super::presenter::Preview;
use crate::models::{FileRecord, RenameOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewState {
    /// Spinner until the presenter settles
    Loading,
    Ready(Preview),
}

/// State behind one tile in the file grid
#[derive(Debug, Clone)]
pub struct FileCard {
    record: FileRecord,
    preview: PreviewState,
    removed: bool,
}

impl FileCard {
    pub fn new(record: FileRecord) -> Self {
        Self {
            record,
            preview: PreviewState::Loading,
            removed: false,
        }
    }

    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Last modified date as d/m/yyyy in local time
    pub fn last_modified_label(&self) -> String {
        let modified: DateTime<Local> = Local
            .timestamp_millis_opt(self.record.stat.mtime_ms)
            .single()
            .unwrap_or_else(|| DateTime::<Local>::from(std::time::UNIX_EPOCH));
        format!("{}/{}/{}", modified.day(), modified.month(), modified.year())
    }

    /// Full file name for a rename where the user typed only the stem.
    /// The original extension is kept.
    pub fn rename_target(&self, stem: &str) -> String {
        match self.record.filename.extension() {
            Some(ext) if !ext.is_empty() => format!("{}.{}", stem, ext.to_string_lossy()),
            _ => stem.to_string(),
        }
    }

    /// Store the rename result. On failure the path is the original one, so
    /// the card simply keeps its old name. Returns whether it succeeded.
    pub fn apply_rename(&mut self, outcome: &RenameOutcome) -> bool {
        self.record.filename = outcome.path.clone();
        if let Some(name) = outcome.path.file_name() {
            self.record.name = name.to_string_lossy().into_owned();
        }
        outcome.success
    }

    /// A failed delete leaves the card listed
    pub fn apply_delete(&mut self, success: bool) {
        if success {
            self.removed = true;
        }
    }

    /// A superseded result is ignored; the newer request will land here
    pub fn set_preview(&mut self, preview: Preview) {
        if preview != Preview::Superseded {
            self.preview = PreviewState::Ready(preview);
        }
    }

    pub fn preview_image(&self) -> Option<&str> {
        match &self.preview {
            PreviewState::Loading => None,
            PreviewState::Ready(preview) => Some(preview.image()),
        }
    }
}
