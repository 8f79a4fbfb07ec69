//! Remote (Google Drive) file descriptors

use serde::{Deserialize, Serialize};

/// A file listed from the user's Drive
///
/// Field names follow the Drive v3 `files` resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub modified_time: Option<String>,
    /// Size in bytes; Drive encodes int64 values as strings
    pub size: Option<String>,
    pub icon_link: Option<String>,
    pub thumbnail_link: Option<String>,
    pub web_view_link: Option<String>,
}

impl RemoteFileRecord {
    /// Google-native documents (Docs, Sheets, ...) report no size
    pub fn is_google_native(&self) -> bool {
        self.mime_type.starts_with("application/vnd.google-apps.")
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size.as_deref().and_then(|s| s.parse().ok())
    }
}
