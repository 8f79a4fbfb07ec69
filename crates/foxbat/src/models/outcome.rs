//! Results the backend sends back for previews and file mutations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::channel::CorrelationId;

/// Outcome of one preview request
///
/// `image` is `None` when rendering failed; that is distinct from the
/// reply not having arrived yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub correlation_id: CorrelationId,
    /// Base64-encoded PNG
    pub image: Option<String>,
}

/// Outcome of a delete request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub correlation_id: CorrelationId,
    pub success: bool,
    pub new_path: Option<PathBuf>,
}

/// Outcome of a synchronous rename
///
/// `path` is the destination on success and the untouched original path on
/// failure, so the UI can always store it back into its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameOutcome {
    pub path: PathBuf,
    pub success: bool,
}
