//! Wire types carried by the channel

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::models::{
    FileRecord, MutationOutcome, PreviewResult, RemoteFileRecord, RenameOutcome,
};

/// Unique token pairing a request with its single reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Work the UI side can ask the backend for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum Request {
    GetSystemFiles,
    GetPreview { path: PathBuf },
    OpenSysFile { path: PathBuf },
    ShowSysFile { path: PathBuf },
    DeleteSysFile { path: PathBuf },
    RenameSysFile { path: PathBuf, new_name: String },
    CheckGoogleLogin,
    GoogleDriveLogin,
    FetchDriveFiles,
    GoogleDriveLogout,
}

impl Request {
    /// Cheap filesystem work the backend answers before reading the next
    /// envelope. Everything else runs alongside other requests.
    pub fn runs_inline(&self) -> bool {
        matches!(self, Request::RenameSysFile { .. })
    }

    /// Channel name used in logs
    pub fn channel(&self) -> &'static str {
        match self {
            Request::GetSystemFiles => "get-system-files",
            Request::GetPreview { .. } => "get-preview",
            Request::OpenSysFile { .. } => "openSysFile",
            Request::ShowSysFile { .. } => "showSysFile",
            Request::DeleteSysFile { .. } => "deleteSysFile",
            Request::RenameSysFile { .. } => "renameSysFile",
            Request::CheckGoogleLogin => "check-google-login",
            Request::GoogleDriveLogin => "google-drive-login",
            Request::FetchDriveFiles => "fetch-drive-files",
            Request::GoogleDriveLogout => "google-drive-logout",
        }
    }
}

/// Backend answer to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum Reply {
    SystemFiles(Vec<FileRecord>),
    Preview(PreviewResult),
    Deleted(MutationOutcome),
    Renamed(RenameOutcome),
    LoginStatus(bool),
    DriveFiles(Vec<RemoteFileRecord>),
    /// Handled; nothing to report
    Ack,
    /// The handler failed; the message is for logs only
    Failure(String),
}

/// A request in flight from the UI side to the backend
#[derive(Debug)]
pub enum Envelope {
    /// No reply expected
    Fire(Request),
    /// Reply is sent back on the reply stream tagged with `id`
    Correlated { id: CorrelationId, request: Request },
    /// Answer comes back on `reply`; see [`Request::runs_inline`]
    Sync {
        request: Request,
        reply: oneshot::Sender<Reply>,
    },
}

impl Envelope {
    pub fn request(&self) -> &Request {
        match self {
            Envelope::Fire(request) => request,
            Envelope::Correlated { request, .. } => request,
            Envelope::Sync { request, .. } => request,
        }
    }
}

/// A correlated reply travelling back to the UI side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    pub correlation_id: CorrelationId,
    pub reply: Reply,
}
