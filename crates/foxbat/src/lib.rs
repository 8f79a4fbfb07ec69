//! Foxbat - Business logic for the desktop file browser
//!
//! This crate provides the parts of the shell that do not draw pixels:
//! - Correlated request/reply channel between the UI and the backend
//! - Local file inventory and mutations (rename, delete)
//! - Preview rendering on a shared headless browser
//! - Google Drive OAuth token store and paginated file listing
//! - UI-side presenter with a preview deadline and placeholder fallback

pub mod backend;
pub mod channel;
pub mod config;
pub mod drive;
pub mod fs;
pub mod models;
pub mod preview;
pub mod ui;

pub use backend::{Backend, Desktop, DriveAccess, SystemDesktop};
pub use channel::{ChannelClient, ChannelError, PendingReply, Reply, Request, pair};
pub use crate::config::{DriveCredentials, ShellConfig};
pub use drive::{AuthState, DriveClient, FilePageSource, SharedTokenStore, TokenStore, list_files_all};
pub use models::{FileRecord, FileStat, MutationOutcome, PreviewResult, RemoteFileRecord, RenameOutcome};
pub use preview::{BrowserSession, ChromeBrowser, LaunchOptions, PreviewError, RenderOptions, render_preview};
pub use ui::{FileCard, Preview, PreviewPresenter, SystemService};
