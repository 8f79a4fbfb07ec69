//! Google Drive integration
//!
//! This module provides:
//! - the OAuth2 token store and login flow
//! - a Drive v3 client that aggregates paginated file listings

mod auth;
mod client;

pub use auth::{
    AuthState, AuthorizationCode, GoogleTokenEndpoint, PendingLogin, SharedTokenStore,
    StoredCredential, TokenExchange, TokenResponse, TokenStore,
};
pub use client::{DriveAuthError, DriveClient, FilePageSource, list_files_all};

/// Drive API response types
pub mod api {
    use serde::Deserialize;

    use crate::models::RemoteFileRecord;

    /// One page of `files.list`
    #[derive(Debug, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FileListPage {
        pub files: Option<Vec<RemoteFileRecord>>,
        pub next_page_token: Option<String>,
        pub incomplete_search: Option<bool>,
    }
}
