//! Drive v3 HTTP client
//!
//! Uses synchronous HTTP (ureq); the backend calls it from the blocking pool.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::api::FileListPage;
use super::SharedTokenStore;
use crate::models::RemoteFileRecord;

/// The token was rejected (expired or revoked) and was not refreshed upstream
#[derive(Debug, thiserror::Error)]
#[error("Google Drive rejected the access token")]
pub struct DriveAuthError;

/// Anything that can return pages of Drive files
pub trait FilePageSource: Send + Sync {
    fn list_page(&self, page_token: Option<&str>) -> Result<FileListPage>;
}

/// Authenticated Drive API client
pub struct DriveClient {
    auth: SharedTokenStore,
    page_size: u32,
}

impl DriveClient {
    const BASE_URL: &'static str = "https://www.googleapis.com/drive/v3";

    const FIELDS: &'static str =
        "nextPageToken,incompleteSearch,files(id,name,mimeType,modifiedTime,size,iconLink,thumbnailLink,webViewLink)";

    pub fn new(auth: SharedTokenStore) -> Self {
        Self {
            auth,
            page_size: 100,
        }
    }

    /// Files per page (1-1000)
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, 1000);
        self
    }

    fn access_token(&self) -> Result<String> {
        self.auth
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?
            .access_token()
    }
}

impl FilePageSource for DriveClient {
    fn list_page(&self, page_token: Option<&str>) -> Result<FileListPage> {
        // Read before every call so a refresh by another handler is picked up
        let access_token = self.access_token()?;

        let mut url = format!(
            "{}/files?pageSize={}&q={}&fields={}",
            Self::BASE_URL,
            self.page_size,
            urlencoding::encode("trashed = false"),
            urlencoding::encode(Self::FIELDS),
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        let response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        match response {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .context("Failed to parse file list response"),
            Err(ureq::Error::StatusCode(401)) => Err(DriveAuthError.into()),
            Err(e) => Err(anyhow::anyhow!("Failed to list Drive files: {}", e)),
        }
    }
}

/// Fetch every page and concatenate them in page order.
///
/// Any page failure fails the whole listing; nothing is retried. Pages that
/// Drive marks as an incomplete search are kept and logged.
pub fn list_files_all(source: &dyn FilePageSource) -> Result<Vec<RemoteFileRecord>> {
    let mut all_files = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;
    let mut incomplete_pages = 0usize;

    loop {
        let page = source.list_page(page_token.as_deref())?;
        pages += 1;
        if page.incomplete_search == Some(true) {
            incomplete_pages += 1;
        }

        if let Some(files) = page.files {
            all_files.extend(files);
        }

        match page.next_page_token {
            Some(token) if Some(&token) != page_token.as_ref() => page_token = Some(token),
            _ => break,
        }
    }

    if incomplete_pages > 0 {
        warn!(
            "Drive searched only part of the corpus on {} of {} pages; some files may be missing",
            incomplete_pages, pages
        );
    }
    debug!("Listed {} Drive files over {} pages", all_files.len(), pages);
    Ok(all_files)
}
