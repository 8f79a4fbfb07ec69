//! Request handlers
//!
//! Every handler returns a well-formed [`Reply`]. Errors are logged here and
//! turned into the failure shape the UI expects, so a pending request is
//! never left hanging because a handler failed.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, MutexGuard};

use super::{Backend, DriveAccess};
use crate::channel::{CorrelationId, Reply, Request};
use crate::drive::{AuthState, SharedTokenStore, TokenStore, list_files_all};
use crate::fs::{delete_file, list_files_or_empty, rename_file};
use crate::models::{MutationOutcome, PreviewResult};
use crate::preview::{PreviewError, render_preview};

fn lock_tokens(tokens: &SharedTokenStore) -> MutexGuard<'_, TokenStore> {
    tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Run blocking work (std::fs, ureq, the OAuth listener) off the async threads
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Blocking task panicked")?
}

impl Backend {
    /// Handle a request in its own task so a panic becomes a failure reply
    pub(super) async fn handle_guarded(self: Arc<Self>, id: CorrelationId, request: Request) -> Reply {
        let channel = request.channel();
        debug!("{} [{}]", channel, id);
        match tokio::spawn(self.handle(id, request)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{} [{}] handler failed: {}", channel, id, e);
                Reply::Failure(format!("{} handler failed", channel))
            }
        }
    }

    async fn handle(self: Arc<Self>, id: CorrelationId, request: Request) -> Reply {
        match request {
            Request::GetSystemFiles => self.system_files().await,
            Request::GetPreview { path } => self.preview(id, &path).await,
            Request::OpenSysFile { path } => {
                if let Err(e) = self.desktop.open(&path) {
                    warn!("{:#}", e);
                }
                Reply::Ack
            }
            Request::ShowSysFile { path } => {
                if let Err(e) = self.desktop.reveal(&path) {
                    warn!("{:#}", e);
                }
                Reply::Ack
            }
            Request::DeleteSysFile { path } => {
                let success = match delete_file(&path).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{}", e);
                        false
                    }
                };
                Reply::Deleted(MutationOutcome {
                    correlation_id: id,
                    success,
                    new_path: None,
                })
            }
            Request::RenameSysFile { path, new_name } => {
                Reply::Renamed(rename_file(&path, &new_name))
            }
            Request::CheckGoogleLogin => Reply::LoginStatus(self.check_google_login().await),
            Request::GoogleDriveLogin => Reply::LoginStatus(self.drive_login().await),
            Request::FetchDriveFiles => self.drive_files().await,
            Request::GoogleDriveLogout => {
                if let Err(e) = self.drive_logout().await {
                    warn!("Logout failed: {:#}", e);
                }
                Reply::LoginStatus(false)
            }
        }
    }

    async fn system_files(&self) -> Reply {
        let root: PathBuf = self.files_root.clone();
        let files = blocking(move || Ok(list_files_or_empty(&root)))
            .await
            .unwrap_or_else(|e| {
                warn!("{:#}", e);
                Vec::new()
            });
        Reply::SystemFiles(files)
    }

    async fn preview(&self, id: CorrelationId, path: &Path) -> Reply {
        let image = match self.render_bounded(path).await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("Preview of {} failed: {}", path.display(), e);
                None
            }
        };
        Reply::Preview(PreviewResult {
            correlation_id: id,
            image,
        })
    }

    /// Render under the context limit
    async fn render_bounded(&self, path: &Path) -> Result<String, PreviewError> {
        let _permit = self
            .preview_slots
            .acquire()
            .await
            .map_err(|_| PreviewError::SessionClosed)?;
        render_preview(path, &self.session, &self.render).await
    }

    /// Credential check first, then refresh if expired
    async fn check_google_login(&self) -> bool {
        let Some(drive) = &self.drive else {
            return false;
        };
        let tokens = Arc::clone(&drive.tokens);
        let result = blocking(move || {
            let mut store = lock_tokens(&tokens);
            if !store.check_login() {
                return Ok(false);
            }
            store.check_and_generate_token().map(AuthState::has_token)
        })
        .await;

        result.unwrap_or_else(|e| {
            warn!("Drive login check failed: {:#}", e);
            false
        })
    }

    async fn drive_login(&self) -> bool {
        let Some(drive) = &self.drive else {
            warn!("Drive login requested but no Google credentials are configured");
            return false;
        };
        match self.run_login(drive).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Drive login failed: {:#}", e);
                false
            }
        }
    }

    /// The store is locked only to start and to finish the flow, never
    /// while the consent page is open
    async fn run_login(&self, drive: &DriveAccess) -> Result<()> {
        let tokens = Arc::clone(&drive.tokens);
        let pending = blocking(move || lock_tokens(&tokens).begin_login()).await?;

        if let Err(e) = self.desktop.open_url(pending.auth_url()) {
            warn!("{:#}. Visit manually: {}", e, pending.auth_url());
        }
        let code = pending.wait_for_code().await;

        let tokens = Arc::clone(&drive.tokens);
        blocking(move || lock_tokens(&tokens).finish_login(code)).await
    }

    async fn drive_files(&self) -> Reply {
        let Some(drive) = self.drive.clone() else {
            return Reply::Failure("Google Drive is not configured".to_string());
        };
        let result = blocking(move || {
            let state = lock_tokens(&drive.tokens).check_and_generate_token()?;
            if !state.has_token() {
                bail!("Not logged in to Google Drive");
            }
            list_files_all(drive.files.as_ref())
        })
        .await;

        match result {
            Ok(files) => Reply::DriveFiles(files),
            Err(e) => {
                warn!("Fetching Drive files failed: {:#}", e);
                Reply::Failure(format!("{:#}", e))
            }
        }
    }

    async fn drive_logout(&self) -> Result<()> {
        let Some(drive) = &self.drive else {
            return Ok(());
        };
        let tokens = Arc::clone(&drive.tokens);
        blocking(move || lock_tokens(&tokens).logout()).await
    }
}
