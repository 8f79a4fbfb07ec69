//! Typed calls over the channel for the view layer

use anyhow::{Result, anyhow, bail};
use log::warn;
use std::path::Path;

use crate::channel::{ChannelClient, PendingReply, Reply, Request};
use crate::models::{FileRecord, RemoteFileRecord, RenameOutcome};

/// One per window; cheap to clone
#[derive(Clone)]
pub struct SystemService {
    client: ChannelClient,
}

impl SystemService {
    pub fn new(client: ChannelClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ChannelClient {
        &self.client
    }

    /// The whole listing of the target directory; replaces any previous batch
    pub async fn fetch_system_files(&self) -> Result<Vec<FileRecord>> {
        match self.client.request(Request::GetSystemFiles).await?.wait().await? {
            Reply::SystemFiles(files) => Ok(files),
            other => Err(unexpected("get-system-files", other)),
        }
    }

    /// Start a preview request; the caller decides how long to wait
    pub async fn request_preview(&self, path: &Path) -> Result<PendingReply> {
        let request = Request::GetPreview {
            path: path.to_path_buf(),
        };
        Ok(self.client.request(request).await?)
    }

    pub async fn open_file(&self, path: &Path) -> Result<()> {
        self.client
            .send(Request::OpenSysFile {
                path: path.to_path_buf(),
            })
            .await?;
        Ok(())
    }

    pub async fn show_in_folder(&self, path: &Path) -> Result<()> {
        self.client
            .send(Request::ShowSysFile {
                path: path.to_path_buf(),
            })
            .await?;
        Ok(())
    }

    /// Whether the file was deleted
    pub async fn delete(&self, path: &Path) -> Result<bool> {
        let request = Request::DeleteSysFile {
            path: path.to_path_buf(),
        };
        match self.client.request(request).await?.wait().await? {
            Reply::Deleted(outcome) => Ok(outcome.success),
            other => Err(unexpected("deleteSysFile", other)),
        }
    }

    pub async fn rename(&self, path: &Path, new_name: &str) -> Result<RenameOutcome> {
        let request = Request::RenameSysFile {
            path: path.to_path_buf(),
            new_name: new_name.to_string(),
        };
        match self.client.request_sync(request).await? {
            Reply::Renamed(outcome) => Ok(outcome),
            other => Err(unexpected("renameSysFile", other)),
        }
    }

    /// Any failure reads as logged out
    pub async fn check_google_login(&self) -> bool {
        match self.client.request_sync(Request::CheckGoogleLogin).await {
            Ok(Reply::LoginStatus(logged_in)) => logged_in,
            Ok(other) => {
                warn!("{}", unexpected("check-google-login", other));
                false
            }
            Err(e) => {
                warn!("Login check failed: {}", e);
                false
            }
        }
    }

    pub async fn drive_login(&self) -> Result<bool> {
        match self.client.request(Request::GoogleDriveLogin).await?.wait().await? {
            Reply::LoginStatus(logged_in) => Ok(logged_in),
            other => Err(unexpected("google-drive-login", other)),
        }
    }

    pub async fn fetch_drive_files(&self) -> Result<Vec<RemoteFileRecord>> {
        match self.client.request(Request::FetchDriveFiles).await?.wait().await? {
            Reply::DriveFiles(files) => Ok(files),
            Reply::Failure(message) => bail!("Fetching Drive files failed: {}", message),
            other => Err(unexpected("fetch-drive-files", other)),
        }
    }

    pub async fn drive_logout(&self) -> Result<()> {
        self.client
            .request(Request::GoogleDriveLogout)
            .await?
            .wait()
            .await?;
        Ok(())
    }
}

fn unexpected(channel: &str, reply: Reply) -> anyhow::Error {
    match reply {
        Reply::Failure(message) => anyhow!("{} failed: {}", channel, message),
        other => anyhow!("Unexpected reply on {}: {:?}", channel, other),
    }
}
