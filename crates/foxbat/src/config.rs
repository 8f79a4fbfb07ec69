//! Shell settings and Google client credentials
//!
//! Settings come from ~/.config/foxbat/shell.json when present, with
//! defaults for anything missing. Google OAuth credentials are loaded from
//! (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)
//!
//! Sign-in receives the authorization code on a localhost port, so a client
//! file whose redirect URIs exclude localhost is rejected up front.

use anyhow::{Context, Result, bail};
use log::warn;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::preview::{LaunchOptions, RenderOptions};

/// Settings filename in the Foxbat config directory
const SETTINGS_FILE: &str = "shell.json";

/// Credentials filename in the Foxbat config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Environment override for the browsed directory
const FILES_ROOT_ENV: &str = "FOXBAT_FILES_ROOT";

/// Tunables for the shell
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Directory whose files are listed and previewed
    pub files_root: PathBuf,
    /// How long the UI waits for a preview before showing the placeholder
    pub preview_deadline_secs: u64,
    /// Upper bound for one render (navigation plus capture)
    pub render_timeout_secs: u64,
    /// Maximum simultaneous browsing contexts
    pub max_preview_contexts: usize,
    pub chrome_executable: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            files_root: default_files_root(),
            preview_deadline_secs: 80,
            render_timeout_secs: 30,
            max_preview_contexts: 4,
            chrome_executable: None,
            viewport_width: 800,
            viewport_height: 600,
        }
    }
}

fn default_files_root() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl ShellConfig {
    /// Load settings from the config directory, then apply env overrides
    pub fn load() -> Result<Self> {
        let mut settings: Self = config::load_json_or_default(SETTINGS_FILE)?;
        if let Ok(root) = std::env::var(FILES_ROOT_ENV) {
            settings.files_root = PathBuf::from(root);
        }
        Ok(settings)
    }

    pub fn preview_deadline(&self) -> Duration {
        Duration::from_secs(self.preview_deadline_secs)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            timeout: Duration::from_secs(self.render_timeout_secs),
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            executable: self.chrome_executable.clone(),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
        }
    }
}

/// OAuth client credentials for the Drive API
#[derive(Debug, Clone)]
pub struct DriveCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console credential file format (installed app)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<InstalledCredentials>,
    web: Option<InstalledCredentials>,
}

#[derive(Deserialize)]
struct InstalledCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

fn is_loopback(uri: &str) -> bool {
    Url::parse(uri)
        .ok()
        .and_then(|url| url.host_str().map(|h| h == "localhost" || h == "127.0.0.1"))
        .unwrap_or(false)
}

impl DriveCredentials {
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // Desktop apps get "installed", web clients get "web"
        let client = match (creds.installed, creds.web) {
            (Some(installed), _) => installed,
            (None, Some(web)) => {
                warn!("Using a web OAuth client; sign-in expects a desktop client");
                web
            }
            (None, None) => bail!("Credentials file missing 'installed' or 'web' section"),
        };

        if client.client_id.trim().is_empty() {
            bail!("Credentials file has an empty client_id");
        }
        let loopback = client.redirect_uris.iter().any(|uri| is_loopback(uri));
        if !client.redirect_uris.is_empty() && !loopback {
            bail!(
                "No redirect URI points at localhost ({}); Drive sign-in cannot receive its code",
                client.redirect_uris.join(", ")
            );
        }

        Ok(Self {
            client_id: client.client_id,
            client_secret: client.client_secret,
        })
    }

    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// ~/.config/foxbat/google-credentials.json
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}
