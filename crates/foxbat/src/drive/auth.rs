//! Google Drive OAuth2 token store
//!
//! Owns the persisted credential file and drives the authorization code
//! flow. A local HTTP listener receives the OAuth callback. Token endpoint
//! calls are synchronous (ureq); the backend runs them on the blocking pool
//! behind a mutex, so only one OAuth operation touches the file at a time.

use anyhow::{Context, Result, anyhow, bail};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

use crate::config::DriveCredentials;

/// Token store shared between the backend handlers and the Drive client
pub type SharedTokenStore = Arc<Mutex<TokenStore>>;

/// Credential file name in the Foxbat config directory
const TOKEN_FILE: &str = "google-drive-tokens.json";

/// Tokens expiring within this many seconds are treated as expired
const EXPIRY_BUFFER_SECS: i64 = 300;

/// How long the consent page may stay open before the login is abandoned
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the store is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoToken,
    /// Consent page is open; waiting for the redirect with the code
    AwaitingCode,
    Valid,
    Expired,
    Refreshed,
}

impl AuthState {
    /// Whether a usable access token is on disk
    pub fn has_token(self) -> bool {
        matches!(self, AuthState::Valid | AuthState::Refreshed)
    }
}

/// Persisted OAuth credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires
    pub expires_at: Option<i64>,
}

impl StoredCredential {
    fn from_response(token: TokenResponse, now: i64) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_in.map(|d| now + d as i64),
        }
    }

    /// Whether the access token is still good, with a five minute buffer
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at > now + EXPIRY_BUFFER_SECS)
    }

    /// Apply a refresh response, keeping our refresh token if Google omits it
    fn renewed(&self, token: TokenResponse, now: i64) -> Self {
        let refresh_token = token.refresh_token.clone().or_else(|| self.refresh_token.clone());
        Self {
            refresh_token,
            ..Self::from_response(token, now)
        }
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// The two token-endpoint grants the store needs
pub trait TokenExchange: Send {
    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse>;
    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// Google's OAuth2 token endpoint
pub struct GoogleTokenEndpoint {
    credentials: DriveCredentials,
}

impl GoogleTokenEndpoint {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    pub fn new(credentials: DriveCredentials) -> Self {
        Self { credentials }
    }
}

impl TokenExchange for GoogleTokenEndpoint {
    fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .context("Failed to exchange authorization code")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        response
            .body_mut()
            .read_json()
            .context("Failed to parse refresh token response")
    }
}

/// Owner of the persisted Drive credential
pub struct TokenStore {
    client_id: String,
    token_path: PathBuf,
    exchange: Box<dyn TokenExchange>,
    state: AuthState,
    callback_timeout: Duration,
}

impl TokenStore {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";

    /// Read-only access to file metadata and content
    const DRIVE_SCOPE: &'static str = "https://www.googleapis.com/auth/drive.readonly";

    /// Port range to try for the local OAuth callback server
    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    /// Store backed by ~/.config/foxbat/google-drive-tokens.json and Google's endpoint
    pub fn new(credentials: DriveCredentials) -> Result<Self> {
        let token_path =
            config::config_path(TOKEN_FILE).context("Could not determine config directory")?;
        let client_id = credentials.client_id.clone();
        Ok(Self::with_exchange(
            client_id,
            token_path,
            Box::new(GoogleTokenEndpoint::new(credentials)),
        ))
    }

    pub fn with_exchange(
        client_id: impl Into<String>,
        token_path: impl Into<PathBuf>,
        exchange: Box<dyn TokenExchange>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            token_path: token_path.into(),
            exchange,
            state: AuthState::NoToken,
            callback_timeout: CALLBACK_TIMEOUT,
        }
    }

    /// How long [`PendingLogin::wait_for_code`] waits for the redirect
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn shared(self) -> SharedTokenStore {
        Arc::new(Mutex::new(self))
    }

    /// State after the most recent operation
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// True iff a credential is persisted and structurally valid.
    ///
    /// Says nothing about whether the access token has expired.
    pub fn check_login(&self) -> bool {
        matches!(self.load_credential(), Ok(Some(c)) if !c.access_token.is_empty())
    }

    /// Refresh the cached token if it has expired.
    ///
    /// With no credential on disk this returns [`AuthState::NoToken`] and
    /// leaves the rest to [`TokenStore::begin_login`]. If the refresh exchange
    /// fails the expired credential stays on disk untouched.
    pub fn check_and_generate_token(&mut self) -> Result<AuthState> {
        let Some(stored) = self.load_credential()? else {
            self.state = AuthState::NoToken;
            return Ok(self.state);
        };

        let now = chrono::Utc::now().timestamp();
        if stored.is_fresh(now) {
            self.state = AuthState::Valid;
            return Ok(self.state);
        }

        self.state = AuthState::Expired;
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .context("Cached token expired and has no refresh token")?;
        let response = self.exchange.refresh(refresh_token)?;

        let renewed = stored.renewed(response, chrono::Utc::now().timestamp());
        self.save_credential(&renewed)?;
        info!("Refreshed Drive access token");
        self.state = AuthState::Refreshed;
        Ok(self.state)
    }

    /// Start the authorization code flow.
    ///
    /// Binds the loopback listener and moves to [`AuthState::AwaitingCode`].
    /// The caller shows [`PendingLogin::auth_url`], waits for the code
    /// without holding the store, then hands the result to
    /// [`TokenStore::finish_login`].
    pub fn begin_login(&mut self) -> Result<PendingLogin> {
        let (listener, port) = Self::start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);
        let auth_url = self.authorization_url(&redirect_uri);

        info!("Waiting for Google Drive consent on port {}", port);
        self.state = AuthState::AwaitingCode;
        Ok(PendingLogin {
            listener,
            redirect_uri,
            auth_url,
            timeout: self.callback_timeout,
        })
    }

    /// Exchange the code and persist the credential.
    ///
    /// A failed or abandoned consent leaves the stored credential as it was
    /// and the state falls back to whatever is on disk.
    pub fn finish_login(&mut self, code: Result<AuthorizationCode>) -> Result<()> {
        let token = code.and_then(|code| {
            info!("Exchanging authorization code for tokens");
            self.exchange.exchange_code(&code.code, &code.redirect_uri)
        });
        let token = match token {
            Ok(token) => token,
            Err(e) => {
                self.state = self.state_on_disk();
                return Err(e);
            }
        };

        let credential = StoredCredential::from_response(token, chrono::Utc::now().timestamp());
        self.save_credential(&credential)?;
        self.state = AuthState::Valid;
        info!("Google Drive login complete");
        Ok(())
    }

    /// Access token for an API call
    pub fn access_token(&self) -> Result<String> {
        match self.load_credential()? {
            Some(credential) => Ok(credential.access_token),
            None => bail!("Not logged in to Google Drive"),
        }
    }

    /// Clear the stored credential
    pub fn logout(&mut self) -> Result<()> {
        match fs::remove_file(&self.token_path) {
            Ok(()) => info!("Removed Drive credential"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to remove Drive credential"),
        }
        self.state = AuthState::NoToken;
        Ok(())
    }

    fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(Self::DRIVE_SCOPE),
        )
    }

    fn state_on_disk(&self) -> AuthState {
        match self.load_credential() {
            Ok(Some(c)) if c.is_fresh(chrono::Utc::now().timestamp()) => AuthState::Valid,
            Ok(Some(_)) => AuthState::Expired,
            _ => AuthState::NoToken,
        }
    }

    fn start_local_server() -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                return Ok((listener, port));
            }
        }
        bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    fn load_credential(&self) -> Result<Option<StoredCredential>> {
        match fs::read_to_string(&self.token_path) {
            Ok(content) => {
                let credential = serde_json::from_str(&content)
                    .context("Drive credential file is corrupt")?;
                Ok(Some(credential))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read Drive credential"),
        }
    }

    /// Write to a temp file and rename, so a failed write never clobbers
    /// the previous credential
    fn save_credential(&self, credential: &StoredCredential) -> Result<()> {
        let temp_path = self.token_path.with_extension("tmp");
        config::save_json_file(&temp_path, credential)?;
        fs::rename(&temp_path, &self.token_path).context("Failed to store Drive credential")?;
        Ok(())
    }
}

/// A consent flow waiting for Google's redirect
pub struct PendingLogin {
    listener: TcpListener,
    redirect_uri: String,
    auth_url: String,
    timeout: Duration,
}

/// Code received on the redirect, with the URI it was issued for
#[derive(Debug)]
pub struct AuthorizationCode {
    code: String,
    redirect_uri: String,
}

impl PendingLogin {
    /// Consent page to show the user
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Wait for the browser redirect. Fails if the user denies consent or
    /// the page is abandoned past the callback timeout.
    pub async fn wait_for_code(self) -> Result<AuthorizationCode> {
        let PendingLogin {
            listener,
            redirect_uri,
            timeout,
            ..
        } = self;
        let code = tokio::time::timeout(timeout, accept_callback(listener))
            .await
            .map_err(|_| anyhow!("Timed out after {:?} waiting for Google sign-in", timeout))??;
        Ok(AuthorizationCode { code, redirect_uri })
    }
}

async fn accept_callback(listener: TcpListener) -> Result<String> {
    listener
        .set_nonblocking(true)
        .context("Failed to configure callback listener")?;
    let listener = tokio::net::TcpListener::from_std(listener)
        .context("Failed to register callback listener")?;
    let (mut stream, _) = listener.accept().await.context("Failed to accept connection")?;
    let (reader, mut writer) = stream.split();

    let mut request_line = String::new();
    BufReader::new(reader)
        .read_line(&mut request_line)
        .await
        .context("Failed to read request")?;

    let code = parse_callback(&request_line);

    let (status, body) = if code.is_ok() {
        ("200 OK", "Signed in to Google Drive. You can close this window.")
    } else {
        ("400 Bad Request", "Sign-in failed. Please try again.")
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
        status, body
    );
    writer.write_all(response.as_bytes()).await.ok();

    code
}

/// Pull the authorization code out of the callback request line
/// (`GET /?code=...&scope=... HTTP/1.1`).
fn parse_callback(request_line: &str) -> Result<String> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .context("Malformed callback request")?;
    let url = Url::parse(&format!("http://localhost{}", target))
        .context("Malformed callback URL")?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => bail!("OAuth error: {}", value),
            "code" => code = Some(value.into_owned()),
            _ => {}
        }
    }
    code.context("No authorization code received")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FakeExchange {
        refresh_result: Option<TokenResponse>,
        code_result: Option<TokenResponse>,
        calls: Arc<AtomicUsize>,
    }

    impl TokenExchange for FakeExchange {
        fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(code, "4/0Abc");
            self.code_result.clone().context("exchange rejected")
        }

        fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_result.clone().context("invalid_grant")
        }
    }

    fn token(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in: Some(expires_in),
            token_type: Some("Bearer".to_string()),
        }
    }

    fn store(
        path: &Path,
        refresh_result: Option<TokenResponse>,
        code_result: Option<TokenResponse>,
    ) -> (TokenStore, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let exchange = FakeExchange {
            refresh_result,
            code_result,
            calls: Arc::clone(&calls),
        };
        (
            TokenStore::with_exchange("client-id", path, Box::new(exchange)),
            calls,
        )
    }

    fn write_credential(path: &Path, expires_at: i64) {
        let credential = StoredCredential {
            access_token: "old-access".to_string(),
            refresh_token: Some("keep-me".to_string()),
            expires_at: Some(expires_at),
        };
        fs::write(path, serde_json::to_string_pretty(&credential).unwrap()).unwrap();
    }

    fn read_credential(path: &Path) -> StoredCredential {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_check_login_without_file() {
        let dir = tempdir().unwrap();
        let (store, _) = store(&dir.path().join("tokens.json"), None, None);
        assert!(!store.check_login());
    }

    #[test]
    fn test_check_login_with_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        fs::write(&path, "{ \"access").unwrap();
        let (mut store, _) = store(&path, None, None);

        assert!(!store.check_login());
        assert!(store.check_and_generate_token().is_err());
    }

    #[test]
    fn test_check_login_ignores_expiry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, 0);
        let (store, _) = store(&path, None, None);

        assert!(store.check_login());
    }

    #[test]
    fn test_no_token_leaves_state_for_login() {
        let dir = tempdir().unwrap();
        let (mut store, calls) = store(&dir.path().join("tokens.json"), None, None);

        assert_eq!(store.check_and_generate_token().unwrap(), AuthState::NoToken);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_valid_token_is_not_refreshed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, chrono::Utc::now().timestamp() + 3600);
        let (mut store, calls) = store(&path, None, None);

        assert_eq!(store.check_and_generate_token().unwrap(), AuthState::Valid);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expired_token_is_refreshed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let old_expiry = chrono::Utc::now().timestamp() - 60;
        write_credential(&path, old_expiry);
        let (mut store, calls) = store(&path, Some(token("new-access", None, 3600)), None);

        assert_eq!(store.check_and_generate_token().unwrap(), AuthState::Refreshed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let saved = read_credential(&path);
        assert_eq!(saved.access_token, "new-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
        assert!(saved.expires_at.unwrap() > old_expiry);
        assert_eq!(store.access_token().unwrap(), "new-access");
    }

    #[test]
    fn test_token_inside_buffer_counts_as_expired() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, chrono::Utc::now().timestamp() + 60);
        let (mut store, _) = store(&path, Some(token("new-access", None, 3600)), None);

        assert_eq!(store.check_and_generate_token().unwrap(), AuthState::Refreshed);
    }

    #[test]
    fn test_failed_refresh_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, chrono::Utc::now().timestamp() - 60);
        let before = fs::read(&path).unwrap();
        let (mut store, _) = store(&path, None, None);

        assert!(store.check_and_generate_token().is_err());
        assert_eq!(store.state(), AuthState::Expired);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_logout_removes_credential() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, 0);
        let (mut store, _) = store(&path, None, None);

        store.logout().unwrap();
        assert!(!path.exists());
        assert!(!store.check_login());
        // Logging out twice is harmless
        store.logout().unwrap();
    }

    #[test]
    fn test_parse_callback_code() {
        let code = parse_callback("GET /?code=4%2F0Abc&scope=drive HTTP/1.1\r\n").unwrap();
        assert_eq!(code, "4/0Abc");
    }

    #[test]
    fn test_parse_callback_error() {
        let err = parse_callback("GET /?error=access_denied HTTP/1.1\r\n").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_parse_callback_missing_code() {
        assert!(parse_callback("GET /favicon.ico HTTP/1.1\r\n").is_err());
        assert!(parse_callback("").is_err());
    }

    /// Play the browser: follow the consent URL's redirect_uri with a code
    fn redirect_with(auth_url: &str, query: &'static str) -> Result<()> {
        let url = Url::parse(auth_url)?;
        let redirect = url
            .query_pairs()
            .find(|(k, _)| k == "redirect_uri")
            .map(|(_, v)| v.into_owned())
            .context("no redirect_uri")?;
        let port = Url::parse(&redirect)?.port().context("no port")?;

        std::thread::spawn(move || {
            let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            write!(stream, "GET /?{} HTTP/1.1\r\nHost: localhost\r\n\r\n", query).unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).ok();
        });
        Ok(())
    }

    #[tokio::test]
    async fn test_login_persists_credential() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let (mut store, _) = store(&path, None, Some(token("fresh", Some("refresh"), 3600)));

        let pending = store.begin_login().unwrap();
        assert_eq!(store.state(), AuthState::AwaitingCode);
        assert!(pending.auth_url().contains("access_type=offline"));

        redirect_with(pending.auth_url(), "code=4%2F0Abc").unwrap();
        let code = pending.wait_for_code().await;
        store.finish_login(code).unwrap();

        assert_eq!(store.state(), AuthState::Valid);
        let saved = read_credential(&path);
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_cancelled_login_keeps_existing_credential() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        write_credential(&path, chrono::Utc::now().timestamp() + 3600);
        let before = fs::read(&path).unwrap();
        let (mut store, _) = store(&path, None, None);

        let pending = store.begin_login().unwrap();
        redirect_with(pending.auth_url(), "error=access_denied").unwrap();
        let code = pending.wait_for_code().await;
        let result = store.finish_login(code);

        assert!(result.is_err());
        assert_eq!(store.state(), AuthState::Valid);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_abandoned_consent_times_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let (store, calls) = store(&path, None, None);
        let mut store = store.with_callback_timeout(Duration::from_millis(200));

        let pending = store.begin_login().unwrap();
        // Nobody follows the consent URL
        let code = pending.wait_for_code().await;
        assert!(code.as_ref().unwrap_err().to_string().contains("Timed out"));

        assert!(store.finish_login(code).is_err());
        assert_eq!(store.state(), AuthState::NoToken);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!path.exists());
    }
}
