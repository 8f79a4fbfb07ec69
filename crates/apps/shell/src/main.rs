//! Foxbat - A desktop file browser with rendered previews
//!
//! Starts the backend (browser session, filesystem, Drive) and drives one
//! window's worth of UI logic against it, logging what a view would draw.

use anyhow::{Context, Result};
use clap::Parser;
use foxbat::{
    Backend, BrowserSession, ChromeBrowser, DriveClient, DriveCredentials, FileCard,
    PreviewPresenter, ShellConfig, SystemService, TokenStore, pair,
};
use futures::future::join_all;
use log::{error, info, warn};
use std::sync::Arc;

/// Requests buffered between the window and the backend
const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Parser)]
#[command(name = "foxbat", about = "Browse local files with rendered previews")]
struct Args {
    /// Run the Google consent flow when not already signed in
    #[arg(long)]
    drive_login: bool,

    /// Forget the cached Google Drive credential and exit
    #[arg(long, conflicts_with = "drive_login")]
    drive_logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = ShellConfig::load().unwrap_or_else(|e| {
        warn!("Using default settings: {:#}", e);
        ShellConfig::default()
    });

    let browser = ChromeBrowser::launch(&settings.launch_options())
        .await
        .context("Preview rendering needs Chrome or Chromium")?;
    let session = Arc::new(BrowserSession::new(Arc::new(browser)));

    let mut backend = Backend::new(&settings.files_root, session)
        .with_render_options(settings.render_options())
        .with_max_preview_contexts(settings.max_preview_contexts);

    match DriveCredentials::load().and_then(TokenStore::new) {
        Ok(tokens) => {
            let tokens = tokens.shared();
            let files = DriveClient::new(Arc::clone(&tokens));
            backend = backend.with_drive(tokens, Arc::new(files));
            info!("Google Drive client initialized");
        }
        Err(e) => {
            warn!("Google Drive credentials not found: {}", e);
            if let Some(path) = DriveCredentials::default_credentials_path() {
                warn!(
                    "To configure Google Drive access, either:\n\
                     1. Place your Google OAuth credentials at: {}\n\
                     2. Or set environment variables: GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET",
                    path.display()
                );
            }
        }
    }

    let (client, endpoint) = pair(CHANNEL_CAPACITY);
    let backend = tokio::spawn(backend.run(endpoint));
    let service = SystemService::new(client);

    tokio::select! {
        result = run_window(&service, &settings, &args) => {
            if let Err(e) = result {
                error!("{:#}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    // Dropping the last client tells the backend the window is gone
    drop(service);
    backend.await.context("Backend task failed")?;
    info!("Foxbat exited");
    Ok(())
}

async fn run_window(service: &SystemService, settings: &ShellConfig, args: &Args) -> Result<()> {
    let files = service.fetch_system_files().await?;
    info!("{} files in {}", files.len(), settings.files_root.display());

    let presenter = PreviewPresenter::with_deadline(service.clone(), settings.preview_deadline());
    let mut cards: Vec<FileCard> = files.into_iter().map(FileCard::new).collect();
    let previews = join_all(
        cards
            .iter()
            .map(|card| presenter.present(card.record().path())),
    )
    .await;

    for (card, preview) in cards.iter_mut().zip(previews) {
        card.set_preview(preview);
        info!(
            "{:<40} {:>10}  preview: {} bytes",
            card.record().name,
            card.last_modified_label(),
            card.preview_image().map_or(0, str::len)
        );
    }

    if args.drive_logout {
        service.drive_logout().await?;
        info!("Signed out of Google Drive");
        return Ok(());
    }

    let mut signed_in = service.check_google_login().await;
    if !signed_in && args.drive_login {
        signed_in = service.drive_login().await?;
    }
    if !signed_in {
        info!("Not signed in to Google Drive");
        return Ok(());
    }

    let remote = service.fetch_drive_files().await?;
    info!("{} files in Google Drive", remote.len());
    for file in &remote {
        let detail = if file.is_google_native() {
            ", Google document".to_string()
        } else {
            file.size_bytes()
                .map(|size| format!(", {} bytes", size))
                .unwrap_or_default()
        };
        info!("  {} ({}){}", file.name, file.mime_type, detail);
    }
    Ok(())
}
