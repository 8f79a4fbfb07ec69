//! Preview generation on a shared headless browser
//!
//! The backend owns one [`BrowserSession`]; every render borrows it, opens
//! its own browsing context, captures the viewport and closes the context
//! again.

mod browser;
mod renderer;

pub use browser::{Browser, BrowserSession, BrowsingContext, ChromeBrowser, LaunchOptions};
pub use renderer::{RenderOptions, Viewer, render_preview};

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("No preview available for {}", .0.display())]
    Unsupported(PathBuf),
    #[error("Render did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Browser session is closed")]
    SessionClosed,
    #[error("Browser automation failed: {0:#}")]
    Browser(anyhow::Error),
}
