//! OS shell passthroughs: open with the default app, reveal in folder, and
//! show the Google consent page in the user's browser

use anyhow::{Context, Result};
use std::path::Path;

pub trait Desktop: Send + Sync {
    /// Open a file in its default application
    fn open(&self, path: &Path) -> Result<()>;

    /// Show the file's containing folder
    fn reveal(&self, path: &Path) -> Result<()>;

    /// Open a web page in the default browser
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Delegates to the platform opener
pub struct SystemDesktop;

impl Desktop for SystemDesktop {
    fn open(&self, path: &Path) -> Result<()> {
        open::that(path).with_context(|| format!("Failed to open {}", path.display()))
    }

    fn reveal(&self, path: &Path) -> Result<()> {
        let folder = path.parent().unwrap_or(path);
        open::that(folder).with_context(|| format!("Failed to reveal {}", path.display()))
    }

    fn open_url(&self, url: &str) -> Result<()> {
        open::that(url).context("Failed to open browser")
    }
}
