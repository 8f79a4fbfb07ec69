//! Browser automation seam and the shared browser session
//!
//! [`Browser`] and [`BrowsingContext`] abstract the automation backend so the
//! renderer can be exercised with a fake. [`ChromeBrowser`] is the real
//! implementation on top of chromiumoxide.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{BrowserConfig, Page};
use futures::StreamExt;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::PreviewError;

/// A running browser that can hand out isolated browsing contexts
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn BrowsingContext>>;

    /// Shut the browser down. Called once by [`BrowserSession::close`].
    async fn close(&self) -> Result<()>;
}

/// One isolated automation session used to render a single file
#[async_trait]
pub trait BrowsingContext: Send {
    /// Navigate and wait until the page reports it has loaded
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// PNG capture of the viewport
    async fn screenshot_png(&mut self) -> Result<Vec<u8>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// The backend's single browser handle
///
/// Created once at startup, shared by every render, and closed exactly once
/// when the window goes away. A closed session refuses new contexts.
pub struct BrowserSession {
    browser: Arc<dyn Browser>,
    closed: AtomicBool,
}

impl BrowserSession {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self {
            browser,
            closed: AtomicBool::new(false),
        }
    }

    pub async fn open_context(&self) -> Result<Box<dyn BrowsingContext>, PreviewError> {
        if self.is_closed() {
            return Err(PreviewError::SessionClosed);
        }
        self.browser.new_context().await.map_err(PreviewError::Browser)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the browser. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing browser session");
        self.browser.close().await
    }
}

/// How to start Chromium
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Explicit Chrome/Chromium binary; auto-detected when `None`
    pub executable: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            executable: None,
            viewport_width: 800,
            viewport_height: 600,
        }
    }
}

/// Headless Chromium driven over the DevTools protocol
///
/// Opening pages only needs shared access, so concurrent renders never queue
/// behind one another here. Shutdown takes the write side.
pub struct ChromeBrowser {
    browser: RwLock<chromiumoxide::Browser>,
    handler: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChromeBrowser {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let mut builder =
            BrowserConfig::builder().window_size(options.viewport_width, options.viewport_height);
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(anyhow::Error::msg)?;

        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .context("Failed to launch Chromium")?;

        // The DevTools connection only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        info!("Chromium launched");
        Ok(Self {
            browser: RwLock::new(browser),
            handler: std::sync::Mutex::new(Some(handler)),
        })
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn new_context(&self) -> Result<Box<dyn BrowsingContext>> {
        let page = self
            .browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .context("Failed to open a browser page")?;
        Ok(Box::new(ChromeContext { page }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("Browser did not close cleanly: {}", e);
        }
        browser.wait().await.context("Failed waiting for Chromium to exit")?;

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handler) = handler {
            handler.abort();
        }
        Ok(())
    }
}

struct ChromeContext {
    page: Page,
}

#[async_trait]
impl BrowsingContext for ChromeContext {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.page
            .wait_for_navigation()
            .await
            .context("Page never finished loading")?;
        Ok(())
    }

    async fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        self.page
            .screenshot(params)
            .await
            .context("Failed to capture screenshot")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("Failed to close page")
    }
}
