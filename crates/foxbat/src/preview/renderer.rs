//! Render one file to a base64 PNG

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use log::{debug, warn};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::browser::{BrowserSession, BrowsingContext};
use super::PreviewError;

/// Formats Chromium displays on its own
const NATIVE_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "ico", "avif", "html", "htm",
    "xhtml", "txt", "md", "csv", "json", "xml", "log", "mp4", "webm",
];

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Upper bound on opening the context plus navigation and capture
    pub timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

/// How a file is shown in the browsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    /// Load the file itself through a file:// URL
    Native,
    /// Anything else gets a generated card naming the file
    Card,
}

impl Viewer {
    pub fn for_path(path: &Path) -> Self {
        let native = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|ext| NATIVE_EXTENSIONS.contains(&ext.as_str()));
        if native { Viewer::Native } else { Viewer::Card }
    }
}

/// Render a preview of `path` on the shared session.
///
/// The browsing context is closed exactly once before this returns, whether
/// the render succeeded, failed or timed out.
pub async fn render_preview(
    path: &Path,
    session: &BrowserSession,
    options: &RenderOptions,
) -> Result<String, PreviewError> {
    let url = preview_url(path).await?;

    // Opening the context counts against the timeout too
    let mut opened: Option<Box<dyn BrowsingContext>> = None;
    let captured = tokio::time::timeout(options.timeout, async {
        let context = opened.insert(session.open_context().await?);
        capture(context.as_mut(), &url).await
    })
    .await;

    if let Some(context) = opened {
        match tokio::time::timeout(options.timeout, context.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close browsing context for {}: {:#}", path.display(), e),
            Err(_) => warn!("Closing browsing context for {} timed out", path.display()),
        }
    }

    let png = match captured {
        Ok(result) => result?,
        Err(_) => return Err(PreviewError::Timeout(options.timeout)),
    };
    debug!("Rendered {} ({} bytes)", path.display(), png.len());
    Ok(BASE64_STANDARD.encode(png))
}

async fn capture(context: &mut dyn BrowsingContext, url: &str) -> Result<Vec<u8>, PreviewError> {
    context.navigate(url).await.map_err(PreviewError::Browser)?;
    context.screenshot_png().await.map_err(PreviewError::Browser)
}

async fn preview_url(path: &Path) -> Result<String, PreviewError> {
    let unsupported = || PreviewError::Unsupported(path.to_path_buf());

    let meta = tokio::fs::metadata(path).await.map_err(|_| unsupported())?;
    if meta.is_dir() {
        return Err(unsupported());
    }

    match Viewer::for_path(path) {
        Viewer::Native => {
            let absolute = std::path::absolute(path).map_err(|_| unsupported())?;
            Url::from_file_path(&absolute)
                .map(String::from)
                .map_err(|_| unsupported())
        }
        Viewer::Card => Ok(card_url(path)),
    }
}

/// data: URL of a simple page showing the file's name and extension
fn card_url(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_uppercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "FILE".to_string());

    let html = format!(
        "<!doctype html><html><body style=\"margin:0;display:flex;flex-direction:column;\
         align-items:center;justify-content:center;height:100vh;font-family:sans-serif;\
         background:#f3f4f6\"><div style=\"font-size:96px;font-weight:bold;color:#4b5563\">{}</div>\
         <div style=\"font-size:28px;color:#6b7280;margin-top:16px\">{}</div></body></html>",
        escape_html(&ext),
        escape_html(&name)
    );
    format!("data:text/html;charset=utf-8,{}", urlencoding::encode(&html))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::Browser;
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[derive(Clone, Copy, PartialEq)]
    enum Behaviour {
        Succeed,
        FailNavigation,
        Hang,
        HangOnOpen,
    }

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    struct FakeBrowser {
        behaviour: Behaviour,
        counters: Arc<Counters>,
    }

    struct FakeContext {
        behaviour: Behaviour,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn new_context(&self) -> Result<Box<dyn BrowsingContext>> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            if self.behaviour == Behaviour::HangOnOpen {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(Box::new(FakeContext {
                behaviour: self.behaviour,
                counters: Arc::clone(&self.counters),
            }))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl BrowsingContext for FakeContext {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.counters.urls.lock().unwrap().push(url.to_string());
            match self.behaviour {
                Behaviour::Succeed | Behaviour::HangOnOpen => Ok(()),
                Behaviour::FailNavigation => bail!("net::ERR_FILE_NOT_FOUND"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(())
                }
            }
        }

        async fn screenshot_png(&mut self) -> Result<Vec<u8>> {
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn session(behaviour: Behaviour) -> (BrowserSession, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let browser = FakeBrowser {
            behaviour,
            counters: Arc::clone(&counters),
        };
        (BrowserSession::new(Arc::new(browser)), counters)
    }

    #[test]
    fn test_viewer_classification() {
        assert_eq!(Viewer::for_path(Path::new("/x/report.PDF")), Viewer::Native);
        assert_eq!(Viewer::for_path(Path::new("/x/photo.jpeg")), Viewer::Native);
        assert_eq!(Viewer::for_path(Path::new("/x/budget.xlsx")), Viewer::Card);
        assert_eq!(Viewer::for_path(Path::new("/x/tool.exe")), Viewer::Card);
        assert_eq!(Viewer::for_path(Path::new("/x/Makefile")), Viewer::Card);
    }

    #[tokio::test]
    async fn test_success_closes_context_once() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hello").unwrap();
        let (session, counters) = session(Behaviour::Succeed);

        let image = render_preview(&file, &session, &RenderOptions::default())
            .await
            .unwrap();

        assert_eq!(image, BASE64_STANDARD.encode([0x89, b'P', b'N', b'G']));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
        let urls = counters.urls.lock().unwrap();
        assert!(urls[0].starts_with("file://"));
        assert!(urls[0].ends_with("notes.txt"));
    }

    #[tokio::test]
    async fn test_failure_closes_context_once() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, "not really a pdf").unwrap();
        let (session, counters) = session(Behaviour::FailNavigation);

        let result = render_preview(&file, &session, &RenderOptions::default()).await;

        assert!(matches!(result, Err(PreviewError::Browser(_))));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_closes_context_once() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("slow.html");
        std::fs::write(&file, "<html></html>").unwrap();
        let (session, counters) = session(Behaviour::Hang);
        let options = RenderOptions {
            timeout: Duration::from_secs(5),
        };

        let result = render_preview(&file, &session, &options).await;

        assert!(matches!(result, Err(PreviewError::Timeout(_))));
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_context_open_times_out() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("slow.html");
        std::fs::write(&file, "<html></html>").unwrap();
        let (session, counters) = session(Behaviour::HangOnOpen);
        let options = RenderOptions {
            timeout: Duration::from_secs(5),
        };

        let result = render_preview(&file, &session, &options).await;

        assert!(matches!(result, Err(PreviewError::Timeout(_))));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 1);
        // Nothing was handed back, so there is nothing to close
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
        session.close().await.unwrap();
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_office_document_renders_card() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Quarterly <Plan>.docx");
        std::fs::write(&file, "PK").unwrap();
        let (session, counters) = session(Behaviour::Succeed);

        render_preview(&file, &session, &RenderOptions::default())
            .await
            .unwrap();

        let urls = counters.urls.lock().unwrap();
        assert!(urls[0].starts_with("data:text/html"));
        assert!(!urls[0].contains('<'));
    }

    #[tokio::test]
    async fn test_unsupported_never_opens_context() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("deleted.pdf");
        let (session, counters) = session(Behaviour::Succeed);

        let result = render_preview(&missing, &session, &RenderOptions::default()).await;
        assert!(matches!(result, Err(PreviewError::Unsupported(_))));

        let result = render_preview(dir.path(), &session, &RenderOptions::default()).await;
        assert!(matches!(result, Err(PreviewError::Unsupported(_))));

        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_closed_session_refuses_render() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, "png").unwrap();
        let (session, counters) = session(Behaviour::Succeed);

        session.close().await.unwrap();
        let result = render_preview(&file, &session, &RenderOptions::default()).await;

        assert!(matches!(result, Err(PreviewError::SessionClosed)));
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }
}
