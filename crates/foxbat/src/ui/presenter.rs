//! Preview requests with a deadline and placeholder fallback
//!
//! Each request races the backend reply against a timer. Whichever settles
//! first decides what is shown; a reply arriving after the deadline is
//! discarded because the pending entry was already dropped.

use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::AbortHandle;

use super::SystemService;
use crate::channel::Reply;
use crate::models::PreviewResult;

/// How long a file card waits for its preview
pub const DEFAULT_PREVIEW_DEADLINE: Duration = Duration::from_secs(80);

/// 1x1 grey PNG shown when no preview is available
pub const PLACEHOLDER_IMAGE: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// What a file card ends up showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    /// Base64 PNG from the backend
    Image(String),
    Placeholder,
    /// A newer request for the same file replaced this one
    Superseded,
}

impl Preview {
    /// The image to display
    pub fn image(&self) -> &str {
        match self {
            Preview::Image(image) => image,
            Preview::Placeholder | Preview::Superseded => PLACEHOLDER_IMAGE,
        }
    }
}

type Inflight = HashMap<PathBuf, (u64, AbortHandle)>;

/// Issues preview requests, one in flight per file
pub struct PreviewPresenter {
    service: SystemService,
    deadline: Duration,
    inflight: Mutex<Inflight>,
    next_ticket: AtomicU64,
}

impl PreviewPresenter {
    pub fn new(service: SystemService) -> Self {
        Self::with_deadline(service, DEFAULT_PREVIEW_DEADLINE)
    }

    pub fn with_deadline(service: SystemService, deadline: Duration) -> Self {
        Self {
            service,
            deadline,
            inflight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    fn inflight(&self) -> MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of files with a request still in flight
    pub fn inflight_count(&self) -> usize {
        self.inflight().len()
    }

    /// Request the preview for `path` and wait for the image or the deadline.
    ///
    /// A previous request for the same path still in flight is aborted and
    /// resolves to [`Preview::Superseded`].
    pub async fn present(&self, path: &Path) -> Preview {
        let service = self.service.clone();
        let target = path.to_path_buf();
        let deadline = self.deadline;
        let task = tokio::spawn(async move { fetch_with_deadline(&service, &target, deadline).await });

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .inflight()
            .insert(path.to_path_buf(), (ticket, task.abort_handle()));
        if let Some((_, previous)) = previous {
            debug!("Replacing preview request for {}", path.display());
            previous.abort();
        }

        let outcome = task.await;

        {
            let mut inflight = self.inflight();
            if inflight.get(path).is_some_and(|(t, _)| *t == ticket) {
                inflight.remove(path);
            }
        }

        match outcome {
            Ok(preview) => preview,
            Err(e) if e.is_cancelled() => Preview::Superseded,
            Err(e) => {
                warn!("Preview task for {} failed: {}", path.display(), e);
                Preview::Placeholder
            }
        }
    }
}

impl Drop for PreviewPresenter {
    /// Closing the view abandons every outstanding request
    fn drop(&mut self) {
        for (_, (_, handle)) in self.inflight().drain() {
            handle.abort();
        }
    }
}

async fn fetch_with_deadline(service: &SystemService, path: &Path, deadline: Duration) -> Preview {
    let pending = match service.request_preview(path).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!("Could not request preview for {}: {:#}", path.display(), e);
            return Preview::Placeholder;
        }
    };

    match pending.wait_timeout(deadline).await {
        Ok(Some(Reply::Preview(PreviewResult {
            image: Some(image), ..
        }))) => Preview::Image(image),
        Ok(Some(_)) => Preview::Placeholder,
        Ok(None) => {
            debug!("Preview deadline passed for {}", path.display());
            Preview::Placeholder
        }
        Err(e) => {
            warn!("Preview for {} failed: {}", path.display(), e);
            Preview::Placeholder
        }
    }
}
