//! Privileged backend: owns the browser session, the filesystem and the
//! Drive credential, and answers requests arriving over the channel.
//!
//! The dispatch loop ends when the UI drops its side of the channel (the
//! window closed). Outstanding work is drained, then the browser session is
//! closed exactly once.

mod desktop;
mod handler;

pub use desktop::{Desktop, SystemDesktop};

use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::channel::{BackendEndpoint, CorrelationId, Envelope, ReplyEnvelope};
use crate::drive::{FilePageSource, SharedTokenStore};
use crate::preview::{BrowserSession, RenderOptions};

/// Default cap on simultaneous browsing contexts
const DEFAULT_PREVIEW_CONTEXTS: usize = 4;

/// Drive services available once client credentials are configured
#[derive(Clone)]
pub struct DriveAccess {
    pub tokens: SharedTokenStore,
    pub files: Arc<dyn FilePageSource>,
}

pub struct Backend {
    files_root: PathBuf,
    session: Arc<BrowserSession>,
    render: RenderOptions,
    preview_slots: Arc<Semaphore>,
    drive: Option<DriveAccess>,
    desktop: Arc<dyn Desktop>,
}

impl Backend {
    pub fn new(files_root: impl Into<PathBuf>, session: Arc<BrowserSession>) -> Self {
        Self {
            files_root: files_root.into(),
            session,
            render: RenderOptions::default(),
            preview_slots: Arc::new(Semaphore::new(DEFAULT_PREVIEW_CONTEXTS)),
            drive: None,
            desktop: Arc::new(SystemDesktop),
        }
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Cap simultaneous renders (at least one)
    pub fn with_max_preview_contexts(mut self, max: usize) -> Self {
        self.preview_slots = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn with_drive(mut self, tokens: SharedTokenStore, files: Arc<dyn FilePageSource>) -> Self {
        self.drive = Some(DriveAccess { tokens, files });
        self
    }

    pub fn with_desktop(mut self, desktop: Arc<dyn Desktop>) -> Self {
        self.desktop = desktop;
        self
    }

    /// Serve requests until the UI side hangs up, then close the browser.
    pub async fn run(self, endpoint: BackendEndpoint) {
        let BackendEndpoint { mut inbox, outbox } = endpoint;
        let this = Arc::new(self);
        let mut tasks = JoinSet::new();
        info!("Backend serving {}", this.files_root.display());

        loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Backend task failed: {}", e);
                    }
                }
                envelope = inbox.recv() => {
                    let Some(envelope) = envelope else {
                        break;
                    };
                    match envelope {
                        Envelope::Fire(request) => {
                            let this = Arc::clone(&this);
                            tasks.spawn(async move {
                                this.handle_guarded(CorrelationId::new(), request).await;
                            });
                        }
                        Envelope::Correlated { id, request } => {
                            let this = Arc::clone(&this);
                            let outbox = outbox.clone();
                            tasks.spawn(async move {
                                let reply = this.handle_guarded(id, request).await;
                                let envelope = ReplyEnvelope { correlation_id: id, reply };
                                if outbox.send(envelope).await.is_err() {
                                    debug!("UI went away before reply [{}]", id);
                                }
                            });
                        }
                        Envelope::Sync { request, reply } => {
                            let inline = request.runs_inline();
                            let this = Arc::clone(&this);
                            let answer = async move {
                                let answer = this.handle_guarded(CorrelationId::new(), request).await;
                                if reply.send(answer).is_err() {
                                    debug!("Sync caller went away");
                                }
                            };
                            if inline {
                                // Answered before the next envelope is read
                                answer.await;
                            } else {
                                tasks.spawn(answer);
                            }
                        }
                    }
                }
            }
        }

        info!("Window closed; finishing {} outstanding requests", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Backend task failed during shutdown: {}", e);
            }
        }

        if let Err(e) = this.session.close().await {
            warn!("Failed to close browser session: {:#}", e);
        }
    }
}
