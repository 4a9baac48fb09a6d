//! Single-worker actor that owns the export pipeline and URL opening.
//!
//! Every action is handled to completion before the next one is taken off the
//! queue, so two export runs never interleave no matter how many surfaces
//! trigger them.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::export::Exporter;
use super::todos::TaskSource;
use crate::mail::MailHost;
use crate::store::{self, StateStore, StoreError};

/// Requests UI surfaces send to the background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    OpenUrl(String),
    FetchTasks,
}

pub type OpenUrlFn = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Open URLs by spawning the configured browser command (e.g. `xdg-open`).
pub fn browser_opener(command: &str) -> OpenUrlFn {
    let command = command.to_string();
    Arc::new(move |url: &str| {
        std::process::Command::new(&command)
            .arg(url)
            .spawn()
            .map(|_| ())
            .map_err(|e| format!("Failed to run {}: {}", command, e))
    })
}

struct Envelope {
    action: Action,
    done: Option<oneshot::Sender<()>>,
}

/// Cheap, cloneable sender side of the worker queue.
#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl BackgroundHandle {
    /// Queue an action without waiting for it.
    pub fn send(&self, action: Action) -> Result<(), String> {
        self.tx
            .send(Envelope { action, done: None })
            .map_err(|_| "Background worker has stopped".to_string())
    }

    /// Queue an action; the returned future resolves once the worker finished it.
    pub fn request(&self, action: Action) -> impl Future<Output = Result<(), String>> + Send + 'static {
        let (done_tx, done_rx) = oneshot::channel();
        let queued = self
            .tx
            .send(Envelope {
                action,
                done: Some(done_tx),
            })
            .map_err(|_| "Background worker has stopped".to_string());
        async move {
            queued?;
            done_rx
                .await
                .map_err(|_| "Background worker dropped the request".to_string())
        }
    }
}

pub struct Background<H, S, T> {
    exporter: Exporter<H, S, T>,
    store: Arc<S>,
    open_url: OpenUrlFn,
}

impl<H, S, T> Background<H, S, T>
where
    H: MailHost + 'static,
    S: StateStore + 'static,
    T: TaskSource + 'static,
{
    pub fn new(exporter: Exporter<H, S, T>, store: Arc<S>, open_url: OpenUrlFn) -> Self {
        Self {
            exporter,
            store,
            open_url,
        }
    }

    /// Install-time setup: seed pagination defaults the first time the store is used.
    pub fn on_installed(&self) -> Result<(), StoreError> {
        if store::initialize_defaults(self.store.as_ref())? {
            log::info!("Initialized pagination defaults");
        }
        Ok(())
    }

    async fn handle(&self, action: Action) {
        match action {
            Action::OpenUrl(url) => {
                log::debug!("Opening {}", url);
                if let Err(e) = (self.open_url)(&url) {
                    log::error!("Failed to open URL: {}", e);
                }
            }
            Action::FetchTasks => {
                log::info!("Manual task fetch initiated.");
                // Aborted runs are logged and reported by the exporter itself.
                if let Ok(report) = self.exporter.create_and_move_tasks().await {
                    log::info!("Export finished: {:?}", report);
                }
            }
        }
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = rx.recv().await {
            self.handle(envelope.action).await;
            if let Some(done) = envelope.done {
                done.send(()).ok();
            }
        }
        log::debug!("Background worker stopped");
    }

    /// Start the worker on the current tokio runtime.
    pub fn spawn(self) -> BackgroundHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(rx));
        BackgroundHandle { tx }
    }
}
