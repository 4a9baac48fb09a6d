pub mod background;
pub mod export;
pub mod keyring;
pub mod notify;
pub mod todos;

use std::fmt;
use std::sync::Arc;

use crate::config::BoardConfig;
use crate::mail::Mailboxes;
use crate::mail::imap::ImapAccount;
use crate::mail::local::LocalFolders;
use crate::store::FileStore;

use background::{Background, BackgroundHandle, browser_opener};
use export::Exporter;
use notify::Notifier;
use todos::DummyJsonClient;

/// Everything the UI surfaces share: the state store, the task API client,
/// the notification relay and the queue of the background worker.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<FileStore>,
    pub source: Arc<DummyJsonClient>,
    pub notifier: Notifier,
    pub background: BackgroundHandle,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Build the live stack from config and start the background worker on the
    /// current tokio runtime. A missing or unreachable IMAP account is not
    /// fatal: the worker starts with local folders only and the export reports
    /// the missing identity.
    pub async fn start(config: &BoardConfig) -> Result<Self, String> {
        config
            .ensure_dirs()
            .map_err(|e| format!("Failed to create data directory: {}", e))?;

        let store = Arc::new(FileStore::new(config.state_path()));
        let source = Arc::new(DummyJsonClient::new(&config.api_base_url)?);
        let notifier = Notifier::new();

        let remote = match ImapAccount::from_keyring(&config.imap).await {
            Ok(remote) => remote,
            Err(e) => {
                log::warn!("IMAP account unavailable: {}", e);
                None
            }
        };
        let host = Mailboxes::new(LocalFolders::new(config.local_folders_path()), remote);

        let exporter = Exporter::new(
            Arc::new(host),
            store.clone(),
            source.clone(),
            notifier.clone(),
            config.tasks_folder.trim(),
        );
        let worker = Background::new(exporter, store.clone(), browser_opener(&config.browser_command));
        if let Err(e) = worker.on_installed() {
            log::error!("Failed to initialize defaults: {}", e);
        }

        log::info!("Services started with state at {}", store.path().display());
        Ok(Self {
            store,
            source,
            notifier,
            background: worker.spawn(),
        })
    }
}
