//! Import fetched to-dos as mail messages: stage locally, then move to the
//! remote account's task folder.

use std::sync::Arc;

use thiserror::Error;

use super::notify::Notifier;
use super::todos::{self, FetchParams, TaskSource};
use crate::core::task::Task;
use crate::mail::template::{task_message_file, task_subject};
use crate::mail::{FolderRef, MailFolder, MailHost};
use crate::store::{self, StateStore, StoreError};

/// Errors that abort a whole export run.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No email accounts found.")]
    NoAccounts,
    #[error("No identities found for the selected account.")]
    NoIdentity,
    #[error("Local folders account not found.")]
    NoLocalAccount,
    #[error("Failed to create or retrieve {scope} '{name}' folder: {reason}")]
    Folder {
        scope: &'static str,
        name: String,
        reason: String,
    },
    #[error("mail host error: {0}")]
    Host(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ExportError {
    /// Text shown to the user for an aborted run.
    pub fn notice(&self) -> String {
        match self {
            Self::Host(_) | Self::Store(_) => format!("An error occurred: {}", self),
            _ => self.to_string(),
        }
    }
}

/// Per-run counts, returned to callers of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub fetched: usize,
    pub imported: usize,
    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Cursor after the run; `None` when the run ended before advancing it.
    pub next_skip: Option<u64>,
}

/// Find a folder by exact name among the immediate children of `parent`, or create it.
pub async fn find_or_create_folder<H: MailHost>(
    host: &H,
    parent: &FolderRef,
    name: &str,
    notifier: &Notifier,
) -> Result<MailFolder, String> {
    let existing = host.sub_folders(parent).await?;
    if let Some(folder) = existing.into_iter().find(|f| f.name == name) {
        log::debug!("Folder \"{}\" already exists.", name);
        return Ok(folder);
    }
    let folder = host.create_folder(parent, name).await?;
    log::info!("Created folder: {}", folder.name);
    notifier.info(format!("Created folder: {}", folder.name));
    Ok(folder)
}

pub struct Exporter<H, S, T> {
    host: Arc<H>,
    store: Arc<S>,
    source: Arc<T>,
    notifier: Notifier,
    folder_name: String,
}

impl<H, S, T> Exporter<H, S, T>
where
    H: MailHost,
    S: StateStore,
    T: TaskSource,
{
    pub fn new(
        host: Arc<H>,
        store: Arc<S>,
        source: Arc<T>,
        notifier: Notifier,
        folder_name: impl Into<String>,
    ) -> Self {
        Self {
            host,
            store,
            source,
            notifier,
            folder_name: folder_name.into(),
        }
    }

    /// One full export run. Pagination settings are read once at the start; the
    /// cursor only advances when every task has been processed.
    pub async fn create_and_move_tasks(&self) -> Result<ExportReport, ExportError> {
        let result = match store::load_fetch_params(self.store.as_ref()) {
            Ok(params) => self.run(params).await,
            Err(e) => Err(ExportError::from(e)),
        };
        if let Err(e) = &result {
            log::error!("Export aborted: {}", e);
            self.notifier.error(e.notice());
        }
        result
    }

    async fn run(&self, params: FetchParams) -> Result<ExportReport, ExportError> {
        let host = self.host.as_ref();
        let accounts = host.list_accounts().await.map_err(ExportError::Host)?;

        let account = accounts.first().ok_or(ExportError::NoAccounts)?;
        let from = account
            .identities
            .first()
            .map(|i| i.email.clone())
            .ok_or(ExportError::NoIdentity)?;
        let to = from.clone();

        let local = accounts
            .iter()
            .find(|a| a.is_local())
            .ok_or(ExportError::NoLocalAccount)?;

        let staging = find_or_create_folder(host, &local.root_folder, &self.folder_name, &self.notifier)
            .await
            .map_err(|reason| ExportError::Folder {
                scope: "Local",
                name: self.folder_name.clone(),
                reason,
            })?;
        let target = find_or_create_folder(host, &account.root_folder, &self.folder_name, &self.notifier)
            .await
            .map_err(|reason| ExportError::Folder {
                scope: "remote",
                name: self.folder_name.clone(),
                reason,
            })?;
        log::debug!(
            "Staging folder {:?}, target folder {:?}",
            staging.folder,
            target.folder
        );

        let tasks = todos::fetch_todos(self.source.as_ref(), params, &self.notifier).await;
        let mut report = ExportReport {
            fetched: tasks.len(),
            ..ExportReport::default()
        };
        if tasks.is_empty() {
            return Ok(report);
        }

        for task in &tasks {
            self.export_task(task, &from, &to, &staging.folder, &target.folder, &mut report)
                .await?;
        }

        log::info!("All tasks have been processed.");
        self.notifier
            .success("All tasks have been successfully imported and moved.");

        report.next_skip = Some(store::advance_cursor(self.store.as_ref(), params)?);
        Ok(report)
    }

    async fn export_task(
        &self,
        task: &Task,
        from: &str,
        to: &str,
        staging: &FolderRef,
        target: &FolderRef,
        report: &mut ExportReport,
    ) -> Result<(), ExportError> {
        let host = self.host.as_ref();
        // Subject text is the only duplicate key, so two tasks with the same text
        // and status collapse into one message.
        let subject = task_subject(task);

        let existing = host
            .query_subject(target, &subject)
            .await
            .map_err(ExportError::Host)?;
        if !existing.is_empty() {
            log::info!("Message with subject \"{}\" already exists. Skipping.", subject);
            self.notifier.info(format!("Skipped existing task: {}", subject));
            report.skipped += 1;
            return Ok(());
        }

        let file = task_message_file(task, from, to);
        let imported = host
            .import_message(&file, staging, true)
            .await
            .map_err(ExportError::Host)?;
        let Some(header) = imported else {
            log::error!("Failed to import message for task ID {}", task.id);
            self.notifier.error(format!("Failed to import task: {}", subject));
            report.failed += 1;
            return Ok(());
        };
        log::info!("Imported message into staging folder: {}", header.subject);
        self.notifier.success(format!("Imported task: {}", header.subject));
        report.imported += 1;

        match host.move_messages(std::slice::from_ref(&header.id), target).await {
            Ok(()) => {
                log::info!("Moved message to target folder: {}", header.subject);
                self.notifier.success(format!(
                    "Moved task to \"{}\" folder: {}",
                    self.folder_name, header.subject
                ));
                report.moved += 1;
            }
            Err(e) => {
                log::error!("Failed to move message {}: {}", header.subject, e);
                self.notifier.error(format!(
                    "Failed to move task to \"{}\" folder: {}",
                    self.folder_name, header.subject
                ));
                report.failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::MemoryMailHost;
    use crate::mail::{IMAP_ACCOUNT_TYPE, LOCAL_ACCOUNT_TYPE, MailHost};
    use crate::store::MemoryStore;
    use crate::sync::notify::{self, NoticeKind, NotificationReceiver};
    use crate::sync::todos::testing::ScriptedSource;

    fn tasks() -> Vec<Task> {
        let mut done = Task::new(2u64, "Walk the dog");
        done.completed = Some(true);
        vec![Task::new(1u64, "Buy milk"), done, Task::new(3u64, "Pay rent")]
    }

    struct Fixture {
        host: Arc<MemoryMailHost>,
        store: Arc<MemoryStore>,
        exporter: Exporter<MemoryMailHost, MemoryStore, ScriptedSource>,
        rx: NotificationReceiver,
    }

    fn fixture(host: MemoryMailHost, source: ScriptedSource) -> Fixture {
        let host = Arc::new(host);
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::new();
        let rx = notifier.subscribe();
        let exporter = Exporter::new(
            host.clone(),
            store.clone(),
            Arc::new(source),
            notifier,
            "Tasks",
        );
        Fixture {
            host,
            store,
            exporter,
            rx,
        }
    }

    fn remote_tasks_folder() -> FolderRef {
        FolderRef {
            account_id: "imap1".into(),
            path: "Tasks".into(),
        }
    }

    #[tokio::test]
    async fn full_run_moves_everything_and_advances_cursor() {
        let mut f = fixture(MemoryMailHost::standard(), ScriptedSource::with_tasks(tasks()));

        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.moved, 3);
        assert_eq!(report.next_skip, Some(3));
        assert_eq!(store::load_fetch_params(f.store.as_ref()).unwrap().skip, 3);

        assert_eq!(
            f.host.subjects_in("imap1"),
            vec!["[DONE] Walk the dog", "[TODO] Buy milk", "[TODO] Pay rent"]
        );
        assert!(f.host.subjects_in("local").is_empty());
        assert_eq!(f.host.folder_count("Tasks"), 2);

        let last = notify::drain(&mut f.rx).pop().unwrap();
        assert_eq!(last.kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn existing_subject_is_skipped() {
        let host = MemoryMailHost::standard();
        host.create_folder(&FolderRef::root("imap1"), "Tasks").await.unwrap();
        host.seed_message(&remote_tasks_folder(), "[TODO] Buy milk");
        let mut f = fixture(
            host,
            ScriptedSource::with_tasks(vec![Task::new(10u64, "Buy milk")]),
        );

        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.imported, 0);
        assert_eq!(f.host.subjects_in("imap1"), vec!["[TODO] Buy milk"]);
        // The existing folder was reused, only the local one was created.
        assert_eq!(f.host.folder_count("Tasks"), 2);

        let texts: Vec<String> = notify::drain(&mut f.rx).into_iter().map(|n| n.text).collect();
        assert!(texts.contains(&"Skipped existing task: [TODO] Buy milk".to_string()));
    }

    #[tokio::test]
    async fn same_text_different_ids_collapse() {
        let f = fixture(
            MemoryMailHost::standard(),
            ScriptedSource::with_tasks(vec![Task::new(1u64, "Buy milk"), Task::new(2u64, "Buy milk")]),
        );
        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.moved, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn untidy_task_text_is_not_exported_twice() {
        let f = fixture(
            MemoryMailHost::standard(),
            ScriptedSource::with_tasks(vec![
                Task::new(1u64, "Buy milk "),
                Task::new(2u64, "line one\nline two"),
            ]),
        );

        let first = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(first.moved, 2);

        store::set_current_skip(f.store.as_ref(), 0).unwrap();
        let second = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.imported, 0);
        assert_eq!(
            f.host.subjects_in("imap1"),
            vec!["[TODO] Buy milk", "[TODO] line one line two"]
        );
    }

    #[tokio::test]
    async fn every_notice_of_a_long_failing_run_is_delivered() {
        let batch: Vec<Task> = (1..=40u64).map(|i| Task::new(i, format!("Task {}", i))).collect();
        let mut f = fixture(
            MemoryMailHost::standard().failing_moves(),
            ScriptedSource::with_tasks(batch),
        );
        store::save_options(f.store.as_ref(), FetchParams { skip: 0, limit: 40 }).unwrap();

        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.failed, 40);

        let seen = notify::drain(&mut f.rx);
        let errors = seen.iter().filter(|n| n.kind == NoticeKind::Error).count();
        assert_eq!(errors, 40);
        assert_eq!(seen[0].text, "Created folder: Tasks");
        assert!(seen.len() > 80);
    }

    #[tokio::test]
    async fn no_accounts_aborts_without_touching_cursor() {
        let mut f = fixture(MemoryMailHost::default(), ScriptedSource::with_tasks(tasks()));
        store::set_current_skip(f.store.as_ref(), 6).unwrap();

        let err = f.exporter.create_and_move_tasks().await.unwrap_err();
        assert!(matches!(err, ExportError::NoAccounts));
        assert_eq!(store::load_fetch_params(f.store.as_ref()).unwrap().skip, 6);

        let seen = notify::drain(&mut f.rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, NoticeKind::Error);
        assert_eq!(seen[0].text, "No email accounts found.");
    }

    #[tokio::test]
    async fn missing_identity_or_local_account_is_fatal() {
        let host = MemoryMailHost::default();
        host.add_account("imap1", IMAP_ACCOUNT_TYPE, &[]);
        host.add_account("local", LOCAL_ACCOUNT_TYPE, &[]);
        let f = fixture(host, ScriptedSource::with_tasks(tasks()));
        assert!(matches!(
            f.exporter.create_and_move_tasks().await,
            Err(ExportError::NoIdentity)
        ));

        let host = MemoryMailHost::default();
        host.add_account("imap1", IMAP_ACCOUNT_TYPE, &["me@example.com"]);
        let f = fixture(host, ScriptedSource::with_tasks(tasks()));
        assert!(matches!(
            f.exporter.create_and_move_tasks().await,
            Err(ExportError::NoLocalAccount)
        ));
        assert_eq!(f.host.folder_count("Tasks"), 0);
    }

    #[tokio::test]
    async fn failed_move_leaves_message_in_staging_and_continues() {
        let host = MemoryMailHost::standard().failing_moves();
        let f = fixture(host, ScriptedSource::with_tasks(tasks()));

        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.imported, 3);
        assert_eq!(report.moved, 0);
        assert_eq!(report.failed, 3);
        assert_eq!(f.host.subjects_in("local").len(), 3);
        assert_eq!(report.next_skip, Some(3));
    }

    #[tokio::test]
    async fn import_without_message_is_skipped() {
        let host = MemoryMailHost::standard().with_empty_imports();
        let f = fixture(host, ScriptedSource::with_tasks(tasks()));
        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.failed, 3);
        assert_eq!(f.host.move_count(), 0);
    }

    #[tokio::test]
    async fn rejected_import_aborts_the_run() {
        let host = MemoryMailHost::standard().rejecting_imports();
        let f = fixture(host, ScriptedSource::with_tasks(tasks()));
        let err = f.exporter.create_and_move_tasks().await.unwrap_err();
        assert!(err.notice().starts_with("An error occurred"));
        assert_eq!(store::load_fetch_params(f.store.as_ref()).unwrap().skip, 0);
    }

    #[tokio::test]
    async fn empty_fetch_keeps_cursor() {
        let f = fixture(MemoryMailHost::standard(), ScriptedSource::with_tasks(Vec::new()));
        let report = f.exporter.create_and_move_tasks().await.unwrap();
        assert_eq!(report.fetched, 0);
        assert_eq!(report.next_skip, None);
        assert_eq!(store::load_fetch_params(f.store.as_ref()).unwrap().skip, 0);
    }
}
