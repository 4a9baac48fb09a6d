//! Mail host surface the exporter talks to: accounts, folders, messages.

pub mod imap;
pub mod local;
pub mod template;

use std::future::Future;

use imap::ImapAccount;
use local::LocalFolders;

/// Account type of the on-device "Local Folders" pseudo-account.
pub const LOCAL_ACCOUNT_TYPE: &str = "none";
pub const IMAP_ACCOUNT_TYPE: &str = "imap";

/// A folder address: owning account plus the host's full folder path
/// (empty for the account root).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderRef {
    pub account_id: String,
    pub path: String,
}

impl FolderRef {
    pub fn root(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            path: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailFolder {
    pub folder: FolderRef,
    /// Last path component, what a folder picker shows.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAccount {
    pub id: String,
    pub name: String,
    pub account_type: String,
    pub root_folder: FolderRef,
    pub identities: Vec<Identity>,
}

impl MailAccount {
    pub fn is_local(&self) -> bool {
        self.account_type == LOCAL_ACCOUNT_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub account_id: String,
    /// Host-specific key: file path for local folders, `folder:uid` for IMAP.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub id: MessageId,
    pub subject: String,
    pub folder: FolderRef,
}

/// A raw RFC 822 message ready for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFile {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Account, folder and message operations of a mail client.
pub trait MailHost: Send + Sync {
    fn list_accounts(&self) -> impl Future<Output = Result<Vec<MailAccount>, String>> + Send;

    /// Immediate children of `parent`.
    fn sub_folders(&self, parent: &FolderRef) -> impl Future<Output = Result<Vec<MailFolder>, String>> + Send;

    fn create_folder(
        &self,
        parent: &FolderRef,
        name: &str,
    ) -> impl Future<Output = Result<MailFolder, String>> + Send;

    /// Messages in `folder` whose subject equals `subject` exactly.
    fn query_subject(
        &self,
        folder: &FolderRef,
        subject: &str,
    ) -> impl Future<Output = Result<Vec<MessageHeader>, String>> + Send;

    /// Store a message file in `folder`. `Ok(None)` means the host accepted the
    /// file but produced no message for it.
    fn import_message(
        &self,
        file: &MessageFile,
        folder: &FolderRef,
        read: bool,
    ) -> impl Future<Output = Result<Option<MessageHeader>, String>> + Send;

    fn move_messages(
        &self,
        ids: &[MessageId],
        dest: &FolderRef,
    ) -> impl Future<Output = Result<(), String>> + Send;
}

/// Local folders plus an optional IMAP account, presented as one mail client.
/// The IMAP account, when present, is listed first.
pub struct Mailboxes {
    local: LocalFolders,
    remote: Option<ImapAccount>,
}

impl Mailboxes {
    pub fn new(local: LocalFolders, remote: Option<ImapAccount>) -> Self {
        Self { local, remote }
    }

    fn remote_for(&self, account_id: &str) -> Option<&ImapAccount> {
        self.remote.as_ref().filter(|r| r.account_id() == account_id)
    }

    fn is_local(&self, account_id: &str) -> bool {
        account_id == self.local.account_id()
    }

    fn unknown(account_id: &str) -> String {
        format!("Unknown mail account '{}'", account_id)
    }
}

impl MailHost for Mailboxes {
    async fn list_accounts(&self) -> Result<Vec<MailAccount>, String> {
        let mut accounts = Vec::new();
        if let Some(remote) = &self.remote {
            accounts.push(remote.account());
        }
        accounts.push(self.local.account());
        Ok(accounts)
    }

    async fn sub_folders(&self, parent: &FolderRef) -> Result<Vec<MailFolder>, String> {
        if self.is_local(&parent.account_id) {
            return self.local.sub_folders(parent).await;
        }
        match self.remote_for(&parent.account_id) {
            Some(remote) => remote.sub_folders(parent).await,
            None => Err(Self::unknown(&parent.account_id)),
        }
    }

    async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<MailFolder, String> {
        if self.is_local(&parent.account_id) {
            return self.local.create_folder(parent, name).await;
        }
        match self.remote_for(&parent.account_id) {
            Some(remote) => remote.create_folder(parent, name).await,
            None => Err(Self::unknown(&parent.account_id)),
        }
    }

    async fn query_subject(&self, folder: &FolderRef, subject: &str) -> Result<Vec<MessageHeader>, String> {
        if self.is_local(&folder.account_id) {
            return self.local.query_subject(folder, subject).await;
        }
        match self.remote_for(&folder.account_id) {
            Some(remote) => remote.query_subject(folder, subject).await,
            None => Err(Self::unknown(&folder.account_id)),
        }
    }

    async fn import_message(
        &self,
        file: &MessageFile,
        folder: &FolderRef,
        read: bool,
    ) -> Result<Option<MessageHeader>, String> {
        if self.is_local(&folder.account_id) {
            return self.local.import_message(file, folder).await;
        }
        match self.remote_for(&folder.account_id) {
            Some(remote) => remote.append_message(&file.content, folder, read).await,
            None => Err(Self::unknown(&folder.account_id)),
        }
    }

    async fn move_messages(&self, ids: &[MessageId], dest: &FolderRef) -> Result<(), String> {
        for id in ids {
            if self.is_local(&id.account_id) && self.is_local(&dest.account_id) {
                self.local.move_message(id, dest).await?;
            } else if self.is_local(&id.account_id) {
                let remote = self
                    .remote_for(&dest.account_id)
                    .ok_or_else(|| Self::unknown(&dest.account_id))?;
                // Upload first; the local copy is only removed once the server has it.
                let content = self.local.read_message(id).await?;
                remote.append_message(&content, dest, true).await?;
                discard_local_copy(&self.local, id).await;
            } else {
                let remote = self
                    .remote_for(&id.account_id)
                    .ok_or_else(|| Self::unknown(&id.account_id))?;
                if dest.account_id != id.account_id {
                    return Err("Moving messages off an IMAP account is not supported".to_string());
                }
                remote.move_message(id, dest).await?;
            }
        }
        Ok(())
    }
}

/// Remove a message that already reached the server. The move has happened at
/// this point, so a leftover local copy is only worth a warning.
async fn discard_local_copy(local: &LocalFolders, id: &MessageId) {
    if let Err(e) = local.delete_message(id).await {
        log::warn!("Message {} was uploaded but its local copy remains: {}", id.key, e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct State {
        accounts: Vec<MailAccount>,
        folders: Vec<MailFolder>,
        messages: HashMap<MessageId, MessageHeader>,
        next_id: u32,
        moves: Vec<(MessageId, FolderRef)>,
    }

    /// In-memory mail client with switchable failure points.
    #[derive(Default)]
    pub struct MemoryMailHost {
        state: Mutex<State>,
        fail_imports: bool,
        empty_imports: bool,
        fail_moves: bool,
    }

    impl MemoryMailHost {
        pub fn rejecting_imports(mut self) -> Self {
            self.fail_imports = true;
            self
        }

        pub fn with_empty_imports(mut self) -> Self {
            self.empty_imports = true;
            self
        }

        pub fn failing_moves(mut self) -> Self {
            self.fail_moves = true;
            self
        }

        /// An IMAP account with one identity plus local folders.
        pub fn standard() -> Self {
            let host = Self::default();
            host.add_account("imap1", IMAP_ACCOUNT_TYPE, &["me@example.com"]);
            host.add_account("local", LOCAL_ACCOUNT_TYPE, &[]);
            host
        }

        pub fn add_account(&self, id: &str, account_type: &str, emails: &[&str]) {
            self.state.lock().unwrap().accounts.push(MailAccount {
                id: id.to_string(),
                name: id.to_string(),
                account_type: account_type.to_string(),
                root_folder: FolderRef::root(id),
                identities: emails
                    .iter()
                    .map(|e| Identity { email: e.to_string() })
                    .collect(),
            });
        }

        pub fn folder_count(&self, name: &str) -> usize {
            let state = self.state.lock().unwrap();
            state.folders.iter().filter(|f| f.name == name).count()
        }

        pub fn subjects_in(&self, account_id: &str) -> Vec<String> {
            let state = self.state.lock().unwrap();
            let mut subjects: Vec<String> = state
                .messages
                .values()
                .filter(|m| m.folder.account_id == account_id)
                .map(|m| m.subject.clone())
                .collect();
            subjects.sort();
            subjects
        }

        pub fn seed_message(&self, folder: &FolderRef, subject: &str) {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = MessageId {
                account_id: folder.account_id.clone(),
                key: state.next_id.to_string(),
            };
            state.messages.insert(
                id.clone(),
                MessageHeader {
                    id,
                    subject: subject.to_string(),
                    folder: folder.clone(),
                },
            );
        }

        pub fn move_count(&self) -> usize {
            self.state.lock().unwrap().moves.len()
        }
    }

    impl MailHost for MemoryMailHost {
        async fn list_accounts(&self) -> Result<Vec<MailAccount>, String> {
            Ok(self.state.lock().unwrap().accounts.clone())
        }

        async fn sub_folders(&self, parent: &FolderRef) -> Result<Vec<MailFolder>, String> {
            let state = self.state.lock().unwrap();
            Ok(state
                .folders
                .iter()
                .filter(|f| {
                    f.folder.account_id == parent.account_id
                        && f.folder.path.rsplit_once('/').map(|(p, _)| p).unwrap_or("") == parent.path
                })
                .cloned()
                .collect())
        }

        async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<MailFolder, String> {
            let path = if parent.is_root() {
                name.to_string()
            } else {
                format!("{}/{}", parent.path, name)
            };
            let folder = MailFolder {
                folder: FolderRef {
                    account_id: parent.account_id.clone(),
                    path,
                },
                name: name.to_string(),
            };
            self.state.lock().unwrap().folders.push(folder.clone());
            Ok(folder)
        }

        async fn query_subject(&self, folder: &FolderRef, subject: &str) -> Result<Vec<MessageHeader>, String> {
            let state = self.state.lock().unwrap();
            Ok(state
                .messages
                .values()
                .filter(|m| &m.folder == folder && m.subject == subject)
                .cloned()
                .collect())
        }

        async fn import_message(
            &self,
            file: &MessageFile,
            folder: &FolderRef,
            _read: bool,
        ) -> Result<Option<MessageHeader>, String> {
            if self.fail_imports {
                return Err("import rejected".to_string());
            }
            if self.empty_imports {
                return Ok(None);
            }
            let subject = mail_parser::MessageParser::default()
                .parse(file.content.as_slice())
                .and_then(|m| m.subject().map(str::to_string))
                .unwrap_or_default();
            self.seed_message(folder, &subject);
            let state = self.state.lock().unwrap();
            let id = MessageId {
                account_id: folder.account_id.clone(),
                key: state.next_id.to_string(),
            };
            Ok(state.messages.get(&id).cloned())
        }

        async fn move_messages(&self, ids: &[MessageId], dest: &FolderRef) -> Result<(), String> {
            if self.fail_moves {
                return Err("server refused the move".to_string());
            }
            let mut state = self.state.lock().unwrap();
            for id in ids {
                let mut header = state
                    .messages
                    .remove(id)
                    .ok_or_else(|| format!("no message {}", id.key))?;
                let new_id = MessageId {
                    account_id: dest.account_id.clone(),
                    key: id.key.clone(),
                };
                header.id = new_id.clone();
                header.folder = dest.clone();
                state.messages.insert(new_id, header);
                state.moves.push((id.clone(), dest.clone()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::Task;
    use crate::mail::template::task_message_file;

    #[tokio::test]
    async fn uploaded_local_copy_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let root = local.account().root_folder;
        let file = task_message_file(&Task::new(1u64, "Buy milk"), "me@example.com", "me@example.com");
        let header = local.import_message(&file, &root).await.unwrap().unwrap();

        discard_local_copy(&local, &header.id).await;
        assert!(local.read_message(&header.id).await.is_err());
    }

    #[tokio::test]
    async fn leftover_local_copy_does_not_fail_the_move() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let gone = MessageId {
            account_id: local.account_id().to_string(),
            key: "task-404.eml".into(),
        };

        // Returns normally; the failure is only logged.
        discard_local_copy(&local, &gone).await;
    }
}
