use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{FolderRef, LOCAL_ACCOUNT_TYPE, MailAccount, MailFolder, MessageFile, MessageHeader, MessageId};

const ACCOUNT_ID: &str = "local";

/// On-device folders: one directory per folder, one `.eml` file per message.
#[derive(Debug, Clone)]
pub struct LocalFolders {
    root: PathBuf,
}

fn check_folder_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(format!("Invalid folder name '{}'", name));
    }
    Ok(())
}

fn parse_subject(content: &[u8]) -> Option<String> {
    mail_parser::MessageParser::default()
        .parse(content)
        .and_then(|m| m.subject().map(str::to_string))
}

impl LocalFolders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn account_id(&self) -> &str {
        ACCOUNT_ID
    }

    pub fn account(&self) -> MailAccount {
        MailAccount {
            id: ACCOUNT_ID.to_string(),
            name: "Local Folders".to_string(),
            account_type: LOCAL_ACCOUNT_TYPE.to_string(),
            root_folder: FolderRef::root(ACCOUNT_ID),
            identities: Vec::new(),
        }
    }

    fn folder_dir(&self, folder: &FolderRef) -> Result<PathBuf, String> {
        if folder.account_id != ACCOUNT_ID {
            return Err(format!("Folder '{}' is not a local folder", folder.path));
        }
        let mut dir = self.root.clone();
        for part in folder.path.split('/').filter(|p| !p.is_empty()) {
            check_folder_name(part)?;
            dir.push(part);
        }
        Ok(dir)
    }

    fn message_path(&self, id: &MessageId) -> Result<PathBuf, String> {
        if id.account_id != ACCOUNT_ID || id.key.split('/').any(|p| p == "..") {
            return Err(format!("'{}' is not a local message", id.key));
        }
        Ok(self.root.join(&id.key))
    }

    fn message_key(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub async fn sub_folders(&self, parent: &FolderRef) -> Result<Vec<MailFolder>, String> {
        let dir = self.folder_dir(parent)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to list {}: {}", dir.display(), e)),
        };

        let mut folders = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to list {}: {}", dir.display(), e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if parent.is_root() {
                name.clone()
            } else {
                format!("{}/{}", parent.path, name)
            };
            folders.push(MailFolder {
                folder: FolderRef {
                    account_id: ACCOUNT_ID.to_string(),
                    path,
                },
                name,
            });
        }
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    pub async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<MailFolder, String> {
        check_folder_name(name)?;
        let dir = self.folder_dir(parent)?.join(name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("Failed to create folder {}: {}", dir.display(), e))?;
        let path = if parent.is_root() {
            name.to_string()
        } else {
            format!("{}/{}", parent.path, name)
        };
        Ok(MailFolder {
            folder: FolderRef {
                account_id: ACCOUNT_ID.to_string(),
                path,
            },
            name: name.to_string(),
        })
    }

    pub async fn query_subject(&self, folder: &FolderRef, subject: &str) -> Result<Vec<MessageHeader>, String> {
        let dir = self.folder_dir(folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(format!("Failed to read {}: {}", dir.display(), e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read {}: {}", dir.display(), e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("eml") {
                continue;
            }
            let content = match tokio::fs::read(&path).await {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("Skipping unreadable message {}: {}", path.display(), e);
                    continue;
                }
            };
            if parse_subject(&content).as_deref() == Some(subject) {
                found.push(MessageHeader {
                    id: MessageId {
                        account_id: ACCOUNT_ID.to_string(),
                        key: self.message_key(&path),
                    },
                    subject: subject.to_string(),
                    folder: folder.clone(),
                });
            }
        }
        Ok(found)
    }

    /// Write the file into the folder under a fresh name. Content that does not
    /// parse as a message is rejected with `Ok(None)`.
    pub async fn import_message(&self, file: &MessageFile, folder: &FolderRef) -> Result<Option<MessageHeader>, String> {
        let Some(subject) = parse_subject(&file.content) else {
            log::warn!("{} is not a parseable message", file.filename);
            return Ok(None);
        };
        let dir = self.folder_dir(folder)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("Failed to create folder {}: {}", dir.display(), e))?;

        let path = dir.join(format!("{}-{}", Uuid::new_v4().simple(), file.filename));
        tokio::fs::write(&path, &file.content)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        Ok(Some(MessageHeader {
            id: MessageId {
                account_id: ACCOUNT_ID.to_string(),
                key: self.message_key(&path),
            },
            subject,
            folder: folder.clone(),
        }))
    }

    pub async fn read_message(&self, id: &MessageId) -> Result<Vec<u8>, String> {
        let path = self.message_path(id)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
    }

    pub async fn delete_message(&self, id: &MessageId) -> Result<(), String> {
        let path = self.message_path(id)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| format!("Failed to delete {}: {}", path.display(), e))
    }

    pub async fn move_message(&self, id: &MessageId, dest: &FolderRef) -> Result<(), String> {
        let from = self.message_path(id)?;
        let dir = self.folder_dir(dest)?;
        let file_name = from
            .file_name()
            .ok_or_else(|| format!("'{}' has no file name", id.key))?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("Failed to create folder {}: {}", dir.display(), e))?;
        tokio::fs::rename(&from, dir.join(file_name))
            .await
            .map_err(|e| format!("Failed to move {}: {}", from.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::Task;
    use crate::mail::template::task_message_file;

    #[tokio::test]
    async fn create_list_import_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let root = local.account().root_folder;

        assert!(local.sub_folders(&root).await.unwrap().is_empty());
        let tasks = local.create_folder(&root, "Tasks").await.unwrap();
        let names: Vec<String> = local
            .sub_folders(&root)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["Tasks"]);

        let file = task_message_file(&Task::new(1u64, "Buy milk"), "a@b.c", "a@b.c");
        let header = local
            .import_message(&file, &tasks.folder)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(header.subject, "[TODO] Buy milk");

        let hits = local.query_subject(&tasks.folder, "[TODO] Buy milk").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(local.query_subject(&tasks.folder, "[TODO] Buy").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_import_yields_no_message() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let file = MessageFile {
            filename: "task-1.eml".into(),
            content: Vec::new(),
        };
        let root = local.account().root_folder;
        assert!(local.import_message(&file, &root).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn move_between_local_folders() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let root = local.account().root_folder;
        let a = local.create_folder(&root, "A").await.unwrap();
        let b = local.create_folder(&root, "B").await.unwrap();

        let file = task_message_file(&Task::new(2u64, "Call mom"), "a@b.c", "a@b.c");
        let header = local.import_message(&file, &a.folder).await.unwrap().unwrap();
        local.move_message(&header.id, &b.folder).await.unwrap();

        assert!(local.query_subject(&a.folder, &header.subject).await.unwrap().is_empty());
        assert_eq!(local.query_subject(&b.folder, &header.subject).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalFolders::new(dir.path());
        let root = local.account().root_folder;
        assert!(local.create_folder(&root, "..").await.is_err());
        assert!(local.create_folder(&root, "a/b").await.is_err());
    }
}
