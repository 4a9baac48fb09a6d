use std::collections::HashSet;

use futures::TryStreamExt;

use super::{FolderRef, IMAP_ACCOUNT_TYPE, Identity, MailAccount, MailFolder, MessageHeader, MessageId};
use crate::config::ImapSettings;

type ImapSession = async_imap::Session<async_native_tls::TlsStream<async_std::net::TcpStream>>;

/// Connect to IMAP over TLS and return a logged-in session.
async fn connect_and_login(
    host: &str,
    port: u16,
    username: &str,
    password: &str,
) -> Result<ImapSession, String> {
    let tls = async_native_tls::TlsConnector::new();
    let tcp = async_std::net::TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("TCP connect failed: {}", e))?;
    let tls_stream = tls
        .connect(host, tcp)
        .await
        .map_err(|e| format!("TLS connect failed: {}", e))?;

    let client = async_imap::Client::new(tls_stream);
    let session = client
        .login(username, password)
        .await
        .map_err(|e| format!("IMAP login failed: {}", e.0))?;

    Ok(session)
}

/// Hierarchy delimiter reported by the server (`LIST "" ""`), `/` if it reports none.
async fn hierarchy_delimiter(session: &mut ImapSession) -> Result<String, String> {
    let names: Vec<_> = session
        .list(Some(""), Some(""))
        .await
        .map_err(|e| format!("Failed to list folders: {}", e))?
        .try_collect()
        .await
        .map_err(|e| format!("Failed to collect folders: {}", e))?;
    Ok(names
        .first()
        .and_then(|n| n.delimiter())
        .unwrap_or("/")
        .to_string())
}

/// Quote a string for an IMAP command argument.
fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn parse_subject(header: &[u8]) -> Option<String> {
    mail_parser::MessageParser::default()
        .parse(header)
        .and_then(|m| m.subject().map(str::to_string))
}

/// The remote mail account. Every operation opens its own session.
#[derive(Debug, Clone)]
pub struct ImapAccount {
    settings: ImapSettings,
    password: String,
}

impl ImapAccount {
    pub fn new(settings: ImapSettings, password: impl Into<String>) -> Self {
        Self {
            settings,
            password: password.into(),
        }
    }

    /// Build the account from config, reading the password from the keyring.
    /// Returns `Ok(None)` when IMAP is not configured.
    pub async fn from_keyring(settings: &ImapSettings) -> Result<Option<Self>, String> {
        if !settings.is_configured() {
            return Ok(None);
        }
        match crate::sync::keyring::load_credentials(&settings.keyring_key()).await? {
            Some((_, password)) => Ok(Some(Self::new(settings.clone(), password))),
            None => Err(format!("No IMAP credentials stored for {}", settings.host.trim())),
        }
    }

    pub fn account_id(&self) -> String {
        format!("imap:{}", self.settings.host.trim())
    }

    pub fn account(&self) -> MailAccount {
        let mut identities = Vec::new();
        let email = if self.settings.identity_email.trim().is_empty() {
            self.settings.username.trim()
        } else {
            self.settings.identity_email.trim()
        };
        if email.contains('@') {
            identities.push(Identity {
                email: email.to_string(),
            });
        }
        MailAccount {
            id: self.account_id(),
            name: format!("{}@{}", self.settings.username, self.settings.host.trim()),
            account_type: IMAP_ACCOUNT_TYPE.to_string(),
            root_folder: FolderRef::root(self.account_id()),
            identities,
        }
    }

    async fn session(&self) -> Result<ImapSession, String> {
        connect_and_login(
            self.settings.host.trim(),
            self.settings.port_or_default(),
            &self.settings.username,
            &self.password,
        )
        .await
    }

    pub async fn sub_folders(&self, parent: &FolderRef) -> Result<Vec<MailFolder>, String> {
        let mut session = self.session().await?;
        let delim = hierarchy_delimiter(&mut session).await?;
        let pattern = if parent.is_root() {
            "%".to_string()
        } else {
            format!("{}{}%", parent.path, delim)
        };

        let names: Vec<_> = session
            .list(Some(""), Some(pattern.as_str()))
            .await
            .map_err(|e| format!("Failed to list folders: {}", e))?
            .try_collect()
            .await
            .map_err(|e| format!("Failed to collect folders: {}", e))?;

        let folders = names
            .iter()
            .map(|n| {
                let full = n.name().to_string();
                let name = full.rsplit(delim.as_str()).next().unwrap_or(&full).to_string();
                MailFolder {
                    folder: FolderRef {
                        account_id: self.account_id(),
                        path: full,
                    },
                    name,
                }
            })
            .collect();

        session.logout().await.ok();
        Ok(folders)
    }

    pub async fn create_folder(&self, parent: &FolderRef, name: &str) -> Result<MailFolder, String> {
        let mut session = self.session().await?;
        let delim = hierarchy_delimiter(&mut session).await?;
        let path = if parent.is_root() {
            name.to_string()
        } else {
            format!("{}{}{}", parent.path, delim, name)
        };
        session
            .create(&path)
            .await
            .map_err(|e| format!("Failed to create folder '{}': {}", path, e))?;
        session.logout().await.ok();
        Ok(MailFolder {
            folder: FolderRef {
                account_id: self.account_id(),
                path,
            },
            name: name.to_string(),
        })
    }

    async fn matching_uids(
        session: &mut ImapSession,
        folder: &FolderRef,
        subject: &str,
    ) -> Result<Vec<u32>, String> {
        session
            .select(&folder.path)
            .await
            .map_err(|e| format!("Failed to select folder '{}': {}", folder.path, e))?;

        // SEARCH SUBJECT is a substring match; exact comparison happens on the headers.
        let candidates: HashSet<u32> = session
            .uid_search(format!("CHARSET UTF-8 SUBJECT {}", quote(subject)))
            .await
            .map_err(|e| format!("IMAP search failed: {}", e))?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut uids: Vec<u32> = candidates.into_iter().collect();
        uids.sort_unstable();
        let uid_set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let fetches: Vec<_> = session
            .uid_fetch(&uid_set, "(UID BODY.PEEK[HEADER])")
            .await
            .map_err(|e| format!("IMAP fetch failed: {}", e))?
            .try_collect()
            .await
            .map_err(|e| format!("IMAP stream error: {}", e))?;

        Ok(fetches
            .iter()
            .filter(|f| f.header().and_then(parse_subject).as_deref() == Some(subject))
            .filter_map(|f| f.uid)
            .collect())
    }

    pub async fn query_subject(&self, folder: &FolderRef, subject: &str) -> Result<Vec<MessageHeader>, String> {
        let mut session = self.session().await?;
        let uids = Self::matching_uids(&mut session, folder, subject).await?;
        session.logout().await.ok();

        Ok(uids
            .into_iter()
            .map(|uid| MessageHeader {
                id: MessageId {
                    account_id: self.account_id(),
                    key: format!("{}:{}", folder.path, uid),
                },
                subject: subject.to_string(),
                folder: folder.clone(),
            })
            .collect())
    }

    /// APPEND a raw message. The header returned is the newest message with the
    /// same subject, or `None` if the server does not show it.
    pub async fn append_message(
        &self,
        content: &[u8],
        folder: &FolderRef,
        read: bool,
    ) -> Result<Option<MessageHeader>, String> {
        let subject = parse_subject(content);
        let mut session = self.session().await?;
        let flags = if read { Some("(\\Seen)") } else { None };
        session
            .append(&folder.path, flags, None, content)
            .await
            .map_err(|e| format!("Failed to append to '{}': {}", folder.path, e))?;

        let header = match subject {
            Some(subject) => {
                let uids = Self::matching_uids(&mut session, folder, &subject).await?;
                uids.into_iter().max().map(|uid| MessageHeader {
                    id: MessageId {
                        account_id: self.account_id(),
                        key: format!("{}:{}", folder.path, uid),
                    },
                    subject,
                    folder: folder.clone(),
                })
            }
            None => None,
        };
        session.logout().await.ok();
        Ok(header)
    }

    /// Move a message between folders of this account.
    pub async fn move_message(&self, id: &MessageId, dest: &FolderRef) -> Result<(), String> {
        let (source, uid) = id
            .key
            .rsplit_once(':')
            .ok_or_else(|| format!("Malformed IMAP message id '{}'", id.key))?;
        let mut session = self.session().await?;
        session
            .select(source)
            .await
            .map_err(|e| format!("Failed to select folder '{}': {}", source, e))?;
        session
            .uid_mv(uid, &dest.path)
            .await
            .map_err(|e| format!("Failed to move message to '{}': {}", dest.path, e))?;
        session.logout().await.ok();
        Ok(())
    }

    /// Test IMAP connection: login, list folders, return folder count.
    pub async fn test_connection(&self) -> Result<String, String> {
        let mut session = self.session().await?;
        let folders: Vec<_> = session
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| format!("Failed to list folders: {}", e))?
            .try_collect()
            .await
            .map_err(|e| format!("Failed to collect folders: {}", e))?;

        let count = folders.len();
        session.logout().await.ok();
        Ok(format!("Connected ({} folders)", count))
    }
}
