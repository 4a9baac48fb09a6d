use cosmic::cosmic_config::{self, CosmicConfigEntry, cosmic_config_derive::CosmicConfigEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const CONFIG_VERSION: u64 = 1;

pub const DEFAULT_API_BASE_URL: &str = "https://dummyjson.com/todos";
pub const DEFAULT_CARD_URL: &str = "https://briskventures.us";
pub const DEFAULT_TASKS_FOLDER: &str = "Tasks";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("taskboard")
}

fn default_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("todo", "To Do"),
        ColumnSpec::new("doing", "In Progress"),
        ColumnSpec::new("done", "Done"),
    ]
}

/// A board column as configured: stable key plus display title.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub id: String,
    pub title: String,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Remote mail account the exporter moves tasks into.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Address used for From/To on rendered task messages.
    pub identity_email: String,
}

impl ImapSettings {
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.username.trim().is_empty()
    }

    pub fn port_or_default(&self) -> u16 {
        if self.port == 0 { 993 } else { self.port }
    }

    /// Keyring lookup key for this server's credentials.
    pub fn keyring_key(&self) -> String {
        format!("imap://{}", self.host.trim())
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, CosmicConfigEntry)]
pub struct BoardConfig {
    pub data_directory: PathBuf,
    pub api_base_url: String,
    pub card_url: String,
    pub browser_command: String,
    pub columns: Vec<ColumnSpec>,
    /// Tasks fetched to seed an empty board.
    pub board_page_size: u32,
    pub tasks_folder: String,
    pub imap: ImapSettings,
    pub debug_logging: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            data_directory: default_data_dir(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            card_url: DEFAULT_CARD_URL.to_string(),
            browser_command: "xdg-open".to_string(),
            columns: default_columns(),
            board_page_size: 20,
            tasks_folder: DEFAULT_TASKS_FOLDER.to_string(),
            imap: ImapSettings::default(),
            debug_logging: false,
        }
    }
}

impl BoardConfig {
    pub fn state_path(&self) -> PathBuf {
        self.data_directory.join("state.json")
    }

    /// Root of the on-device "Local Folders" mail account.
    pub fn local_folders_path(&self) -> PathBuf {
        self.data_directory.join("mail")
    }

    /// Configured columns, falling back to the defaults when the list is empty.
    pub fn board_columns(&self) -> Vec<ColumnSpec> {
        if self.columns.is_empty() {
            default_columns()
        } else {
            self.columns.clone()
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_directory)?;
        std::fs::create_dir_all(self.local_folders_path())?;
        Ok(())
    }
}
