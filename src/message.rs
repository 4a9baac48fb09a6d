use crate::core::board::Board;
use crate::core::task::TaskId;
use crate::sync::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Board,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImapField {
    Host,
    Port,
    Username,
    Identity,
}

#[derive(Debug, Clone)]
pub enum Message {
    // Startup
    ServicesReady(Result<Services, String>),
    BoardLoaded(Result<Board, String>),
    ReloadBoard,

    // Board and drag-and-drop
    CardClicked(TaskId),
    DragStart(TaskId),
    DragCancel,
    DropOnColumn(String),
    DropBefore(String, TaskId),
    DragSettled,

    // Export and notifications
    FetchTasksNow,
    ExportFinished(Result<(), String>),
    ClearNotifications,

    // Navigation
    ShowPage(Page),

    // Fetch options (state store)
    LimitInput(String),
    SkipInput(String),
    SaveOptions,
    OptionsStatusExpired(u64),

    // Config
    SetBrowserCommand(String),
    SetCardUrl(String),
    SetApiBaseUrl(String),
    SetTasksFolder(String),
    ToggleDebugLogging,

    // IMAP account
    SetImapField(ImapField, String),
    SetImapPassword(String),
    SaveImapAccount,
    ImapAccountSaved(Result<String, String>),
}
