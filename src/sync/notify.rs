use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A status message for whatever UI surface is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NoticeKind,
    pub text: String,
    pub at: NaiveDateTime,
}

/// Receiving end of one subscription.
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

/// Fire-and-forget relay from background work to UI surfaces.
///
/// Every subscriber gets its own unbounded queue, so a long run never drops
/// notices while the UI waits for it to finish. Having no receiver is normal
/// (no window open); it is logged and ignored.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Notification>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(_) => log::error!("Notification relay is poisoned, subscriber not registered"),
        }
        rx
    }

    pub fn send(&self, kind: NoticeKind, text: impl Into<String>) {
        let notification = Notification {
            kind,
            text: text.into(),
            at: chrono::Local::now().naive_local(),
        };
        let Ok(mut subscribers) = self.subscribers.lock() else {
            log::error!("Notification relay is poisoned, dropping: {}", notification.text);
            return;
        };
        // Dropped receivers fall out here.
        subscribers.retain(|tx| tx.send(notification.clone()).is_ok());
        if subscribers.is_empty() {
            log::debug!("No receiver for notification: {}", notification.text);
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.send(NoticeKind::Info, text);
    }

    pub fn success(&self, text: impl Into<String>) {
        self.send(NoticeKind::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.send(NoticeKind::Error, text);
    }
}

/// Collect everything currently queued on a receiver without waiting.
pub fn drain(rx: &mut NotificationReceiver) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
