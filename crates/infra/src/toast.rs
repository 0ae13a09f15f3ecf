//! Notifier implementations

use soundpanel_core::domain::notify::Notifier;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info};

/// Writes panel messages to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn success(&self, message: &str) {
        info!(target: "soundpanel::toast", kind = "success", "{}", message);
    }

    fn info(&self, message: &str) {
        info!(target: "soundpanel::toast", kind = "info", "{}", message);
    }

    fn loading(&self, message: &str) {
        info!(target: "soundpanel::toast", kind = "loading", "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: "soundpanel::toast", "{}", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Loading,
    Error,
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Info => "info",
            NoticeLevel::Loading => "loading",
            NoticeLevel::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Keeps messages until a front end drains them
#[derive(Debug, Default)]
pub struct NoticeLog {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every message recorded so far
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                level,
                message: message.to_string(),
            });
    }
}

impl Notifier for NoticeLog {
    fn success(&self, message: &str) {
        self.push(NoticeLevel::Success, message);
    }

    fn info(&self, message: &str) {
        self.push(NoticeLevel::Info, message);
    }

    fn loading(&self, message: &str) {
        self.push(NoticeLevel::Loading, message);
    }

    fn error(&self, message: &str) {
        self.push(NoticeLevel::Error, message);
    }
}
