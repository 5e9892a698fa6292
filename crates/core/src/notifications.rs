use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// User-facing toast messages. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn show_error(&self, message: &str);

    fn show_success(&self, _message: &str) {}
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn show_error(&self, message: &str) {
        (**self).show_error(message);
    }

    fn show_success(&self, message: &str) {
        (**self).show_success(message);
    }
}

/// Records every notice in arrival order. Cloning shares the log.
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NotificationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn latest(&self) -> Option<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl NotificationSink for NotificationLog {
    fn show_error(&self, message: &str) {
        tracing::debug!(message, "error notice");
        self.push(NoticeLevel::Error, message);
    }

    fn show_success(&self, message: &str) {
        self.push(NoticeLevel::Success, message);
    }
}
