use std::sync::Mutex;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A soft, user-facing notification. Never a hard failure path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Capability for surfacing notices to whatever UI is attached.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn info(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Info, message));
    }

    fn success(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Success, message));
    }

    fn warning(&self, message: &str) {
        self.notify(Notice::new(NoticeLevel::Warning, message));
    }
}

/// Forwards notices to `tracing`; the default for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "notice", level = ?notice.level, "{}", notice.message);
            }
            NoticeLevel::Warning => tracing::warn!(target: "notice", "{}", notice.message),
            NoticeLevel::Error => tracing::error!(target: "notice", "{}", notice.message),
        }
    }
}

/// Keeps every notice in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|n| n.level == level).count()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut guard) = self.notices.lock() {
            guard.push(notice);
        }
    }
}
