// Activity feed - Session events for the dashboard's log panel
use crate::domain::activity::{ActivityLog, LogEntry, LogLevel};
use chrono::Utc;
use std::sync::{Arc, Mutex};

/// Shared handle to the session's activity log. Every service records into
/// the same log; cloning shares it.
#[derive(Debug, Clone, Default)]
pub struct ActivityFeed {
    log: Arc<Mutex<ActivityLog>>,
}

impl ActivityFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(ActivityLog::new(capacity))),
        }
    }

    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        match self.log.lock() {
            Ok(mut log) => log.record(level, message, Utc::now()),
            Err(_) => tracing::warn!("Activity log lock poisoned, dropping entry"),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.record(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogLevel::Warn, message);
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<LogEntry> {
        self.log
            .lock()
            .map(|log| log.newest_first())
            .unwrap_or_default()
    }
}
