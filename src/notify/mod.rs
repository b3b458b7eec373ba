//! Notification log
//!
//! Newest-first ring of human-readable events. Nothing reads it to make
//! decisions; each entry is mirrored to `tracing` as it is recorded.


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NotificationLog {
    entries: VecDeque<Notification>,
    capacity: usize,
}

impl NotificationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an event at the front, dropping the oldest past capacity
    pub fn push(&mut self, title: impl Into<String>, message: impl Into<String>, severity: Severity) -> &Notification {
        let note = Notification {
            id: uuid::Uuid::new_v4().simple().to_string(),
            title: title.into(),
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        };

        match severity {
            Severity::Info | Severity::Success => tracing::info!("[{}] {}: {}", severity, note.title, note.message),
            Severity::Warning => tracing::warn!("{}: {}", note.title, note.message),
            Severity::Error => tracing::error!("{}: {}", note.title, note.message),
        }

        self.entries.push_front(note);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(title, message, Severity::Info);
    }

    pub fn success(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(title, message, Severity::Success);
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(title, message, Severity::Warning);
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(title, message, Severity::Error);
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<Notification> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for NotificationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
