//! The player-facing game log.
//!
//! Every command appends entries here; a [`Response`](crate::session::Response)
//! carries the slice appended while that command ran. The log is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of event a log line describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Combat,
    Narrative,
    System,
    Dice,
    Death,
    Level,
    Ai,
}

impl LogCategory {
    pub fn name(&self) -> &'static str {
        match self {
            LogCategory::Combat => "combat",
            LogCategory::Narrative => "narrative",
            LogCategory::System => "system",
            LogCategory::Dice => "dice",
            LogCategory::Death => "death",
            LogCategory::Level => "level",
            LogCategory::Ai => "ai",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    pub category: LogCategory,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.text)
    }
}

/// Append-only sequence of log entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameLog {
    entries: Vec<LogEntry>,
}

impl GameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: LogCategory, text: impl Into<String>) {
        self.entries.push(LogEntry {
            text: text.into(),
            category,
            timestamp: Utc::now(),
        });
    }

    pub fn combat(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Combat, text);
    }

    pub fn narrative(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Narrative, text);
    }

    pub fn system(&mut self, text: impl Into<String>) {
        self.push(LogCategory::System, text);
    }

    pub fn dice(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Dice, text);
    }

    pub fn death(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Death, text);
    }

    pub fn level(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Level, text);
    }

    pub fn ai(&mut self, text: impl Into<String>) {
        self.push(LogCategory::Ai, text);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries appended at or after position `start`.
    pub fn since(&self, start: usize) -> &[LogEntry] {
        &self.entries[start.min(self.entries.len())..]
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }
}
