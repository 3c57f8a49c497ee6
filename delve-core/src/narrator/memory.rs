//! Narrator memory for prompt context.
//!
//! Keeps the dungeon's narrative voice plus a sliding window of recent
//! events. Only used to enrich prompts; mechanics never read it.

use crate::content::{NARRATOR_FOCUS, NARRATOR_TONE};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of recent events kept for prompts.
pub const MAX_RECENT_EVENTS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorMemory {
    pub tone: String,
    pub focus: Vec<String>,
    events: VecDeque<String>,
}

impl NarratorMemory {
    pub fn new(tone: impl Into<String>, focus: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tone: tone.into(),
            focus: focus.into_iter().map(Into::into).collect(),
            events: VecDeque::new(),
        }
    }

    /// Record an event, dropping the oldest beyond the window.
    pub fn record(&mut self, event: impl Into<String>) {
        self.events.push_back(event.into());
        while self.events.len() > MAX_RECENT_EVENTS {
            self.events.pop_front();
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// The last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&str> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).map(String::as_str).collect()
    }

    /// Prompt context block.
    pub fn build_context(&self) -> String {
        let mut context = format!("Tone: {}\n", self.tone);
        if !self.focus.is_empty() {
            context.push_str(&format!("Focus: {}\n", self.focus.join(", ")));
        }
        let recent = self.recent(5);
        if !recent.is_empty() {
            context.push_str("Recent events:\n");
            for event in recent {
                context.push_str(&format!("- {event}\n"));
            }
        }
        context
    }
}

impl Default for NarratorMemory {
    fn default() -> Self {
        Self::new(NARRATOR_TONE, NARRATOR_FOCUS.iter().copied())
    }
}
