//! Recently copied equations, newest first.

use std::collections::VecDeque;

use serde::Serialize;

use crate::commands::{Notification, Notifier};
use crate::format::Format;
use crate::util::{iso_timestamp, now_millis};

pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipboardHistoryItem {
    pub id: u64,
    pub formula: String,
    pub format: Format,
    pub source: String,
    /// ISO-8601, UTC.
    pub timestamp: String,
}

/// Fixed-size ring of copied formulas. Pushing past the cap evicts the
/// oldest item.
#[derive(Debug, Clone)]
pub struct ClipboardHistory {
    items: VecDeque<ClipboardHistoryItem>,
    cap: usize,
    next_id: u64,
}

impl Default for ClipboardHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAP)
    }
}

impl ClipboardHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap),
            cap: cap.max(1),
            next_id: 1,
        }
    }

    pub fn push(&mut self, formula: impl Into<String>, format: Format, source: impl Into<String>, at_millis: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push_front(ClipboardHistoryItem {
            id,
            formula: formula.into(),
            format,
            source: source.into(),
            timestamp: iso_timestamp(at_millis),
        });
        self.items.truncate(self.cap);
        id
    }

    /// Items, newest first.
    pub fn items(&self) -> impl Iterator<Item = &ClipboardHistoryItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.items)
    }
}

impl Notifier for ClipboardHistory {
    fn notify(&mut self, notification: &Notification) {
        if let Notification::EquationCopied {
            formula,
            format,
            source,
            ..
        } = notification
        {
            self.push(formula.clone(), *format, source.clone(), now_millis());
        }
    }
}
