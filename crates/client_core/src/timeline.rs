//! Ordered chat timeline: live arrivals appended, server history merged once.

use std::sync::Arc;

use shared::{
    domain::{Timestamp, WireTimestamp},
    protocol::{MessageData, NotificationData},
};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: Option<String>,
    pub author: String,
    pub body: String,
    pub sent_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub body: String,
    pub occurred_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEntry {
    Message(ChatMessage),
    Notification(Notification),
}

/// Rendering key: the server id when one was provided, otherwise the
/// position in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Id(String),
    Position(usize),
}

impl ChatEntry {
    pub fn message(data: MessageData, received_at: Timestamp) -> Self {
        let sent_at = normalize_or(&data.timestamp, received_at);
        Self::Message(ChatMessage {
            id: data.message_id(),
            author: data.username,
            body: data.message,
            sent_at,
        })
    }

    pub fn notification(data: NotificationData, received_at: Timestamp) -> Self {
        Self::Notification(Notification {
            occurred_at: normalize_or(&data.timestamp, received_at),
            body: data.message,
        })
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Message(message) => message.sent_at,
            Self::Notification(notification) => notification.occurred_at,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Message(message) => &message.body,
            Self::Notification(notification) => &notification.body,
        }
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// True for messages written by `local`; notifications are never own.
    pub fn is_own(&self, local: Option<&str>) -> bool {
        match (self, local) {
            (Self::Message(message), Some(local)) => message.author == local,
            _ => false,
        }
    }

    pub fn key(&self, position: usize) -> EntryKey {
        match self {
            Self::Message(ChatMessage { id: Some(id), .. }) => EntryKey::Id(id.clone()),
            _ => EntryKey::Position(position),
        }
    }

    pub fn time_label(&self) -> String {
        self.timestamp().time_label()
    }
}

fn normalize_or(raw: &WireTimestamp, fallback: Timestamp) -> Timestamp {
    raw.normalize().unwrap_or_else(|| {
        warn!(timestamp = ?raw, "unparseable entry timestamp; using receipt time");
        fallback
    })
}

/// Entries live behind an `Arc` shared with published snapshots. A write
/// copies them only while an older snapshot still holds the same buffer.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Arc<Vec<ChatEntry>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_live(&mut self, entry: ChatEntry) {
        Arc::make_mut(&mut self.entries).push(entry);
    }

    /// Puts `history` in front of the notifications accumulated so far and
    /// drops earlier live messages, which the server history already covers.
    ///
    /// Not idempotent: a second call prepends again.
    pub fn load_history(&mut self, history: impl IntoIterator<Item = ChatEntry>) {
        let previous = std::mem::take(&mut self.entries);
        let mut merged: Vec<ChatEntry> = history.into_iter().collect();
        merged.extend(
            previous
                .iter()
                .filter(|entry| entry.is_notification())
                .cloned(),
        );
        self.entries = Arc::new(merged);
    }

    pub fn clear(&mut self) {
        self.entries = Arc::default();
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Cheap handle on the current entries for publishing.
    pub fn shared(&self) -> Arc<Vec<ChatEntry>> {
        Arc::clone(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/timeline_tests.rs"]
mod tests;
