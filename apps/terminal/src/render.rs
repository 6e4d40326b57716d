//! Plain-text rendering of session snapshots.

use client_core::{ChatEntry, SessionSnapshot, SessionStatus};

pub fn format_entry(entry: &ChatEntry, identity: Option<&str>) -> String {
    match entry {
        ChatEntry::Notification(_) => format!("-- {} --", entry.body()),
        ChatEntry::Message(message) => {
            let author = if entry.is_own(identity) {
                "you"
            } else {
                message.author.as_str()
            };
            format!("[{}] {author}: {}", entry.time_label(), entry.body())
        }
    }
}

pub fn format_roster(snapshot: &SessionSnapshot) -> String {
    let names: Vec<String> = snapshot
        .roster
        .iter()
        .map(|entry| {
            if entry.is_self {
                format!("{} (you)", entry.username)
            } else {
                entry.username.clone()
            }
        })
        .collect();
    format!("online ({}): {}", names.len(), names.join(", "))
}

/// Prints only what changed since the previous snapshot. Keeps the count
/// and the last printed entry rather than the timeline itself, so the
/// session can keep appending to its buffer in place.
#[derive(Default)]
pub struct Renderer {
    rendered: usize,
    last: Option<ChatEntry>,
    status: Option<SessionStatus>,
    typing: Option<String>,
    roster: Option<String>,
}

impl Renderer {
    pub fn render(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        if self.status != Some(snapshot.status) {
            self.status = Some(snapshot.status);
            lines.push(format!("* {:?}", snapshot.status));
        }

        // History merges rewrite the front of the timeline; reprint it all then.
        let timeline = snapshot.timeline.as_slice();
        let skip = match self.rendered.checked_sub(1) {
            Some(index) if timeline.get(index) == self.last.as_ref() => self.rendered,
            _ => 0,
        };
        let identity = snapshot.identity.as_deref();
        lines.extend(
            timeline[skip..]
                .iter()
                .map(|entry| format_entry(entry, identity)),
        );
        self.rendered = timeline.len();
        self.last = timeline.last().cloned();

        if self.typing != snapshot.typing_indicator {
            self.typing = snapshot.typing_indicator.clone();
            if let Some(text) = &self.typing {
                lines.push(format!("... {text}"));
            }
        }

        let roster = (!snapshot.roster.is_empty()).then(|| format_roster(snapshot));
        if self.roster != roster {
            self.roster = roster;
            if let Some(text) = &self.roster {
                lines.push(text.clone());
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client_core::{ChatMessage, Notification, RosterEntry};
    use shared::domain::Timestamp;
    use std::sync::Arc;

    fn snapshot(timeline: Vec<ChatEntry>) -> SessionSnapshot {
        SessionSnapshot {
            status: SessionStatus::Joined,
            identity: Some("alice".into()),
            timeline: Arc::new(timeline),
            typists: vec!["bob".into()],
            typing_indicator: Some("bob is typing".into()),
            roster: vec![
                RosterEntry {
                    username: "alice".into(),
                    is_self: true,
                },
                RosterEntry {
                    username: "bob".into(),
                    is_self: false,
                },
            ],
        }
    }

    fn message(author: &str, body: &str) -> ChatEntry {
        ChatEntry::Message(ChatMessage {
            id: None,
            author: author.into(),
            body: body.into(),
            sent_at: Timestamp(0),
        })
    }

    #[test]
    fn own_messages_render_as_you() {
        let line = format_entry(&message("alice", "hi"), Some("alice"));
        assert!(line.ends_with("] you: hi"), "{line}");
        let line = format_entry(&message("bob", "yo"), Some("alice"));
        assert!(line.ends_with("] bob: yo"), "{line}");
    }

    #[test]
    fn renders_only_new_entries() {
        let mut renderer = Renderer::default();
        let first = renderer.render(&snapshot(vec![message("bob", "one")]));
        assert_eq!(first.len(), 4);
        assert_eq!(first[3], "online (2): alice (you), bob");

        let second = renderer.render(&snapshot(vec![
            message("bob", "one"),
            ChatEntry::Notification(Notification {
                body: "carol joined the chat".into(),
                occurred_at: Timestamp(1),
            }),
        ]));
        assert_eq!(second, vec!["-- carol joined the chat --".to_string()]);
    }

    #[test]
    fn history_merge_reprints_the_timeline() {
        let mut renderer = Renderer::default();
        let notice = ChatEntry::Notification(Notification {
            body: "alice joined the chat".into(),
            occurred_at: Timestamp(1),
        });
        renderer.render(&snapshot(vec![notice.clone()]));

        let lines = renderer.render(&snapshot(vec![message("bob", "old"), notice]));
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] bob: old"), "{}", lines[0]);
        assert_eq!(lines[1], "-- alice joined the chat --");

        assert!(renderer.render(&snapshot(Vec::new())).is_empty());
    }
}
