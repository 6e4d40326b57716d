//! Typing indicators.
//!
//! [`TypingAggregator`] tracks remote users that are typing, in activation
//! order. [`TypingDebounce`] shapes the local user's outbound typing
//! intents: one start on the first keystroke, one stop after a quiet period.

use std::time::Duration;

use shared::protocol::ClientRequest;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct ActiveTypist {
    username: String,
    refreshed_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct TypingAggregator {
    active: Vec<ActiveTypist>,
}

impl TypingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the rendered typists changed. Refreshing an active
    /// user moves it to the end, so only a refresh of the last typist is
    /// invisible.
    pub fn set_typing(&mut self, username: &str, is_typing: bool, now: Instant) -> bool {
        let existing = self.active.iter().position(|t| t.username == username);
        match (is_typing, existing) {
            (true, Some(index)) => {
                let mut typist = self.active.remove(index);
                typist.refreshed_at = now;
                self.active.push(typist);
                index + 1 != self.active.len()
            }
            (true, None) => {
                self.active.push(ActiveTypist {
                    username: username.to_string(),
                    refreshed_at: now,
                });
                true
            }
            (false, Some(index)) => {
                self.active.remove(index);
                true
            }
            (false, None) => false,
        }
    }

    /// Earliest instant at which an entry goes stale under `ttl`.
    pub fn next_expiry(&self, ttl: Duration) -> Option<Instant> {
        self.active.iter().map(|t| t.refreshed_at + ttl).min()
    }

    /// Drops entries not refreshed within `ttl`; returns the removed names.
    pub fn expire(&mut self, now: Instant, ttl: Duration) -> Vec<String> {
        let (stale, fresh): (Vec<_>, Vec<_>) = self
            .active
            .drain(..)
            .partition(|t| t.refreshed_at + ttl <= now);
        self.active = fresh;
        stale.into_iter().map(|t| t.username).collect()
    }

    pub fn typists(&self) -> Vec<String> {
        self.active.iter().map(|t| t.username.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn indicator(&self) -> Option<String> {
        indicator_text(&self.typists())
    }
}

pub fn indicator_text(typists: &[String]) -> Option<String> {
    match typists {
        [] => None,
        [single] => Some(format!("{single} is typing")),
        many => Some(format!("{} are typing", many.join(", "))),
    }
}

/// Pending typing-stop for the local user. Every keystroke pushes the
/// deadline out; only the last one in a burst fires.
#[derive(Debug, Clone)]
pub struct TypingDebounce {
    window: Duration,
    typing: bool,
    deadline: Option<Instant>,
}

impl TypingDebounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            typing: false,
            deadline: None,
        }
    }

    /// Returns the typing-start intent on the not-typing → typing edge.
    pub fn keystroke(&mut self, now: Instant) -> Option<ClientRequest> {
        self.deadline = Some(now + self.window);
        if self.typing {
            return None;
        }
        self.typing = true;
        Some(ClientRequest::Typing { is_typing: true })
    }

    /// Returns the typing-stop intent once the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<ClientRequest> {
        match self.deadline {
            Some(deadline) if deadline <= now => self.stop(),
            _ => None,
        }
    }

    /// Stops immediately, e.g. when a message is sent.
    pub fn stop(&mut self) -> Option<ClientRequest> {
        self.deadline = None;
        if !self.typing {
            return None;
        }
        self.typing = false;
        Some(ClientRequest::Typing { is_typing: false })
    }

    /// Drops the pending stop without emitting anything.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.typing = false;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }
}

#[cfg(test)]
#[path = "tests/typing_tests.rs"]
mod tests;
