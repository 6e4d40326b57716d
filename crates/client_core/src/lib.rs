//! Client-side session engine for a single-room group chat.
//!
//! Inbound server events flow from the [`transport`] into the
//! [`session`] actor, which folds them into the [`timeline`], [`typing`]
//! and [`roster`] state and publishes snapshots to subscribers.

pub mod config;
pub mod error;
pub mod roster;
pub mod session;
pub mod timeline;
pub mod transport;
pub mod typing;

pub use config::{load_settings, ClientSettings};
pub use error::{SessionError, TransportError};
pub use roster::{Roster, RosterEntry};
pub use session::{
    spawn_session, SessionCore, SessionEvent, SessionHandle, SessionSnapshot, SessionStatus,
};
pub use timeline::{ChatEntry, ChatMessage, EntryKey, Notification, Timeline};
pub use transport::{
    ConnectionId, Transport, TransportEvent, TransportEventKind, TransportLink, WsTransport,
};
pub use typing::{TypingAggregator, TypingDebounce};

use tokio::task::JoinHandle;

/// Spawns a session that talks to `settings.server_url` over a WebSocket.
pub fn connect_websocket_session(
    settings: &ClientSettings,
) -> Result<(SessionHandle, JoinHandle<()>), TransportError> {
    let transport = WsTransport::new(&settings.server_url)?;
    tracing::info!(url = %transport.url(), "websocket session created");
    Ok(spawn_session(settings, Box::new(transport)))
}
