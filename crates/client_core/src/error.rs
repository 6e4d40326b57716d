use shared::error::{UsernameError, WireError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),
    #[error("invalid message: {0}")]
    InvalidMessage(&'static str),
    #[error("join rejected: {0}")]
    Rejected(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("disconnected from server")]
    Disconnected,
    #[error("not connected to a server")]
    NotConnected,
    #[error("not joined to the chat")]
    NotJoined,
    #[error("already joined as {0}")]
    AlreadyJoined(String),
    #[error("session task is no longer running")]
    Closed,
}

impl SessionError {
    /// Errors raised before anything reaches the transport.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidUsername(_)
                | Self::InvalidMessage(_)
                | Self::NotConnected
                | Self::NotJoined
                | Self::AlreadyJoined(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("server url must start with http://, https://, ws:// or wss://: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("no open connection")]
    NotOpen,
}
