use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("Username must be between 3 and 20 characters (got {len})")]
    Length { len: usize },
    #[error("Username can only contain letters, numbers, and underscores")]
    Charset,
}

/// Payload of the server `error` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

impl ServerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid server frame: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode client request: {0}")]
    Encode(#[source] serde_json::Error),
}
