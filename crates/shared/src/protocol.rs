//! Named events exchanged with the chat server.
//!
//! Every frame is a JSON object `{"type": <event name>, "payload": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::{domain::WireTimestamp, error::ServerError, error::WireError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientRequest {
    Join(String),
    ChatMessage {
        message: String,
    },
    Typing {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

impl ClientRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::ChatMessage { .. } => "chatMessage",
            Self::Typing { .. } => "typing",
        }
    }

    pub fn encode(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub username: String,
    pub message: String,
    pub timestamp: WireTimestamp,
}

impl MessageData {
    /// Server-assigned id; the document id wins over the numeric one.
    pub fn message_id(&self) -> Option<String> {
        self.object_id
            .clone()
            .or_else(|| self.id.map(|id| id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub message: String,
    pub timestamp: WireTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingData {
    pub username: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    Join(JoinResult),
    Message(MessageData),
    MessageHistory(Vec<MessageData>),
    UserJoined(NotificationData),
    UserLeft(NotificationData),
    UpdateUsersList(Vec<String>),
    UserTyping(TypingData),
    Error(ServerError),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Message(_) => "message",
            Self::MessageHistory(_) => "messageHistory",
            Self::UserJoined(_) => "userJoined",
            Self::UserLeft(_) => "userLeft",
            Self::UpdateUsersList(_) => "updateUsersList",
            Self::UserTyping(_) => "userTyping",
            Self::Error(_) => "error",
        }
    }

    pub fn decode(frame: &str) -> Result<Self, WireError> {
        serde_json::from_str(frame).map_err(WireError::Decode)
    }
}
