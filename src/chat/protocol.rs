//! Wire messages for the lecture chat websocket. Inbound events form a
//! closed set dispatched in one place (see `ws.rs`); outbound events are
//! what members of a room can observe.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{chat::store::ChatMessage, users::SafeUser};

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    SendMessage { room_id: String, text: String },
    #[serde(rename_all = "camelCase")]
    FetchMessages {
        room_id: String,
        #[serde(default = "default_page")]
        page: u32,
        #[serde(default = "default_limit")]
        limit: u32,
    },
    #[serde(rename_all = "camelCase")]
    UserTyping { room_id: String, user_id: i64 },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping { room_id: String, user_id: i64 },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    ReceiveMessage {
        text: String,
        user: SafeUser,
        #[serde(with = "time::serde::rfc3339")]
        timestamp: OffsetDateTime,
    },
    LoadMessages { messages: Vec<ChatMessage> },
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: i64 },
    #[serde(rename_all = "camelCase")]
    UserStoppedTyping { user_id: i64 },
    Error { message: String },
}
