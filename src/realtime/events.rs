use serde::{Deserialize, Serialize};

use crate::db::models::{DateProposal, Message, NotificationKind};

/// Frames pushed to clients, serialized as `{"event": .., "data": {..}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { user_id: i64 },
    NewMessage(Message),
    MessageSent(Message),
    UserTyping { user_id: i64, is_typing: bool },
    Notification(NotificationPayload),
    NewDateProposal(DateProposal),
    DateProposalUpdated(DateProposal),
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub from_user_id: Option<i64>,
    pub message: String,
}

/// Frames accepted from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage { receiver_id: i64, content: String },
    Typing {
        receiver_id: i64,
        #[serde(default)]
        is_typing: bool,
    },
}
