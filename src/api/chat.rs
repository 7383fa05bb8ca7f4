use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::access::{other_user, require_connection};
use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::db::models::{Message, NotificationKind};
use crate::db::{MessageRepository, SocialRepository};
use crate::error::AppError;
use crate::matching::pipeline::is_online;
use crate::realtime::ServerEvent;
use crate::services::notify;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub before_id: Option<i64>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    #[serde(flatten)]
    pub message: Message,
    pub is_mine: bool,
}

#[derive(Debug, Serialize)]
pub struct ConversationPeer {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_image: Option<String>,
    pub is_online: bool,
}

#[derive(Debug, Serialize)]
pub struct LastMessage {
    pub content: String,
    pub created_at: i64,
    pub is_mine: bool,
}

#[derive(Debug, Serialize)]
pub struct Conversation {
    pub user: ConversationPeer,
    pub last_message: Option<LastMessage>,
    pub unread_count: i64,
}

/// Trimmed content, 1 to 2000 characters.
pub fn clean_content(raw: &str) -> Result<String, AppError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message content cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(content.to_string())
}

/// Validate, persist and deliver a chat message. Shared by HTTP and WebSocket.
pub async fn deliver_message(
    state: &AppState,
    sender_id: i64,
    receiver_id: i64,
    raw_content: &str,
) -> Result<Message, AppError> {
    let content = clean_content(raw_content)?;
    other_user(&state.db, sender_id, receiver_id, "Cannot send message to yourself").await?;
    require_connection(&state.db, sender_id, receiver_id).await?;

    let message = MessageRepository::create(&state.db, sender_id, receiver_id, &content).await?;

    state
        .hub
        .emit_to_user(receiver_id, ServerEvent::NewMessage(message.clone()))
        .await;
    notify(&state.db, &state.hub, receiver_id, NotificationKind::Message, Some(sender_id)).await;

    tracing::debug!("💬 Message {} from {} to {}", message.id, sender_id, receiver_id);
    Ok(message)
}

/// GET /api/chat/conversations (requires auth)
pub async fn conversations(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let now = chrono::Utc::now().timestamp();
    let peers = SocialRepository::connections(&state.db, user_id).await?;

    let mut conversations = Vec::with_capacity(peers.len());
    for peer in peers {
        let last = MessageRepository::last_between(&state.db, user_id, peer.id).await?;
        let unread_count = MessageRepository::unread_from(&state.db, peer.id, user_id).await?;

        conversations.push(Conversation {
            user: ConversationPeer {
                is_online: is_online(peer.last_online, now),
                id: peer.id,
                username: peer.username,
                first_name: peer.first_name,
                last_name: peer.last_name,
                profile_image: peer.profile_image,
            },
            last_message: last.map(|m| LastMessage {
                is_mine: m.sender_id == user_id,
                content: m.content,
                created_at: m.created_at,
            }),
            unread_count,
        });
    }

    // most recent first, silent conversations last
    conversations.sort_by_key(|c| {
        std::cmp::Reverse(c.last_message.as_ref().map(|m| m.created_at))
    });

    Ok(Json(json!({ "conversations": conversations })))
}

/// GET /api/chat/messages/:other_id (requires auth)
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let limit = query.limit.clamp(1, 100);
    require_connection(&state.db, user_id, other_id).await?;

    let mut messages =
        MessageRepository::between(&state.db, user_id, other_id, query.before_id, limit).await?;
    let has_more = messages.len() as i64 == limit;
    messages.reverse();

    MessageRepository::mark_read(&state.db, other_id, user_id).await?;

    let messages: Vec<ChatMessage> = messages
        .into_iter()
        .map(|message| ChatMessage {
            is_mine: message.sender_id == user_id,
            message,
        })
        .collect();

    Ok(Json(json!({
        "messages": messages,
        "has_more": has_more,
    })))
}

/// POST /api/chat/messages/:other_id (requires auth)
pub async fn send_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let content = req.content.unwrap_or_default();
    let message = deliver_message(&state, user_id, other_id, &content).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Message sent",
            "data": ChatMessage { message, is_mine: true },
        })),
    ))
}

/// PUT /api/chat/messages/:other_id/read (requires auth)
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = MessageRepository::mark_read(&state.db, other_id, user_id).await?;

    Ok(Json(json!({
        "message": "Messages marked as read",
        "count": count,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content("  hey  ").unwrap(), "hey");
        assert!(clean_content("   ").is_err());
        assert!(clean_content(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(clean_content(&"a".repeat(MAX_MESSAGE_CHARS + 1)).is_err());
    }
}
