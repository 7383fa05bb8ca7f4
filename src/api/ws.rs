use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::chat::deliver_message;
use crate::api::middleware::authenticate;
use crate::api::state::AppState;
use crate::db::UserRepository;
use crate::error::AppError;
use crate::realtime::{ClientEvent, ServerEvent};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws?token=<jwt>
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let token = params
        .token
        .ok_or_else(|| AppError::Auth("Token is missing".to_string()))?;
    let claims = authenticate(&state, &token).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(state, claims.user_id, socket)))
}

async fn handle_socket(state: AppState, user_id: i64, socket: WebSocket) {
    let (conn_id, mut events) = state.hub.register(user_id).await;
    if let Err(e) = UserRepository::touch_last_online(&state.db, user_id).await {
        tracing::warn!("⚠️ Could not update last_online for {}: {}", user_id, e);
    }
    tracing::info!(
        "🔌 User {} connected ({}), {} live",
        user_id,
        conn_id,
        state.hub.connection_count().await
    );

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("❌ Failed to encode event: {}", e);
                    continue;
                }
            };
            if sink.send(WsMessage::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    state
        .hub
        .emit_to_connection(conn_id, ServerEvent::Connected { user_id })
        .await;

    while let Some(Ok(frame)) = stream.next().await {
        match frame {
            WsMessage::Text(text) => handle_frame(&state, user_id, conn_id, &text).await,
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    state.hub.unregister(conn_id).await;
    writer.abort();
    if let Err(e) = UserRepository::touch_last_online(&state.db, user_id).await {
        tracing::warn!("⚠️ Could not update last_online for {}: {}", user_id, e);
    }
    tracing::info!(
        "🔌 User {} disconnected ({}), {} live",
        user_id,
        conn_id,
        state.hub.connection_count().await
    );
}

async fn handle_frame(state: &AppState, user_id: i64, conn_id: Uuid, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(_) => {
            reply_error(state, conn_id, "Unknown or malformed event".to_string()).await;
            return;
        }
    };

    match event {
        ClientEvent::SendMessage { receiver_id, content } => {
            match deliver_message(state, user_id, receiver_id, &content).await {
                Ok(message) => {
                    state
                        .hub
                        .emit_to_connection(conn_id, ServerEvent::MessageSent(message))
                        .await;
                }
                Err(e) => reply_error(state, conn_id, error_text(&e)).await,
            }
        }
        ClientEvent::Typing { receiver_id, is_typing } => {
            state
                .hub
                .emit_to_user(receiver_id, ServerEvent::UserTyping { user_id, is_typing })
                .await;
        }
    }
}

fn error_text(err: &AppError) -> String {
    match err {
        AppError::Database(_) => "Database error".to_string(),
        AppError::Auth(msg) => msg.clone(),
        other => other.to_string(),
    }
}

async fn reply_error(state: &AppState, conn_id: Uuid, message: String) {
    state
        .hub
        .emit_to_connection(conn_id, ServerEvent::Error { message })
        .await;
}
