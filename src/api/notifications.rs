use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::db::NotificationRepository;
use crate::error::AppError;
use crate::services::notify::notification_message;

const LATEST_LIMIT: i64 = 50;

/// GET /api/notifications (requires auth)
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let rows = NotificationRepository::latest(&state.db, user_id, LATEST_LIMIT).await?;

    let notifications: Vec<Value> = rows
        .into_iter()
        .map(|n| {
            let name = n.from_first_name.as_deref().unwrap_or("Someone");
            json!({
                "id": n.id,
                "type": n.kind,
                "message": notification_message(n.kind, name),
                "is_read": n.is_read,
                "created_at": n.created_at,
                "from_user": n.from_id.map(|id| json!({
                    "id": id,
                    "username": n.from_username,
                    "first_name": n.from_first_name,
                })),
            })
        })
        .collect();

    Ok(Json(json!({ "notifications": notifications })))
}

/// GET /api/notifications/unread/count (requires auth)
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let count = NotificationRepository::unread_count(&state.db, user_id).await?;
    Ok(Json(json!({ "unread_count": count })))
}

/// PUT /api/notifications/:id/read (requires auth)
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(notification_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !NotificationRepository::mark_read(&state.db, notification_id, user_id).await? {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

/// PUT /api/notifications/read-all (requires auth)
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let count = NotificationRepository::mark_all_read(&state.db, user_id).await?;
    Ok(Json(json!({
        "message": "All notifications marked as read",
        "count": count,
    })))
}
