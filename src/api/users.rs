use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::access::{other_user, require_not_blocked};
use crate::api::middleware::CurrentUser;
use crate::api::profile::profile_json;
use crate::api::state::AppState;
use crate::db::models::NotificationKind;
use crate::db::{ImageRepository, SocialRepository, TagRepository};
use crate::error::AppError;
use crate::services::notify;

#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    #[serde(default = "default_like")]
    pub like: bool,
}

fn default_like() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    pub reason: Option<String>,
}

/// GET /api/users/:id (requires auth)
pub async fn view_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let user = other_user(&state.db, me, other_id, "Use /api/profile/me to view your own profile").await?;

    if SocialRepository::is_blocked_pair(&state.db, me, other_id).await? {
        return Err(AppError::Forbidden("User profile not available".to_string()));
    }

    let now = chrono::Utc::now();
    let visit_day = now.format("%Y-%m-%d").to_string();
    let visits_today = SocialRepository::record_visit(&state.db, me, other_id, &visit_day).await?;
    if visits_today == 1 {
        notify(&state.db, &state.hub, other_id, NotificationKind::Visit, Some(me)).await;
    }

    let images = ImageRepository::list_for_user(&state.db, other_id).await?;
    let tags = TagRepository::for_user(&state.db, other_id).await?;
    let liked_by_me = SocialRepository::has_liked(&state.db, me, other_id).await?;
    let liked_by_them = SocialRepository::has_liked(&state.db, other_id, me).await?;

    let mut profile = profile_json(&user, &images, &tags, now.timestamp());
    if let Some(fields) = profile.as_object_mut() {
        fields.insert("liked_by_me".to_string(), json!(liked_by_me));
        fields.insert("liked_by_them".to_string(), json!(liked_by_them));
        fields.insert("connected".to_string(), json!(liked_by_me && liked_by_them));
    }

    Ok(Json(profile))
}

/// POST /api/users/:id/like (requires auth)
pub async fn like_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
    Json(req): Json<LikeRequest>,
) -> Result<Json<Value>, AppError> {
    other_user(&state.db, me, other_id, "You cannot like yourself").await?;
    require_not_blocked(&state.db, me, other_id).await?;

    let (connected, fame_rating) = if req.like {
        if ImageRepository::count_for_user(&state.db, me).await? == 0 {
            return Err(AppError::Forbidden(
                "You need a profile picture to like users".to_string(),
            ));
        }

        let inserted = SocialRepository::add_like(&state.db, me, other_id).await?;
        let fame = refresh_fame(&state, other_id).await?;
        let connected = SocialRepository::has_liked(&state.db, other_id, me).await?;

        if inserted {
            if connected {
                notify(&state.db, &state.hub, other_id, NotificationKind::Match, Some(me)).await;
                notify(&state.db, &state.hub, me, NotificationKind::Match, Some(other_id)).await;
                tracing::info!("💞 Users {} and {} matched", me, other_id);
            } else {
                notify(&state.db, &state.hub, other_id, NotificationKind::Like, Some(me)).await;
            }
        }
        (connected, fame)
    } else {
        let was_connected = SocialRepository::are_connected(&state.db, me, other_id).await?;
        let removed = SocialRepository::remove_like(&state.db, me, other_id).await?;
        let fame = refresh_fame(&state, other_id).await?;

        if removed && was_connected {
            notify(&state.db, &state.hub, other_id, NotificationKind::Unlike, Some(me)).await;
        }
        (false, fame)
    };

    Ok(Json(json!({
        "message": if req.like { "User liked" } else { "User unliked" },
        "liked": req.like,
        "connected": connected,
        "fame_rating": fame_rating,
    })))
}

async fn refresh_fame(state: &AppState, user_id: i64) -> Result<f64, AppError> {
    let mut conn = state.db.acquire().await?;
    SocialRepository::refresh_fame(&mut *conn, user_id).await
}

/// POST /api/users/:id/block (requires auth)
pub async fn block_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    other_user(&state.db, me, other_id, "You cannot block yourself").await?;
    SocialRepository::block(&state.db, me, other_id).await?;

    tracing::info!("🚫 User {} blocked {}", me, other_id);
    Ok(Json(json!({"message": "User blocked"})))
}

/// DELETE /api/users/:id/block (requires auth)
pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    if !SocialRepository::unblock(&state.db, me, other_id).await? {
        return Err(AppError::NotFound("User is not blocked".to_string()));
    }

    Ok(Json(json!({"message": "User unblocked"})))
}

/// POST /api/users/:id/report (requires auth)
pub async fn report_user(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
    body: Option<Json<ReportRequest>>,
) -> Result<Json<Value>, AppError> {
    other_user(&state.db, me, other_id, "You cannot report yourself").await?;

    let Json(req) = body.unwrap_or_default();
    let reason = req
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let first = SocialRepository::report(&state.db, me, other_id, reason.as_deref()).await?;
    if first {
        tracing::warn!("🚩 User {} reported {} as a fake account", me, other_id);
    }

    Ok(Json(json!({
        "message": if first { "User reported" } else { "User already reported" },
    })))
}
