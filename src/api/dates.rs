use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::access::{other_user, require_connection};
use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::db::models::NotificationKind;
use crate::db::{DateProposal, DateProposalRepository, DateStatus};
use crate::error::AppError;
use crate::realtime::ServerEvent;
use crate::services::notify;

const MAX_LOCATION_CHARS: usize = 255;
const MAX_ACTIVITY_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ProposeDateRequest {
    pub date_time: Option<String>,
    pub location: Option<String>,
    pub activity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DateView {
    #[serde(flatten)]
    pub proposal: DateProposal,
    pub is_mine: bool,
}

/// RFC 3339, or naive ISO 8601 taken as UTC.
pub fn parse_date_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_status(raw: &str) -> Option<DateStatus> {
    match raw.trim().to_lowercase().as_str() {
        "accepted" => Some(DateStatus::Accepted),
        "declined" => Some(DateStatus::Declined),
        _ => None,
    }
}

/// POST /api/dates/:other_id (requires auth)
pub async fn propose_date(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
    Json(req): Json<ProposeDateRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(date_time), Some(location), Some(activity)) =
        (trimmed(req.date_time), trimmed(req.location), trimmed(req.activity))
    else {
        return Err(AppError::BadRequest(
            "date_time, location and activity are required".to_string(),
        ));
    };

    let when = parse_date_time(&date_time)
        .ok_or_else(|| AppError::BadRequest("Invalid date_time format".to_string()))?;
    if when <= Utc::now() {
        return Err(AppError::BadRequest("Date must be in the future".to_string()));
    }
    if location.chars().count() > MAX_LOCATION_CHARS {
        return Err(AppError::BadRequest(format!(
            "Location cannot exceed {} characters",
            MAX_LOCATION_CHARS
        )));
    }
    if activity.chars().count() > MAX_ACTIVITY_CHARS {
        return Err(AppError::BadRequest(format!(
            "Activity cannot exceed {} characters",
            MAX_ACTIVITY_CHARS
        )));
    }

    other_user(&state.db, me, other_id, "You cannot propose a date to yourself").await?;
    require_connection(&state.db, me, other_id).await?;

    let proposal = DateProposalRepository::create(
        &state.db,
        me,
        other_id,
        when.timestamp(),
        &location,
        &activity,
    )
    .await?;

    notify(&state.db, &state.hub, other_id, NotificationKind::DateProposal, Some(me)).await;
    state
        .hub
        .emit_to_user(other_id, ServerEvent::NewDateProposal(proposal.clone()))
        .await;

    tracing::info!("📅 User {} proposed date {} to {}", me, proposal.id, other_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Date proposal sent",
            "date_proposal": DateView { proposal, is_mine: true },
        })),
    ))
}

/// PUT /api/dates/:proposal_id/respond (requires auth)
pub async fn respond_to_date(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(proposal_id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Value>, AppError> {
    let status = req
        .status
        .as_deref()
        .and_then(parse_status)
        .ok_or_else(|| AppError::BadRequest("Status must be 'accepted' or 'declined'".to_string()))?;

    let proposal = DateProposalRepository::get(&state.db, proposal_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Date proposal not found".to_string()))?;

    if proposal.receiver_id != me {
        return Err(AppError::Forbidden(
            "Only the receiver can respond to this proposal".to_string(),
        ));
    }
    if proposal.status != DateStatus::Pending {
        return Err(AppError::BadRequest("Date proposal already answered".to_string()));
    }

    let updated = DateProposalRepository::respond(&state.db, proposal_id, status)
        .await?
        .ok_or_else(|| AppError::BadRequest("Date proposal already answered".to_string()))?;

    let kind = match status {
        DateStatus::Accepted => NotificationKind::DateAccepted,
        _ => NotificationKind::DateDeclined,
    };
    notify(&state.db, &state.hub, updated.sender_id, kind, Some(me)).await;
    state
        .hub
        .emit_to_user(updated.sender_id, ServerEvent::DateProposalUpdated(updated.clone()))
        .await;

    Ok(Json(json!({
        "message": "Response recorded",
        "date_proposal": DateView { proposal: updated, is_mine: false },
    })))
}

/// GET /api/dates/conversation/:other_id (requires auth)
pub async fn conversation_dates(
    State(state): State<AppState>,
    Extension(CurrentUser(me)): Extension<CurrentUser>,
    Path(other_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    require_connection(&state.db, me, other_id).await?;

    let proposals: Vec<DateView> = DateProposalRepository::between(&state.db, me, other_id)
        .await?
        .into_iter()
        .map(|proposal| DateView {
            is_mine: proposal.sender_id == me,
            proposal,
        })
        .collect();

    Ok(Json(json!({ "date_proposals": proposals })))
}
