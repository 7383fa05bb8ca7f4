use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::db::TagRepository;
use crate::error::AppError;

pub const MAX_TAG_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct TagSearch {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddTagsRequest {
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `#`-prefixed, lowercase, trimmed. Blank input yields `None`.
pub fn normalize_tag(raw: &str) -> Result<Option<String>, AppError> {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tag = format!("#{}", trimmed.to_lowercase());
    if tag.chars().count() > MAX_TAG_CHARS {
        return Err(AppError::BadRequest(format!(
            "Tag '{}' exceeds {} characters",
            tag, MAX_TAG_CHARS
        )));
    }
    Ok(Some(tag))
}

/// Normalize a batch, dropping blanks and duplicates while keeping order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>, AppError> {
    let mut tags: Vec<String> = Vec::new();
    for value in raw {
        if let Some(tag) = normalize_tag(value)? {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    Ok(tags)
}

/// GET /api/tags
pub async fn list_tags(
    State(state): State<AppState>,
    Query(search): Query<TagSearch>,
) -> Result<Json<Value>, AppError> {
    let q = search.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let tags = TagRepository::list(&state.db, q).await?;

    Ok(Json(json!({
        "count": tags.len(),
        "tags": tags,
    })))
}

/// POST /api/tags (requires auth)
pub async fn add_tags(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<AddTagsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let tags = normalize_tags(&req.tags)?;
    if tags.is_empty() {
        return Err(AppError::BadRequest("No tags provided".to_string()));
    }

    let mut added = Vec::new();
    let mut skipped = Vec::new();
    for name in tags {
        let tag = TagRepository::get_or_create(&state.db, &name).await?;
        if TagRepository::attach(&state.db, user_id, tag.id).await? {
            added.push(json!({"id": tag.id, "tag_name": tag.tag_name}));
        } else {
            skipped.push(tag.tag_name);
        }
    }

    let mut body = json!({
        "message": format!("{} tag(s) added", added.len()),
        "added_tags": added,
    });
    if !skipped.is_empty() {
        body["skipped_tags"] = json!(skipped);
    }

    Ok((StatusCode::CREATED, Json(body)))
}

/// DELETE /api/tags/:id (requires auth)
pub async fn remove_tag(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(tag_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let user_tag = TagRepository::find_user_tag(&state.db, user_id, tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found on your profile".to_string()))?;

    TagRepository::detach(&state.db, user_id, tag_id).await?;

    Ok(Json(json!({
        "message": format!("Tag {} removed", user_tag.tag_name),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("  Vegan ").unwrap().as_deref(), Some("#vegan"));
        assert_eq!(normalize_tag("#Geek").unwrap().as_deref(), Some("#geek"));
        assert_eq!(normalize_tag("   ").unwrap(), None);
        assert!(normalize_tag(&"x".repeat(MAX_TAG_CHARS)).is_err());
        assert!(normalize_tag(&"x".repeat(MAX_TAG_CHARS - 1)).is_ok());
    }

    #[test]
    fn test_normalize_tags_dedupes() {
        let raw = vec!["Travel".to_string(), "#travel".to_string(), "".to_string(), "music".to_string()];
        assert_eq!(normalize_tags(&raw).unwrap(), vec!["#travel", "#music"]);
    }
}
