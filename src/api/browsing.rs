use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::db::models::UserTag;
use crate::db::{ImageRepository, SocialRepository, TagRepository, UserRepository};
use crate::error::AppError;
use crate::matching::pipeline::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::matching::{browse, BrowseInput, BrowsePage, BrowseQuery, GenderMode, SortField, SortOrder};

#[derive(Debug, Default, Deserialize)]
pub struct BrowseParams {
    pub gender: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub max_distance: Option<f64>,
    pub min_fame: Option<f64>,
    pub max_fame: Option<f64>,
    pub tags: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl BrowseParams {
    pub fn into_query(self) -> BrowseQuery {
        let sort = SortField::parse(self.sort.as_deref());
        let tag_ids = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| raw.trim().parse::<i64>().ok())
            .collect();

        BrowseQuery {
            mode: GenderMode::from_param(self.gender.as_deref().map(str::trim).filter(|g| !g.is_empty())),
            sort,
            order: SortOrder::parse(self.order.as_deref(), sort),
            min_age: self.min_age,
            max_age: self.max_age,
            max_distance: self.max_distance,
            min_fame: self.min_fame,
            max_fame: self.max_fame,
            tag_ids,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// GET /api/browsing (requires auth)
pub async fn suggestions(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<BrowsePage>, AppError> {
    let viewer = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let users = UserRepository::list_verified_except(&state.db, user_id).await?;
    let blocked = SocialRepository::blocked_ids(&state.db, user_id).await?;

    let mut tags: HashMap<i64, Vec<UserTag>> = HashMap::new();
    for tag in TagRepository::all_user_tags(&state.db).await? {
        tags.entry(tag.user_id).or_default().push(tag);
    }

    // images come ordered profile picture first, so the first per user wins
    let mut profile_images: HashMap<i64, String> = HashMap::new();
    for image in ImageRepository::list_all(&state.db).await? {
        profile_images.entry(image.user_id).or_insert(image.file_path);
    }

    let now = chrono::Utc::now();
    let query = params.into_query();
    let page = browse(
        BrowseInput {
            viewer: &viewer,
            users,
            blocked: &blocked,
            tags: &tags,
            profile_images: &profile_images,
            now: now.timestamp(),
            today: now.date_naive(),
        },
        &query,
    );

    tracing::debug!(
        "🔎 User {} browsed ({}): {} results",
        user_id,
        page.mode,
        page.pagination.total
    );

    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let query = BrowseParams::default().into_query();
        assert_eq!(query.mode, GenderMode::Browsing);
        assert_eq!(query.sort, SortField::Distance);
        assert_eq!(query.order, SortOrder::Asc);
        assert_eq!((query.page, query.limit), (1, DEFAULT_PAGE_SIZE));
        assert!(query.tag_ids.is_empty());
    }

    #[test]
    fn test_params_parsing() {
        let query = BrowseParams {
            gender: Some("all".to_string()),
            sort: Some("fame_rating".to_string()),
            tags: Some("3, 7,x,".to_string()),
            page: Some(-4),
            limit: Some(500),
            ..BrowseParams::default()
        }
        .into_query();

        assert_eq!(query.mode, GenderMode::Search(None));
        assert_eq!(query.order, SortOrder::Desc);
        assert_eq!(query.tag_ids, vec![3, 7]);
        assert_eq!((query.page, query.limit), (1, MAX_PAGE_SIZE));
    }
}
