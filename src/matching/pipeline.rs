//! Browsing pipeline: candidate selection, enrichment, filtering, sorting and
//! pagination. Everything here is synchronous; the handler loads rows once and
//! hands them over.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::db::models::{Gender, SexualPreference, User, UserTag};
use crate::matching::geo::distance_between;
use crate::matching::orientation::is_compatible;

/// A user counts as online when seen within this many seconds.
pub const ONLINE_WINDOW_SECS: i64 = 300;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenderMode {
    /// Orientation-compatible candidates only.
    Browsing,
    /// Explicit search; `None` keeps every gender.
    Search(Option<Gender>),
}

impl GenderMode {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => GenderMode::Browsing,
            Some(value) => GenderMode::Search(Gender::parse(value)),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GenderMode::Browsing => "browsing",
            GenderMode::Search(_) => "search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Distance,
    Age,
    FameRating,
    CommonTags,
}

impl SortField {
    /// Unknown values fall back to distance.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("age") => SortField::Age,
            Some("fame_rating") => SortField::FameRating,
            Some("common_tags") => SortField::CommonTags,
            _ => SortField::Distance,
        }
    }

    pub fn default_order(self) -> SortOrder {
        match self {
            SortField::Distance => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>, field: SortField) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            Some("desc") => SortOrder::Desc,
            _ => field.default_order(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowseQuery {
    pub mode: GenderMode,
    pub sort: SortField,
    pub order: SortOrder,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub max_distance: Option<f64>,
    pub min_fame: Option<f64>,
    pub max_fame: Option<f64>,
    pub tag_ids: Vec<i64>,
    pub page: i64,
    pub limit: i64,
}

impl Default for BrowseQuery {
    fn default() -> Self {
        Self {
            mode: GenderMode::Browsing,
            sort: SortField::Distance,
            order: SortOrder::Asc,
            min_age: None,
            max_age: None,
            max_distance: None,
            min_fame: None,
            max_fame: None,
            tag_ids: Vec::new(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Rows the pipeline needs, loaded by the caller in bulk.
pub struct BrowseInput<'a> {
    pub viewer: &'a User,
    pub users: Vec<User>,
    pub blocked: &'a HashSet<i64>,
    pub tags: &'a HashMap<i64, Vec<UserTag>>,
    pub profile_images: &'a HashMap<i64, String>,
    pub now: i64,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    pub sexual_preference: Option<SexualPreference>,
    pub bio: Option<String>,
    pub fame_rating: f64,
    pub distance_km: f64,
    pub common_tags_count: usize,
    pub tags: Vec<String>,
    pub profile_image: Option<String>,
    pub is_online: bool,
    pub last_online: Option<i64>,
    #[serde(skip)]
    pub tag_ids: HashSet<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrowsePage {
    pub users: Vec<Candidate>,
    pub pagination: Pagination,
    pub mode: &'static str,
}

/// Whole years between `date_of_birth` (`YYYY-MM-DD`) and `today`.
pub fn age_on(date_of_birth: &str, today: NaiveDate) -> Option<i32> {
    let dob = NaiveDate::parse_from_str(date_of_birth, "%Y-%m-%d").ok()?;
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    Some(age)
}

pub fn is_online(last_online: Option<i64>, now: i64) -> bool {
    last_online.is_some_and(|seen| now - seen <= ONLINE_WINDOW_SECS)
}

fn passes_gender(mode: GenderMode, viewer: &User, candidate: &User) -> bool {
    match mode {
        GenderMode::Browsing => is_compatible(
            viewer.gender,
            viewer.sexual_preference,
            candidate.gender,
            candidate.sexual_preference,
        ),
        GenderMode::Search(None) => true,
        GenderMode::Search(Some(wanted)) => candidate.gender == Some(wanted),
    }
}

fn within<T: PartialOrd>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    let Some(value) = value else {
        return true;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn passes_filters(candidate: &Candidate, query: &BrowseQuery) -> bool {
    if !query.tag_ids.is_empty() && !query.tag_ids.iter().any(|id| candidate.tag_ids.contains(id)) {
        return false;
    }

    within(candidate.age, query.min_age, query.max_age)
        && within(Some(candidate.distance_km), None, query.max_distance)
        && within(Some(candidate.fame_rating), query.min_fame, query.max_fame)
}

fn sort_key(candidate: &Candidate, field: SortField) -> Option<f64> {
    match field {
        SortField::Distance => Some(candidate.distance_km),
        SortField::Age => candidate.age.map(f64::from),
        SortField::FameRating => Some(candidate.fame_rating),
        SortField::CommonTags => Some(candidate.common_tags_count as f64),
    }
}

/// Stable sort; missing values go last whatever the direction.
pub fn sort_candidates(candidates: &mut [Candidate], field: SortField, order: SortOrder) {
    candidates.sort_by(|a, b| match (sort_key(a, field), sort_key(b, field)) {
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

pub fn paginate<T>(items: Vec<T>, page: i64, limit: i64) -> (Vec<T>, Pagination) {
    let limit = limit.clamp(1, MAX_PAGE_SIZE);
    let page = page.max(1);
    let total = items.len() as i64;
    let pages = (total + limit - 1) / limit;
    // Pages past the end, however large, are empty.
    let start = (page - 1)
        .checked_mul(limit)
        .and_then(|start| usize::try_from(start).ok())
        .unwrap_or(usize::MAX);

    let slice = items.into_iter().skip(start).take(limit as usize).collect();
    (slice, Pagination { page, limit, total, pages })
}

/// Run the full pipeline for `input.viewer`.
pub fn browse(input: BrowseInput<'_>, query: &BrowseQuery) -> BrowsePage {
    let viewer = input.viewer;
    let viewer_tags: HashSet<i64> = input
        .tags
        .get(&viewer.id)
        .map(|tags| tags.iter().map(|t| t.tag_id).collect())
        .unwrap_or_default();

    let mut candidates: Vec<Candidate> = input
        .users
        .into_iter()
        .filter(|user| user.id != viewer.id && user.is_verified)
        .filter(|user| !input.blocked.contains(&user.id))
        .filter(|user| passes_gender(query.mode, viewer, user))
        .map(|user| {
            let user_tags = input.tags.get(&user.id).map(Vec::as_slice).unwrap_or(&[]);
            let tag_ids: HashSet<i64> = user_tags.iter().map(|t| t.tag_id).collect();
            let mut tags: Vec<String> = user_tags.iter().map(|t| t.tag_name.clone()).collect();
            tags.sort();

            Candidate {
                distance_km: distance_between(
                    (viewer.latitude, viewer.longitude),
                    (user.latitude, user.longitude),
                ),
                common_tags_count: tag_ids.intersection(&viewer_tags).count(),
                age: user.date_of_birth.as_deref().and_then(|dob| age_on(dob, input.today)),
                profile_image: input.profile_images.get(&user.id).cloned(),
                is_online: is_online(user.last_online, input.now),
                id: user.id,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                gender: user.gender,
                sexual_preference: user.sexual_preference,
                bio: user.bio,
                fame_rating: user.fame_rating,
                last_online: user.last_online,
                tags,
                tag_ids,
            }
        })
        .filter(|candidate| passes_filters(candidate, query))
        .collect();

    sort_candidates(&mut candidates, query.sort, query.order);
    let (users, pagination) = paginate(candidates, query.page, query.limit);

    BrowsePage {
        users,
        pagination,
        mode: query.mode.label(),
    }
}
