use std::net::SocketAddr;
use std::path::Path as FsPath;

use axum::{
    extract::{ConnectInfo, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::api::auth::is_valid_email;
use crate::api::middleware::CurrentUser;
use crate::api::state::AppState;
use crate::crypto::generate_token;
use crate::db::models::UserTag;
use crate::db::{
    Gender, Image, ImageRepository, ProfileChanges, SexualPreference, SocialRepository,
    TagRepository, TokenKind, TokenRepository, User, UserRepository,
};
use crate::error::AppError;
use crate::matching::pipeline::{age_on, is_online};
use crate::services::geolocation::{client_ip, locate_ip};
use crate::services::mailer::verification_mail;

pub const MAX_IMAGES_PER_USER: i64 = 5;
const MAX_BIO_CHARS: usize = 1000;
const MIN_AGE: i32 = 18;
const MAX_AGE: i32 = 120;

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Profile body shared by the own-profile and profile-view endpoints.
pub fn profile_json(user: &User, images: &[Image], tags: &[UserTag], now: i64) -> Value {
    let today = chrono::DateTime::from_timestamp(now, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_default();

    json!({
        "id": user.id,
        "username": user.username,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "bio": user.bio,
        "gender": user.gender,
        "sexual_preference": user.sexual_preference,
        "date_of_birth": user.date_of_birth,
        "age": user.date_of_birth.as_deref().and_then(|dob| age_on(dob, today)),
        "location": {
            "latitude": user.latitude,
            "longitude": user.longitude,
            "source": user.location_source,
        },
        "fame_rating": user.fame_rating,
        "is_online": is_online(user.last_online, now),
        "last_online": user.last_online,
        "created_at": user.created_at,
        "images": images,
        "tags": tags.iter().map(|t| json!({"id": t.tag_id, "tag_name": t.tag_name})).collect::<Vec<_>>(),
    })
}

/// GET /api/profile/me (requires auth)
pub async fn get_my_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let images = ImageRepository::list_for_user(&state.db, user_id).await?;
    let tags = TagRepository::for_user(&state.db, user_id).await?;

    let mut profile = profile_json(&user, &images, &tags, chrono::Utc::now().timestamp());
    if let Some(fields) = profile.as_object_mut() {
        fields.insert("email".to_string(), json!(user.email));
        fields.insert("is_verified".to_string(), json!(user.is_verified));
    }

    Ok(Json(profile))
}

fn string_field(data: &Map<String, Value>, key: &str) -> Option<Option<String>> {
    data.get(key).map(|v| {
        v.as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Turn a raw update body into validated changes. Blank names are ignored;
/// null or blank `bio` and `date_of_birth` clear the column.
pub fn parse_profile_changes(data: &Map<String, Value>, today: NaiveDate) -> Result<ProfileChanges, AppError> {
    let mut changes = ProfileChanges::default();

    changes.first_name = string_field(data, "first_name").flatten();
    changes.last_name = string_field(data, "last_name").flatten();

    if let Some(Some(email)) = string_field(data, "email") {
        let email = email.to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::BadRequest("Invalid email format".to_string()));
        }
        changes.email = Some(email);
    }

    if let Some(bio) = string_field(data, "bio") {
        if bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_CHARS) {
            return Err(AppError::BadRequest(format!(
                "Bio cannot exceed {} characters",
                MAX_BIO_CHARS
            )));
        }
        changes.bio = Some(bio);
    }

    if let Some(Some(gender)) = string_field(data, "gender") {
        changes.gender = Some(Gender::parse(&gender).ok_or_else(|| {
            AppError::BadRequest("Invalid gender. Must be one of: Male, Female".to_string())
        })?);
    }

    if let Some(Some(preference)) = string_field(data, "sexual_preference") {
        changes.sexual_preference = Some(SexualPreference::parse(&preference).ok_or_else(|| {
            AppError::BadRequest(
                "Invalid sexual preference. Must be one of: Straight, Gay, Bisexual".to_string(),
            )
        })?);
    }

    if let Some(dob) = string_field(data, "date_of_birth") {
        changes.date_of_birth = Some(match dob {
            None => None,
            Some(raw) => {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    AppError::BadRequest("Invalid date format. Use YYYY-MM-DD".to_string())
                })?;
                let age = age_on(&raw, today).unwrap_or_default();
                if age < MIN_AGE {
                    return Err(AppError::BadRequest("You must be at least 18 years old".to_string()));
                }
                if age > MAX_AGE {
                    return Err(AppError::BadRequest("Invalid date of birth".to_string()));
                }
                Some(raw)
            }
        });
    }

    Ok(changes)
}

/// PUT /api/profile/update (requires auth)
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(data): Json<Map<String, Value>>,
) -> Result<Json<Value>, AppError> {
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let mut changes = parse_profile_changes(&data, chrono::Utc::now().date_naive())?;

    if changes.email.as_deref() == Some(user.email.as_str()) {
        changes.email = None;
    }
    if let Some(email) = &changes.email {
        if UserRepository::email_taken_by_other(&state.db, email, user_id).await? {
            return Err(AppError::Conflict("Email already in use".to_string()));
        }
    }

    if changes.is_empty() {
        return Err(AppError::BadRequest("No valid fields to update".to_string()));
    }

    UserRepository::update_profile(&state.db, user_id, &changes).await?;

    // a new address has to be confirmed again
    if let Some(email) = &changes.email {
        let token = generate_token();
        let expires_at = chrono::Utc::now().timestamp() + 24 * 3600;
        TokenRepository::create(&state.db, Some(user_id), &token, TokenKind::Verification, expires_at).await?;

        let first_name = changes.first_name.as_deref().unwrap_or(&user.first_name);
        if let Err(e) = state.mailer.send(verification_mail(&state.config, email, first_name, &token)).await {
            tracing::warn!("⚠️ Failed to send verification email to {}: {}", email, e);
        }
    }

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "updated_fields": changes.field_names(),
    })))
}

/// PUT /api/profile/location (requires auth)
pub async fn update_location(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Option<Json<LocationRequest>>,
) -> Result<Json<Value>, AppError> {
    let (latitude, longitude) = body
        .map(|Json(req)| (req.latitude, req.longitude))
        .unwrap_or((None, None));

    let (latitude, longitude, source) = match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AppError::BadRequest("Latitude must be between -90 and 90".to_string()));
            }
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AppError::BadRequest("Longitude must be between -180 and 180".to_string()));
            }
            (lat, lon, "gps")
        }
        (None, None) => {
            let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));
            let (lat, lon) = locate_ip(&state.http, &state.config.geoip_url, ip).await?;
            (lat, lon, "ip")
        }
        _ => {
            return Err(AppError::BadRequest(
                "Both latitude and longitude are required".to_string(),
            ))
        }
    };

    UserRepository::update_location(&state.db, user_id, latitude, longitude, source).await?;
    tracing::debug!("📍 User {} located via {}", user_id, source);

    Ok(Json(json!({
        "message": "Location updated successfully",
        "location": {
            "latitude": latitude,
            "longitude": longitude,
            "source": source,
        },
    })))
}

/// Image format from magic bytes, as `(mime, extension)`.
pub fn sniff_image(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(("image/jpeg", "jpg"))
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(("image/png", "png"))
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some(("image/gif", "gif"))
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(("image/webp", "webp"))
    } else {
        None
    }
}

fn declared_type_allowed(content_type: Option<&str>) -> bool {
    matches!(
        content_type,
        Some("image/jpeg" | "image/jpg" | "image/png" | "image/gif" | "image/webp")
    )
}

/// POST /api/profile/images (requires auth)
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) =
        upload.ok_or_else(|| AppError::BadRequest("No image file provided".to_string()))?;

    if bytes.is_empty() {
        return Err(AppError::BadRequest("No image file provided".to_string()));
    }
    if bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {} bytes",
            state.config.max_upload_bytes
        )));
    }
    let (_, extension) = match (declared_type_allowed(content_type.as_deref()), sniff_image(&bytes)) {
        (true, Some(kind)) => kind,
        _ => {
            return Err(AppError::BadRequest(
                "Invalid file type. Allowed: jpeg, png, gif, webp".to_string(),
            ))
        }
    };

    let too_many = || AppError::BadRequest(format!("Maximum {} images allowed", MAX_IMAGES_PER_USER));
    if ImageRepository::count_for_user(&state.db, user_id).await? >= MAX_IMAGES_PER_USER {
        return Err(too_many());
    }

    let filename = format!("{}.{}", uuid::Uuid::new_v4(), extension);
    let disk_path = FsPath::new(&state.config.upload_dir).join(&filename);
    tokio::fs::create_dir_all(&state.config.upload_dir).await?;
    tokio::fs::write(&disk_path, &bytes).await?;

    // A concurrent upload may have taken the last slot since the check above.
    let inserted = ImageRepository::create_within_limit(
        &state.db,
        user_id,
        &format!("/uploads/{}", filename),
        MAX_IMAGES_PER_USER,
    )
    .await;
    let image = match inserted {
        Ok(Some(image)) => image,
        Ok(None) => {
            remove_upload(&disk_path).await;
            return Err(too_many());
        }
        Err(e) => {
            remove_upload(&disk_path).await;
            return Err(e);
        }
    };
    tracing::debug!("🖼️ User {} uploaded image {}", user_id, image.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Image uploaded successfully",
            "image": image,
        })),
    ))
}

async fn remove_upload(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!("⚠️ Could not remove orphaned upload {}: {}", path.display(), e);
    }
}

/// PUT /api/profile/images/:id/profile (requires auth)
pub async fn set_profile_picture(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(image_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    ImageRepository::get_owned(&state.db, image_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    ImageRepository::set_profile_picture(&state.db, image_id, user_id).await?;

    Ok(Json(json!({"message": "Profile picture updated"})))
}

/// DELETE /api/profile/images/:id (requires auth)
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(image_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let image = ImageRepository::get_owned(&state.db, image_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    ImageRepository::delete(&state.db, &image).await?;

    if let Some(filename) = image.file_path.strip_prefix("/uploads/") {
        let path = FsPath::new(&state.config.upload_dir).join(filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("⚠️ Could not remove {}: {}", path.display(), e);
        }
    }

    Ok(Json(json!({"message": "Image deleted successfully"})))
}

/// GET /api/profile/visitors (requires auth)
pub async fn visitors(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let now = chrono::Utc::now().timestamp();
    let rows = SocialRepository::visitors(&state.db, user_id).await?;

    let visitors: Vec<Value> = rows
        .into_iter()
        .map(|v| {
            json!({
                "id": v.id,
                "username": v.username,
                "first_name": v.first_name,
                "last_name": v.last_name,
                "profile_image": v.profile_image,
                "is_online": is_online(v.last_online, now),
                "visit_count": v.visit_count,
                "last_visit": v.last_visit,
            })
        })
        .collect();

    Ok(Json(json!({ "count": visitors.len(), "visitors": visitors })))
}

/// GET /api/profile/likes (requires auth)
pub async fn likes(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Value>, AppError> {
    let now = chrono::Utc::now().timestamp();
    let rows = SocialRepository::likers(&state.db, user_id).await?;

    let likes: Vec<Value> = rows
        .into_iter()
        .map(|u| {
            json!({
                "id": u.id,
                "username": u.username,
                "first_name": u.first_name,
                "last_name": u.last_name,
                "profile_image": u.profile_image,
                "is_online": is_online(u.last_online, now),
            })
        })
        .collect();

    Ok(Json(json!({ "count": likes.len(), "likes": likes })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_blank_names_ignored() {
        let changes = parse_profile_changes(&body(json!({"first_name": "  ", "last_name": " Doe "})), today()).unwrap();
        assert_eq!(changes.first_name, None);
        assert_eq!(changes.last_name.as_deref(), Some("Doe"));
        assert_eq!(changes.field_names(), vec!["last_name"]);
    }

    #[test]
    fn test_nullable_fields_clear() {
        let changes = parse_profile_changes(&body(json!({"bio": null, "date_of_birth": ""})), today()).unwrap();
        assert_eq!(changes.bio, Some(None));
        assert_eq!(changes.date_of_birth, Some(None));
    }

    #[test]
    fn test_enum_validation() {
        let changes = parse_profile_changes(
            &body(json!({"gender": "Female", "sexual_preference": "Bisexual"})),
            today(),
        )
        .unwrap();
        assert_eq!(changes.gender, Some(Gender::Female));
        assert_eq!(changes.sexual_preference, Some(SexualPreference::Bisexual));

        assert!(parse_profile_changes(&body(json!({"gender": "robot"})), today()).is_err());
        assert!(parse_profile_changes(&body(json!({"sexual_preference": "pan"})), today()).is_err());
    }

    #[test]
    fn test_date_of_birth_rules() {
        let ok = parse_profile_changes(&body(json!({"date_of_birth": "2006-06-15"})), today()).unwrap();
        assert_eq!(ok.date_of_birth, Some(Some("2006-06-15".to_string())));

        assert!(parse_profile_changes(&body(json!({"date_of_birth": "2006-06-16"})), today()).is_err());
        assert!(parse_profile_changes(&body(json!({"date_of_birth": "1900-01-01"})), today()).is_err());
        assert!(parse_profile_changes(&body(json!({"date_of_birth": "15/06/1990"})), today()).is_err());
    }

    #[test]
    fn test_invalid_email() {
        assert!(parse_profile_changes(&body(json!({"email": "nope"})), today()).is_err());
        let changes = parse_profile_changes(&body(json!({"email": "Ann@Example.com"})), today()).unwrap();
        assert_eq!(changes.email.as_deref(), Some("ann@example.com"));
    }

    #[test]
    fn test_sniff_image() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(("image/jpeg", "jpg")));
        assert_eq!(sniff_image(b"GIF89a...."), Some(("image/gif", "gif")));
        assert_eq!(sniff_image(b"RIFF\0\0\0\0WEBPVP8 "), Some(("image/webp", "webp")));
        assert_eq!(sniff_image(b"<?php echo"), None);
    }
}
