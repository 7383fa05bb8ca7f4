use std::sync::OnceLock;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    Extension, Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::middleware::{authenticate, bearer_token, CurrentUser};
use crate::api::state::AppState;
use crate::crypto::{generate_salt, generate_token, hash_password, jwt, validate_password, verify_password};
use crate::db::{NewUser, TokenKind, TokenRepository, UserRepository};
use crate::error::AppError;
use crate::services::google;
use crate::services::mailer::{password_reset_mail, verification_mail};

const VERIFICATION_TTL_SECS: i64 = 24 * 3600;
const RESET_TTL_SECS: i64 = 3600;
const OAUTH_STATE_TTL_SECS: i64 = 600;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub verification_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserIdentity,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Validate and sanitize username
fn validate_username(username: &str) -> Result<String, AppError> {
    let trimmed = username.trim();

    if trimmed.len() < 3 || trimmed.len() > 32 {
        return Err(AppError::BadRequest("Username must be 3-32 characters".to_string()));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::BadRequest(
            "Username must be alphanumeric, underscore, or hyphen".to_string(),
        ));
    }

    Ok(trimmed.to_string())
}

fn required(field: Option<String>) -> Option<String> {
    field.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let (Some(email), Some(username), Some(first_name), Some(last_name), Some(password)) = (
        required(req.email),
        required(req.username),
        required(req.first_name),
        required(req.last_name),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    let email = email.to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email format".to_string()));
    }
    let username = validate_username(&username)?;
    validate_password(&password)?;

    if UserRepository::username_or_email_taken(&state.db, &username, &email).await? {
        return Err(AppError::Conflict("Username or email already exists".to_string()));
    }

    let salt = generate_salt();
    let password_hash = hash_password(&password, &salt)?;

    let user = UserRepository::create(
        &state.db,
        NewUser {
            username: &username,
            email: &email,
            first_name: &first_name,
            last_name: &last_name,
            password_hash: &password_hash,
            password_salt: &salt,
            is_verified: false,
        },
    )
    .await?;

    let token = generate_token();
    let expires_at = chrono::Utc::now().timestamp() + VERIFICATION_TTL_SECS;
    TokenRepository::create(&state.db, Some(user.id), &token, TokenKind::Verification, expires_at).await?;

    let mail = verification_mail(&state.config, &user.email, &user.first_name, &token);
    if let Err(e) = state.mailer.send(mail).await {
        tracing::warn!("⚠️ Failed to send verification email to {}: {}", user.email, e);
    }

    tracing::info!("👤 Registered user {} ({})", user.username, user.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please verify your email.".to_string(),
            verification_token: token,
        }),
    ))
}

/// GET /api/auth/verify/:token
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = TokenRepository::find(&state.db, &token, TokenKind::Verification)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid verification token".to_string()))?;

    if record.expires_at <= chrono::Utc::now().timestamp() {
        return Err(AppError::BadRequest("Verification token expired".to_string()));
    }

    let user_id = record
        .user_id
        .ok_or_else(|| AppError::BadRequest("Invalid verification token".to_string()))?;
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid verification token".to_string()))?;

    TokenRepository::delete(&state.db, &token).await?;

    if user.is_verified {
        return Ok(Json(json!({"message": "Account already verified"})));
    }

    UserRepository::set_verified(&state.db, user.id, true).await?;
    tracing::info!("✅ User {} verified their email", user.id);

    Ok(Json(json!({"message": "Email verified successfully"})))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (Some(username), Some(password)) = (required(req.username), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(AppError::BadRequest("Username and password required".to_string()));
    };

    let invalid = || AppError::Auth("Invalid username or password".to_string());

    let user = UserRepository::get_by_username(&state.db, &username)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&password, &user.password_hash, &user.password_salt)? {
        return Err(invalid());
    }

    if !user.is_verified {
        return Err(AppError::Forbidden(
            "Account not verified. Please check your email.".to_string(),
        ));
    }

    UserRepository::touch_last_online(&state.db, user.id).await?;

    let token = jwt::encode(
        &state.config.jwt_secret,
        user.id,
        chrono::Utc::now().timestamp(),
        state.config.jwt_expiration_hours,
    )?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        user: UserIdentity {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    }))
}

/// POST /api/auth/logout (requires auth)
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let token = bearer_token(&headers)?;
    let claims = authenticate(&state, token).await?;

    TokenRepository::create(&state.db, Some(claims.user_id), token, TokenKind::Blacklist, claims.exp).await?;

    Ok(Json(json!({"message": "Logged out successfully"})))
}

/// GET /api/auth/me (requires auth)
pub async fn me(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = UserRepository::get_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "is_verified": user.is_verified,
    })))
}

/// POST /api/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let email = required(req.email)
        .ok_or_else(|| AppError::BadRequest("Email is required".to_string()))?
        .to_lowercase();

    if let Some(user) = UserRepository::get_by_email(&state.db, &email).await? {
        let token = generate_token();
        let expires_at = chrono::Utc::now().timestamp() + RESET_TTL_SECS;
        TokenRepository::create(&state.db, Some(user.id), &token, TokenKind::Reset, expires_at).await?;

        let mail = password_reset_mail(&state.config, &user.email, &user.first_name, &token);
        if let Err(e) = state.mailer.send(mail).await {
            tracing::warn!("⚠️ Failed to send reset email to {}: {}", user.email, e);
        }
    }

    Ok(Json(json!({
        "message": "If an account with that email exists, a password reset link has been sent."
    })))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (Some(token), Some(password)) = (required(req.token), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(AppError::BadRequest("Token and password required".to_string()));
    };

    validate_password(&password)?;

    let record = TokenRepository::consume(&state.db, &token, TokenKind::Reset)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;
    let user_id = record
        .user_id
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    let salt = generate_salt();
    let password_hash = hash_password(&password, &salt)?;
    UserRepository::update_password(&state.db, user_id, &password_hash, &salt).await?;

    tracing::info!("🔑 Password reset for user {}", user_id);

    Ok(Json(json!({"message": "Password has been reset successfully"})))
}

/// GET /api/auth/google
pub async fn google_login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let oauth_state = generate_token();
    let url = google::authorize_url(&state.config, &oauth_state)?;

    let expires_at = chrono::Utc::now().timestamp() + OAUTH_STATE_TTL_SECS;
    TokenRepository::create(&state.db, None, &oauth_state, TokenKind::OauthState, expires_at).await?;

    Ok(Redirect::temporary(&url))
}

/// GET /api/auth/google/callback
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Redirect, AppError> {
    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("Google sign-in failed: {}", error)));
    }
    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Err(AppError::BadRequest("Missing code or state".to_string()));
    };

    TokenRepository::consume(&state.db, &oauth_state, TokenKind::OauthState)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired OAuth state".to_string()))?;

    let profile = google::fetch_profile(&state.http, &state.config, &code).await?;
    let email = profile.email.trim().to_lowercase();

    let user = match UserRepository::get_by_email(&state.db, &email).await? {
        Some(user) => {
            if !user.is_verified {
                UserRepository::set_verified(&state.db, user.id, true).await?;
            }
            user
        }
        None => {
            let username = unused_username(&state, &google::username_base(&email)).await?;
            let salt = generate_salt();
            let password_hash = hash_password(&generate_token(), &salt)?;
            let first_name = profile.given_name.unwrap_or_else(|| username.clone());
            let last_name = profile.family_name.unwrap_or_default();

            let user = UserRepository::create(
                &state.db,
                NewUser {
                    username: &username,
                    email: &email,
                    first_name: &first_name,
                    last_name: &last_name,
                    password_hash: &password_hash,
                    password_salt: &salt,
                    is_verified: true,
                },
            )
            .await?;
            tracing::info!("👤 Registered user {} ({}) through Google", user.username, user.id);
            user
        }
    };

    UserRepository::touch_last_online(&state.db, user.id).await?;
    let token = jwt::encode(
        &state.config.jwt_secret,
        user.id,
        chrono::Utc::now().timestamp(),
        state.config.jwt_expiration_hours,
    )?;

    Ok(Redirect::temporary(&format!(
        "{}/oauth/callback?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    )))
}

async fn unused_username(state: &AppState, base: &str) -> Result<String, AppError> {
    use rand::Rng;

    if UserRepository::get_by_username(&state.db, base).await?.is_none() {
        return Ok(base.to_string());
    }
    loop {
        let candidate = format!("{}{}", base, rand::thread_rng().gen_range(1000..100_000));
        if UserRepository::get_by_username(&state.db, &candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
}
