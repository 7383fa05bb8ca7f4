pub mod access;
pub mod auth;
pub mod browsing;
pub mod chat;
pub mod dates;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod state;
pub mod tags;
pub mod users;
pub mod ws;

pub use middleware::{CurrentUser, RateLimiter};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

pub fn create_router(state: AppState, rate_limiter: Arc<RateLimiter>) -> Router {
    let config = state.config.clone();

    // Credential endpoints, rate limited per IP
    let credentials = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route_layer(axum_middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit(limiter, req, next)
        }));

    let public = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/verify/:token", get(auth::verify_email))
        .route("/api/auth/google", get(auth::google_login))
        .route("/api/auth/google/callback", get(auth::google_callback))
        .route("/api/tags", get(tags::list_tags))
        .route("/ws", get(ws::ws_handler));

    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        // Profile
        .route("/api/profile/me", get(profile::get_my_profile))
        .route("/api/profile/update", put(profile::update_profile))
        .route("/api/profile/location", put(profile::update_location))
        .route(
            "/api/profile/images",
            post(profile::upload_image)
                .layer(DefaultBodyLimit::max(config.max_upload_bytes + 64 * 1024)),
        )
        .route("/api/profile/images/:id/profile", put(profile::set_profile_picture))
        .route("/api/profile/images/:id", delete(profile::delete_image))
        .route("/api/profile/visitors", get(profile::visitors))
        .route("/api/profile/likes", get(profile::likes))
        // Social graph
        .route("/api/users/:id", get(users::view_profile))
        .route("/api/users/:id/like", post(users::like_user))
        .route("/api/users/:id/block", post(users::block_user).delete(users::unblock_user))
        .route("/api/users/:id/report", post(users::report_user))
        // Browsing and tags
        .route("/api/browsing", get(browsing::suggestions))
        .route("/api/tags", post(tags::add_tags))
        .route("/api/tags/:id", delete(tags::remove_tag))
        // Chat
        .route("/api/chat/conversations", get(chat::conversations))
        .route("/api/chat/messages/:id", get(chat::get_messages).post(chat::send_message))
        .route("/api/chat/messages/:id/read", put(chat::mark_read))
        // Dates
        .route("/api/dates/:id", post(dates::propose_date))
        .route("/api/dates/:id/respond", put(dates::respond_to_date))
        .route("/api/dates/conversation/:id", get(dates::conversation_dates))
        // Notifications
        .route("/api/notifications", get(notifications::list_notifications))
        .route("/api/notifications/unread/count", get(notifications::unread_count))
        .route("/api/notifications/read-all", put(notifications::mark_all_read))
        .route("/api/notifications/:id/read", put(notifications::mark_read))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(credentials)
        .merge(public)
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
