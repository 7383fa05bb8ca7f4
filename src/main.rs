use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matcha_server::{
    api::{create_router, AppState, RateLimiter},
    config::Config,
    db::{self, TokenRepository},
    error::AppError,
    services::mailer_from_config,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,matcha_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting Matcha server v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!("✅ Configuration loaded");

    // Connect and run migrations
    let db = db::connect(&config).await?;
    tracing::info!("✅ Database connected: {}", config.database_url);

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tracing::info!("✅ Upload directory ready: {}", config.upload_dir);

    let rate_limiter = Arc::new(RateLimiter::new(
        config.auth_rate_limit,
        config.auth_rate_window_secs,
    ));
    tracing::info!(
        "✅ Rate limiter configured ({} req / {}s per IP on credential routes)",
        config.auth_rate_limit,
        config.auth_rate_window_secs
    );

    let mailer = mailer_from_config(&config)?;
    tracing::info!("✅ Mailer ready ({})", mailer.transport());

    let state = AppState::new(db.clone(), config.clone(), mailer);

    // Spawn background task for token cleanup
    {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600)); // Every hour
            loop {
                interval.tick().await;
                match TokenRepository::cleanup_expired(&db_clone).await {
                    Ok(n) => tracing::debug!("🧹 {} expired tokens cleaned up", n),
                    Err(e) => tracing::error!("❌ Token cleanup failed: {}", e),
                }
            }
        });
        tracing::info!("✅ Token cleanup task started (runs hourly)");
    }

    // Spawn background task for rate limiter cleanup
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
            loop {
                interval.tick().await;
                limiter.cleanup().await;
                tracing::debug!("🧹 Rate limiter cache cleaned up");
            }
        });
        tracing::info!("✅ Rate limiter cleanup task started");
    }

    let app = create_router(state, rate_limiter);

    let addr = config.server_address();
    tracing::info!("🌐 Server listening on http://{}", addr);
    tracing::info!("🏥 Health check: http://{}/api/health", addr);
    tracing::info!("");
    tracing::info!("📚 API Endpoints:");
    tracing::info!("  POST /api/auth/register        - Register new user");
    tracing::info!("  POST /api/auth/login           - Login with username/password");
    tracing::info!("  GET  /api/auth/google          - Sign in with Google");
    tracing::info!("  GET  /api/profile/me           - Own profile (requires auth)");
    tracing::info!("  GET  /api/browsing             - Suggestions and search (requires auth)");
    tracing::info!("  POST /api/users/:id/like       - Like / unlike (requires auth)");
    tracing::info!("  GET  /api/chat/conversations   - Conversations (requires auth)");
    tracing::info!("  GET  /api/notifications        - Notifications (requires auth)");
    tracing::info!("  GET  /ws?token=<jwt>           - Realtime gateway");
    tracing::info!("");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
