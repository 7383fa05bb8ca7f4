use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::api::state::AppState;
use crate::crypto::{jwt, Claims};
use crate::db::TokenRepository;
use crate::error::AppError;

/// Authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Token is missing".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid Authorization format".to_string()))
}

/// Verify signature, expiry and blacklist of a JWT.
pub async fn authenticate(state: &AppState, token: &str) -> Result<Claims, AppError> {
    let claims = jwt::decode(&state.config.jwt_secret, token, chrono::Utc::now().timestamp())?;

    if TokenRepository::is_blacklisted(&state.db, token).await? {
        return Err(AppError::Auth("Token has been revoked".to_string()));
    }

    Ok(claims)
}

/// Authentication middleware - validates bearer JWTs
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let claims = authenticate(&state, token).await?;

    request.extensions_mut().insert(CurrentUser(claims.user_id));

    Ok(next.run(request).await)
}

/// Simple in-memory rate limiter
/// Tracks requests per IP address and enforces limits
#[derive(Clone)]
pub struct RateLimiter {
    // IP -> (count, window_start)
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, ip: IpAddr) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let entry = state.entry(ip).or_insert((0, now));

        if now.duration_since(entry.1) > self.window {
            *entry = (1, now);
            return true;
        }

        if entry.0 < self.max_requests {
            entry.0 += 1;
            true
        } else {
            false
        }
    }

    /// Drop entries whose window is long gone
    pub async fn cleanup(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.retain(|_, (_, time)| now.duration_since(*time) <= self.window * 2);
    }

    #[cfg(test)]
    pub async fn tracked(&self) -> usize {
        self.state.lock().await.len()
    }
}

/// Rate limiting middleware for the credential endpoints
pub async fn rate_limit(
    limiter: Arc<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !limiter.check(ip).await {
        tracing::warn!("🚫 Rate limit hit for {}", ip);
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn test_limiter_blocks_after_max() {
        let limiter = RateLimiter::new(3, 60);
        let ip: IpAddr = "10.1.1.1".parse().unwrap();
        let other: IpAddr = "10.1.1.2".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check(ip).await);
        }
        assert!(!limiter.check(ip).await);
        assert!(limiter.check(other).await);
    }

    #[tokio::test]
    async fn test_limiter_window_resets() {
        let limiter = RateLimiter::new(1, 0);
        let ip: IpAddr = "10.1.1.1".parse().unwrap();

        assert!(limiter.check(ip).await);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.check(ip).await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_entries() {
        let limiter = RateLimiter::new(5, 0);
        limiter.check("10.1.1.1".parse().unwrap()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked().await, 0);
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }
}
