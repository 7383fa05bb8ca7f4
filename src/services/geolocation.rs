use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Client address: `X-Client-Public-IP`, then the first `X-Forwarded-For`
/// entry, then the peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("X-Client-Public-IP")
        .or_else(|| header_ip("X-Forwarded-For"))
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Resolve an address to `(latitude, longitude)` through an ip-api compatible service.
pub async fn locate_ip(
    client: &reqwest::Client,
    base_url: &str,
    ip: Option<IpAddr>,
) -> Result<(f64, f64), AppError> {
    // Private addresses are unknown upstream; let the service use the caller's address.
    let url = match ip {
        Some(ip) if is_public(ip) => format!("{}/{}", base_url.trim_end_matches('/'), ip),
        _ => base_url.to_string(),
    };

    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        tracing::warn!("📍 Geolocation upstream non-OK: {}", resp.status());
        return Err(AppError::Upstream("Could not determine location from IP".to_string()));
    }

    let body: IpApiResponse = resp.json().await?;
    match (body.status.as_deref(), body.lat, body.lon) {
        (Some("success") | None, Some(lat), Some(lon)) => Ok((lat, lon)),
        _ => {
            tracing::warn!(
                "📍 Geolocation lookup failed: {}",
                body.message.unwrap_or_else(|| "no coordinates".to_string())
            );
            Err(AppError::Upstream("Could not determine location from IP".to_string()))
        }
    }
}

fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !(v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()),
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}
