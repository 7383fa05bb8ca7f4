//! Compact HS256 JSON Web Tokens.
//!
//! Only the `{"alg":"HS256","typ":"JWT"}` header is issued or accepted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

fn signature(secret: &str, signing_input: &str) -> Result<Vec<u8>, AppError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid JWT secret: {}", e)))?;
    mac.update(signing_input.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Issue a token for `user_id` valid for `expiry_hours` from `now`.
pub fn encode(secret: &str, user_id: i64, now: i64, expiry_hours: i64) -> Result<String, AppError> {
    let claims = Claims {
        user_id,
        iat: now,
        exp: now + expiry_hours * 3600,
    };
    let payload = serde_json::to_vec(&claims)
        .map_err(|e| AppError::Internal(format!("Failed to encode claims: {}", e)))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER_JSON),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let sig = signature(secret, &signing_input)?;

    Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(sig)))
}

/// Check the signature and expiry of `token` at time `now`.
pub fn decode(secret: &str, token: &str, now: i64) -> Result<Claims, AppError> {
    let invalid = || AppError::Auth("Token is invalid or expired".to_string());

    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let header: Header = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(invalid)?;
    if header.alg != "HS256" {
        return Err(invalid());
    }

    let sig = URL_SAFE_NO_PAD.decode(sig_b64).map_err(|_| invalid())?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid JWT secret: {}", e)))?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());
    mac.verify_slice(&sig).map_err(|_| invalid())?;

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(invalid)?;

    if claims.exp <= now {
        return Err(invalid());
    }

    Ok(claims)
}
