//! Google OAuth 2.0 authorization-code flow.

use serde::Deserialize;

use crate::config::Config;
use crate::error::AppError;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

fn credentials(config: &Config) -> Result<(&str, &str), AppError> {
    match (&config.google_client_id, &config.google_client_secret) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::Config("Google OAuth is not configured".to_string())),
    }
}

pub fn authorize_url(config: &Config, state: &str) -> Result<String, AppError> {
    let (client_id, _) = credentials(config)?;

    let url = reqwest::Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", config.google_redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| AppError::Internal(format!("Invalid authorize URL: {}", e)))?;

    Ok(url.to_string())
}

/// Trade an authorization code for the signed-in user's profile.
pub async fn fetch_profile(
    client: &reqwest::Client,
    config: &Config,
    code: &str,
) -> Result<GoogleProfile, AppError> {
    let (client_id, client_secret) = credentials(config)?;

    let resp = client
        .post(TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", config.google_redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?;
    if !resp.status().is_success() {
        tracing::warn!("🔑 Google token exchange failed: {}", resp.status());
        return Err(AppError::Upstream("Google token exchange failed".to_string()));
    }
    let token: TokenResponse = resp.json().await?;

    let resp = client
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await?;
    if !resp.status().is_success() {
        tracing::warn!("🔑 Google userinfo failed: {}", resp.status());
        return Err(AppError::Upstream("Could not fetch Google profile".to_string()));
    }

    Ok(resp.json().await?)
}

/// Username candidate derived from the local part of an email.
pub fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut base: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(20)
        .collect::<String>()
        .to_lowercase();
    if base.len() < 3 {
        base.push_str("user");
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_requires_credentials() {
        let config = Config::default();
        assert!(matches!(authorize_url(&config, "s"), Err(AppError::Config(_))));
    }

    #[test]
    fn test_authorize_url() {
        let config = Config {
            google_client_id: Some("cid".to_string()),
            google_client_secret: Some("secret".to_string()),
            ..Config::default()
        };
        let url = authorize_url(&config, "st4te").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("state=st4te"));
        assert!(!url.contains("secret"));
    }

    #[test]
    fn test_username_base() {
        assert_eq!(username_base("Jane.Doe+x@gmail.com"), "janedoex");
        assert_eq!(username_base("a@b.co"), "auser");
    }
}
