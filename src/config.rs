use std::str::FromStr;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub verification_url: String,
    pub password_reset_url: String,
    pub frontend_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: String,
    pub geoip_url: String,
    pub auth_rate_limit: u32,
    pub auth_rate_window_secs: u64,
    pub email_host: Option<String>,
    pub email_port: u16,
    pub email_host_user: String,
    pub email_host_password: String,
    pub email_use_tls: bool,
    pub email_use_ssl: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 5000,
            database_url: "sqlite://matcha.db?mode=rwc".to_string(),
            db_max_connections: 20,
            db_min_connections: 5,
            request_timeout_secs: 30,
            jwt_secret: String::new(),
            jwt_expiration_hours: 24,
            upload_dir: "./uploads".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            verification_url: "http://localhost:3000/verify".to_string(),
            password_reset_url: "http://localhost:3000/reset-password".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_redirect_uri: "http://localhost:5000/api/auth/google/callback".to_string(),
            geoip_url: "http://ip-api.com/json".to_string(),
            auth_rate_limit: 20,
            auth_rate_window_secs: 60,
            email_host: None,
            email_port: 587,
            email_host_user: String::new(),
            email_host_password: String::new(),
            email_use_tls: true,
            email_use_ssl: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let jwt_secret = lookup("JWT_SECRET_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET_KEY must be set".to_string()))?;

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.db_min_connections)?,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            jwt_secret,
            jwt_expiration_hours: parse_or(&lookup, "JWT_EXPIRATION_HOURS", defaults.jwt_expiration_hours)?,
            upload_dir: lookup("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            verification_url: lookup("VERIFICATION_URL").unwrap_or(defaults.verification_url),
            password_reset_url: lookup("PASSWORD_RESET_URL").unwrap_or(defaults.password_reset_url),
            frontend_url: lookup("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            google_client_id: lookup("GOOGLE_CLIENT_ID").filter(|s| !s.is_empty()),
            google_client_secret: lookup("GOOGLE_CLIENT_SECRET").filter(|s| !s.is_empty()),
            google_redirect_uri: lookup("GOOGLE_REDIRECT_URI").unwrap_or(defaults.google_redirect_uri),
            geoip_url: lookup("GEOIP_URL").unwrap_or(defaults.geoip_url),
            auth_rate_limit: parse_or(&lookup, "AUTH_RATE_LIMIT", defaults.auth_rate_limit)?,
            auth_rate_window_secs: parse_or(&lookup, "AUTH_RATE_WINDOW_SECS", defaults.auth_rate_window_secs)?,
            email_host: lookup("EMAIL_HOST").filter(|s| !s.trim().is_empty()),
            email_port: parse_or(&lookup, "EMAIL_PORT", defaults.email_port)?,
            email_host_user: lookup("EMAIL_HOST_USER").unwrap_or(defaults.email_host_user),
            email_host_password: lookup("EMAIL_HOST_PASSWORD").unwrap_or(defaults.email_host_password),
            email_use_tls: flag_or(&lookup, "EMAIL_USE_TLS", defaults.email_use_tls)?,
            email_use_ssl: flag_or(&lookup, "EMAIL_USE_SSL", defaults.email_use_ssl)?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

/// Case-insensitive `true`/`false`, plus `1`/`0`.
fn flag_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(AppError::Config(format!("Invalid {}: expected true or false", key))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[("JWT_SECRET_KEY", "s3cret")])).unwrap();
        assert_eq!(config.server_port, 5000);
        assert_eq!(config.jwt_expiration_hours, 24);
        assert_eq!(config.server_address(), "127.0.0.1:5000");
        assert!(config.google_client_id.is_none());
    }

    #[test]
    fn test_missing_secret_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("SERVER_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn test_email_settings() {
        let config = Config::from_lookup(lookup_from(&[("JWT_SECRET_KEY", "s3cret")])).unwrap();
        assert!(config.email_host.is_none());
        assert_eq!(config.email_port, 587);
        assert!(config.email_use_tls && !config.email_use_ssl);

        let config = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("EMAIL_HOST", "smtp.example.com"),
            ("EMAIL_PORT", "2525"),
            ("EMAIL_USE_TLS", "False"),
        ]))
        .unwrap();
        assert_eq!(config.email_host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.email_port, 2525);
        assert!(!config.email_use_tls);

        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET_KEY", "s3cret"),
            ("EMAIL_USE_SSL", "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("EMAIL_USE_SSL"));
    }
}
