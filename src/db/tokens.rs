use sqlx::{Pool, Sqlite};

use crate::db::models::{Token, TokenKind};
use crate::error::AppError;

pub struct TokenRepository;

impl TokenRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: Option<i64>,
        token: &str,
        kind: TokenKind,
        expires_at: i64,
    ) -> Result<Token, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let token = sqlx::query_as::<_, Token>(
            r#"
INSERT INTO tokens (user_id, token, type, expires_at, created_at)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (token) DO UPDATE SET expires_at = excluded.expires_at
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(kind)
        .bind(expires_at)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(token)
    }

    /// Look up a token of the given kind regardless of expiry.
    pub async fn find(
        pool: &Pool<Sqlite>,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<Token>, AppError> {
        let token = sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token = ? AND type = ?")
            .bind(token)
            .bind(kind)
            .fetch_optional(pool)
            .await?;

        Ok(token)
    }

    pub async fn is_blacklisted(pool: &Pool<Sqlite>, token: &str) -> Result<bool, AppError> {
        let now = chrono::Utc::now().timestamp();

        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM tokens WHERE token = ? AND type = 'blacklist' AND expires_at > ?",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(found.is_some())
    }

    /// Remove and return a live token in one statement, so it can be used once.
    pub async fn consume(
        pool: &Pool<Sqlite>,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<Token>, AppError> {
        let now = chrono::Utc::now().timestamp();

        let token = sqlx::query_as::<_, Token>(
            "DELETE FROM tokens WHERE token = ? AND type = ? AND expires_at > ? RETURNING *",
        )
        .bind(token)
        .bind(kind)
        .bind(now)
        .fetch_optional(pool)
        .await?;

        Ok(token)
    }

    pub async fn delete(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM tokens WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= ?")
            .bind(now)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
