use sqlx::{Pool, Sqlite};

use crate::db::models::Message;
use crate::error::AppError;

pub struct MessageRepository;

impl MessageRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let message = sqlx::query_as::<_, Message>(
            r#"
INSERT INTO messages (sender_id, receiver_id, content, created_at)
VALUES (?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(content)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Newest first; `before_id` pages further back in the conversation.
    pub async fn between(
        pool: &Pool<Sqlite>,
        a: i64,
        b: i64,
        before_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
SELECT * FROM messages
WHERE ((sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?))
  AND (? IS NULL OR id < ?)
ORDER BY created_at DESC, id DESC
LIMIT ?
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .bind(before_id)
        .bind(before_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn last_between(
        pool: &Pool<Sqlite>,
        a: i64,
        b: i64,
    ) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
SELECT * FROM messages
WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
ORDER BY created_at DESC, id DESC
LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn unread_from(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Mark everything `sender_id` sent to `receiver_id` as read; returns rows touched.
    pub async fn mark_read(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        receiver_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE sender_id = ? AND receiver_id = ? AND is_read = 0",
        )
        .bind(sender_id)
        .bind(receiver_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
