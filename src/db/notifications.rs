use sqlx::{Pool, Sqlite};

use crate::db::models::{NotificationKind, NotificationRow};
use crate::error::AppError;

pub struct NotificationRepository;

impl NotificationRepository {
    /// Persist a notification and return its id.
    pub async fn create(
        pool: &Pool<Sqlite>,
        user_id: i64,
        kind: NotificationKind,
        source_user_id: Option<i64>,
    ) -> Result<i64, AppError> {
        let id = sqlx::query_scalar(
            "INSERT INTO notifications (user_id, type, source_user_id, created_at) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(kind)
        .bind(source_user_id)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    pub async fn latest(
        pool: &Pool<Sqlite>,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<NotificationRow>, AppError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
SELECT n.id, n.type, n.is_read, n.created_at,
       u.id AS from_id, u.username AS from_username, u.first_name AS from_first_name
FROM notifications n
LEFT JOIN users u ON n.source_user_id = u.id
WHERE n.user_id = ?
ORDER BY n.created_at DESC, n.id DESC
LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn unread_count(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn mark_read(pool: &Pool<Sqlite>, id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(pool: &Pool<Sqlite>, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
