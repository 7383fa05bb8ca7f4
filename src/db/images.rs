use sqlx::{Pool, Sqlite};

use crate::db::models::Image;
use crate::error::AppError;

pub struct ImageRepository;

impl ImageRepository {
    /// Insert an image unless the user already has `max_images`. The count
    /// check and the insert run as one statement. The user's first image
    /// becomes the profile picture.
    pub async fn create_within_limit(
        pool: &Pool<Sqlite>,
        user_id: i64,
        file_path: &str,
        max_images: i64,
    ) -> Result<Option<Image>, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let image = sqlx::query_as::<_, Image>(
            r#"
INSERT INTO images (user_id, file_path, is_profile_pic, created_at)
SELECT ?, ?, NOT EXISTS (SELECT 1 FROM images WHERE user_id = ?), ?
WHERE (SELECT COUNT(*) FROM images WHERE user_id = ?) < ?
RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(file_path)
        .bind(user_id)
        .bind(created_at)
        .bind(user_id)
        .bind(max_images)
        .fetch_optional(pool)
        .await?;

        Ok(image)
    }

    /// Profile picture first, then oldest first.
    pub async fn list_for_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Image>, AppError> {
        let images = sqlx::query_as::<_, Image>(
            "SELECT * FROM images WHERE user_id = ? ORDER BY is_profile_pic DESC, created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(images)
    }

    /// All images of all users, ordered so the first row per user is the one to display.
    pub async fn list_all(pool: &Pool<Sqlite>) -> Result<Vec<Image>, AppError> {
        let images = sqlx::query_as::<_, Image>(
            "SELECT * FROM images ORDER BY user_id, is_profile_pic DESC, created_at ASC, id ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(images)
    }

    pub async fn count_for_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn get_owned(
        pool: &Pool<Sqlite>,
        image_id: i64,
        user_id: i64,
    ) -> Result<Option<Image>, AppError> {
        let image = sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = ? AND user_id = ?")
            .bind(image_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(image)
    }

    pub async fn set_profile_picture(
        pool: &Pool<Sqlite>,
        image_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE images SET is_profile_pic = 0 WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE images SET is_profile_pic = 1 WHERE id = ? AND user_id = ?")
            .bind(image_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete an image, promoting the oldest remaining one if it was the profile picture.
    pub async fn delete(pool: &Pool<Sqlite>, image: &Image) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(image.id)
            .execute(&mut *tx)
            .await?;

        if image.is_profile_pic {
            sqlx::query(
                r#"
UPDATE images SET is_profile_pic = 1
WHERE id = (SELECT id FROM images WHERE user_id = ? ORDER BY created_at ASC, id ASC LIMIT 1)
                "#,
            )
            .bind(image.user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
