use sqlx::{Pool, Sqlite};

use crate::db::models::{Tag, UserTag};
use crate::error::AppError;

pub struct TagRepository;

impl TagRepository {
    pub async fn list(pool: &Pool<Sqlite>, search: Option<&str>) -> Result<Vec<Tag>, AppError> {
        let tags = match search {
            Some(q) => {
                sqlx::query_as::<_, Tag>(
                    "SELECT * FROM tags WHERE LOWER(tag_name) LIKE ? ORDER BY tag_name ASC",
                )
                .bind(format!("%{}%", q.to_lowercase()))
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY tag_name ASC")
                    .fetch_all(pool)
                    .await?
            }
        };

        Ok(tags)
    }

    /// Return the tag named `tag_name`, creating it when missing.
    pub async fn get_or_create(pool: &Pool<Sqlite>, tag_name: &str) -> Result<Tag, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        sqlx::query("INSERT INTO tags (tag_name, created_at) VALUES (?, ?) ON CONFLICT (tag_name) DO NOTHING")
            .bind(tag_name)
            .bind(created_at)
            .execute(pool)
            .await?;

        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE tag_name = ?")
            .bind(tag_name)
            .fetch_one(pool)
            .await?;

        Ok(tag)
    }

    /// Link a tag to a user; false when the link already existed.
    pub async fn attach(pool: &Pool<Sqlite>, user_id: i64, tag_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO user_tags (user_id, tag_id) VALUES (?, ?) ON CONFLICT (user_id, tag_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(tag_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn detach(pool: &Pool<Sqlite>, user_id: i64, tag_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_tags WHERE user_id = ? AND tag_id = ?")
            .bind(user_id)
            .bind(tag_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn find_user_tag(
        pool: &Pool<Sqlite>,
        user_id: i64,
        tag_id: i64,
    ) -> Result<Option<UserTag>, AppError> {
        let user_tag = sqlx::query_as::<_, UserTag>(
            r#"
SELECT ut.user_id, ut.tag_id, t.tag_name
FROM user_tags ut
INNER JOIN tags t ON ut.tag_id = t.id
WHERE ut.user_id = ? AND ut.tag_id = ?
            "#,
        )
        .bind(user_id)
        .bind(tag_id)
        .fetch_optional(pool)
        .await?;

        Ok(user_tag)
    }

    pub async fn for_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<UserTag>, AppError> {
        let tags = sqlx::query_as::<_, UserTag>(
            r#"
SELECT ut.user_id, ut.tag_id, t.tag_name
FROM user_tags ut
INNER JOIN tags t ON ut.tag_id = t.id
WHERE ut.user_id = ?
ORDER BY t.tag_name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }

    /// Every user/tag link, used to score candidates in a single pass.
    pub async fn all_user_tags(pool: &Pool<Sqlite>) -> Result<Vec<UserTag>, AppError> {
        let tags = sqlx::query_as::<_, UserTag>(
            r#"
SELECT ut.user_id, ut.tag_id, t.tag_name
FROM user_tags ut
INNER JOIN tags t ON ut.tag_id = t.id
ORDER BY ut.user_id, t.tag_name ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(tags)
    }
}
