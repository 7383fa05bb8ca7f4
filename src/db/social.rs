use std::collections::HashSet;

use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::db::models::{UserSummary, VisitorRow};
use crate::error::AppError;
use crate::matching::fame::fame_rating;

pub struct SocialRepository;

impl SocialRepository {
    pub async fn has_liked(pool: &Pool<Sqlite>, liker_id: i64, liked_id: i64) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM likes WHERE liker_id = ? AND liked_id = ?")
                .bind(liker_id)
                .bind(liked_id)
                .fetch_optional(pool)
                .await?;

        Ok(found.is_some())
    }

    /// Both users have liked each other.
    pub async fn are_connected(pool: &Pool<Sqlite>, a: i64, b: i64) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*) FROM likes
WHERE (liker_id = ? AND liked_id = ?) OR (liker_id = ? AND liked_id = ?)
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(pool)
        .await?;

        Ok(count == 2)
    }

    /// Either user has blocked the other.
    pub async fn is_blocked_pair(pool: &Pool<Sqlite>, a: i64, b: i64) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
SELECT id FROM blocks
WHERE (blocker_id = ? AND blocked_id = ?) OR (blocker_id = ? AND blocked_id = ?)
LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_optional(pool)
        .await?;

        Ok(found.is_some())
    }

    /// Ids of every user in a block relation with `user_id`, in either direction.
    pub async fn blocked_ids(pool: &Pool<Sqlite>, user_id: i64) -> Result<HashSet<i64>, AppError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT blocker_id, blocked_id FROM blocks WHERE blocker_id = ? OR blocked_id = ?",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .flat_map(|(blocker, blocked)| [blocker, blocked])
            .filter(|id| *id != user_id)
            .collect())
    }

    /// Returns true when a new like row was written.
    pub async fn add_like(pool: &Pool<Sqlite>, liker_id: i64, liked_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO likes (liker_id, liked_id, created_at) VALUES (?, ?, ?) ON CONFLICT (liker_id, liked_id) DO NOTHING",
        )
        .bind(liker_id)
        .bind(liked_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns true when a like row was removed.
    pub async fn remove_like(pool: &Pool<Sqlite>, liker_id: i64, liked_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE liker_id = ? AND liked_id = ?")
            .bind(liker_id)
            .bind(liked_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Recompute and store the fame rating of `user_id` from the likes it received.
    pub async fn refresh_fame(conn: &mut SqliteConnection, user_id: i64) -> Result<f64, AppError> {
        let likes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE liked_id = ?")
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;

        let rating = fame_rating(likes);

        sqlx::query("UPDATE users SET fame_rating = ? WHERE id = ?")
            .bind(rating)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        Ok(rating)
    }

    /// Block `blocked_id` and drop the likes between the pair, atomically.
    pub async fn block(pool: &Pool<Sqlite>, blocker_id: i64, blocked_id: i64) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO blocks (blocker_id, blocked_id, created_at) VALUES (?, ?, ?) ON CONFLICT (blocker_id, blocked_id) DO NOTHING",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM likes WHERE (liker_id = ? AND liked_id = ?) OR (liker_id = ? AND liked_id = ?)",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(blocked_id)
        .bind(blocker_id)
        .execute(&mut *tx)
        .await?;

        Self::refresh_fame(&mut *tx, blocker_id).await?;
        Self::refresh_fame(&mut *tx, blocked_id).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn unblock(pool: &Pool<Sqlite>, blocker_id: i64, blocked_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns true when this is the first report for the pair.
    pub async fn report(
        pool: &Pool<Sqlite>,
        reporter_id: i64,
        reported_id: i64,
        reason: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO reports (reporter_id, reported_id, reason, created_at) VALUES (?, ?, ?, ?) ON CONFLICT (reporter_id, reported_id) DO NOTHING",
        )
        .bind(reporter_id)
        .bind(reported_id)
        .bind(reason)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count a visit for the given day; returns the visit count for that day.
    pub async fn record_visit(
        pool: &Pool<Sqlite>,
        visitor_id: i64,
        visited_id: i64,
        visit_day: &str,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar(
            r#"
INSERT INTO visits (visitor_id, visited_id, visit_day, visit_count, timestamp)
VALUES (?, ?, ?, 1, ?)
ON CONFLICT (visitor_id, visited_id, visit_day)
DO UPDATE SET visit_count = visit_count + 1, timestamp = excluded.timestamp
RETURNING visit_count
            "#,
        )
        .bind(visitor_id)
        .bind(visited_id)
        .bind(visit_day)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn visitors(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<VisitorRow>, AppError> {
        let rows = sqlx::query_as::<_, VisitorRow>(
            r#"
SELECT u.id, u.username, u.first_name, u.last_name, u.last_online,
       (SELECT file_path FROM images WHERE user_id = u.id
        ORDER BY is_profile_pic DESC, created_at ASC LIMIT 1) AS profile_image,
       SUM(v.visit_count) AS visit_count,
       MAX(v.timestamp) AS last_visit
FROM visits v
INNER JOIN users u ON u.id = v.visitor_id
WHERE v.visited_id = ?
  AND u.id NOT IN (
      SELECT blocked_id FROM blocks WHERE blocker_id = ?
      UNION
      SELECT blocker_id FROM blocks WHERE blocked_id = ?
  )
GROUP BY u.id
ORDER BY last_visit DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn likers(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<UserSummary>, AppError> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
SELECT u.id, u.username, u.first_name, u.last_name, u.last_online,
       (SELECT file_path FROM images WHERE user_id = u.id
        ORDER BY is_profile_pic DESC, created_at ASC LIMIT 1) AS profile_image
FROM likes l
INNER JOIN users u ON u.id = l.liker_id
WHERE l.liked_id = ?
  AND u.id NOT IN (
      SELECT blocked_id FROM blocks WHERE blocker_id = ?
      UNION
      SELECT blocker_id FROM blocks WHERE blocked_id = ?
  )
ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Users connected to `user_id` and not in a block relation with it.
    pub async fn connections(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<UserSummary>, AppError> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
SELECT u.id, u.username, u.first_name, u.last_name, u.last_online,
       (SELECT file_path FROM images WHERE user_id = u.id
        ORDER BY is_profile_pic DESC, created_at ASC LIMIT 1) AS profile_image
FROM users u
WHERE u.id IN (
    SELECT l1.liked_id
    FROM likes l1
    INNER JOIN likes l2 ON l1.liked_id = l2.liker_id AND l1.liker_id = l2.liked_id
    WHERE l1.liker_id = ?
)
AND u.id NOT IN (
    SELECT blocked_id FROM blocks WHERE blocker_id = ?
    UNION
    SELECT blocker_id FROM blocks WHERE blocked_id = ?
)
ORDER BY u.id
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }
}
