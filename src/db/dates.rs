use sqlx::{Pool, Sqlite};

use crate::db::models::{DateProposal, DateStatus};
use crate::error::AppError;

pub struct DateProposalRepository;

impl DateProposalRepository {
    pub async fn create(
        pool: &Pool<Sqlite>,
        sender_id: i64,
        receiver_id: i64,
        date_time: i64,
        location: &str,
        activity: &str,
    ) -> Result<DateProposal, AppError> {
        let proposal = sqlx::query_as::<_, DateProposal>(
            r#"
INSERT INTO date_proposals (sender_id, receiver_id, date_time, location, activity, status, created_at)
VALUES (?, ?, ?, ?, ?, 'pending', ?)
RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(receiver_id)
        .bind(date_time)
        .bind(location)
        .bind(activity)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(pool)
        .await?;

        Ok(proposal)
    }

    pub async fn get(pool: &Pool<Sqlite>, id: i64) -> Result<Option<DateProposal>, AppError> {
        let proposal = sqlx::query_as::<_, DateProposal>("SELECT * FROM date_proposals WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(proposal)
    }

    /// Move a pending proposal to `status`; returns the updated row, or `None`
    /// when it was no longer pending.
    pub async fn respond(
        pool: &Pool<Sqlite>,
        id: i64,
        status: DateStatus,
    ) -> Result<Option<DateProposal>, AppError> {
        let proposal = sqlx::query_as::<_, DateProposal>(
            r#"
UPDATE date_proposals SET status = ?, updated_at = ?
WHERE id = ? AND status = 'pending'
RETURNING *
            "#,
        )
        .bind(status)
        .bind(chrono::Utc::now().timestamp())
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(proposal)
    }

    /// Chronological proposals exchanged between two users.
    pub async fn between(pool: &Pool<Sqlite>, a: i64, b: i64) -> Result<Vec<DateProposal>, AppError> {
        let proposals = sqlx::query_as::<_, DateProposal>(
            r#"
SELECT * FROM date_proposals
WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_all(pool)
        .await?;

        Ok(proposals)
    }
}
