//! Shared guards for handlers acting on another user.

use sqlx::{Pool, Sqlite};

use crate::db::{SocialRepository, User, UserRepository};
use crate::error::AppError;

/// 400 when `other_id` is the caller, 404 when it does not exist.
pub async fn other_user(db: &Pool<Sqlite>, me: i64, other_id: i64, self_msg: &str) -> Result<User, AppError> {
    if me == other_id {
        return Err(AppError::BadRequest(self_msg.to_string()));
    }

    UserRepository::get_by_id(db, other_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// 403 unless the pair is connected and neither side blocked the other.
pub async fn require_connection(db: &Pool<Sqlite>, me: i64, other_id: i64) -> Result<(), AppError> {
    if SocialRepository::is_blocked_pair(db, me, other_id).await? {
        return Err(AppError::Forbidden("Cannot interact with this user".to_string()));
    }
    if !SocialRepository::are_connected(db, me, other_id).await? {
        return Err(AppError::Forbidden("You can only interact with connected users".to_string()));
    }
    Ok(())
}

pub async fn require_not_blocked(db: &Pool<Sqlite>, me: i64, other_id: i64) -> Result<(), AppError> {
    if SocialRepository::is_blocked_pair(db, me, other_id).await? {
        return Err(AppError::Forbidden("Cannot interact with this user".to_string()));
    }
    Ok(())
}
