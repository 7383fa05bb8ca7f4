use sqlx::{Pool, QueryBuilder, Sqlite};

use crate::db::models::{Gender, SexualPreference, User};
use crate::error::AppError;

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a [u8],
    pub password_salt: &'a [u8],
    pub is_verified: bool,
}

/// Field changes accepted by the profile editor. `None` leaves a column as is;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<Option<String>>,
    pub gender: Option<Gender>,
    pub sexual_preference: Option<SexualPreference>,
    pub date_of_birth: Option<Option<String>>,
}

impl ProfileChanges {
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.first_name.is_some() {
            names.push("first_name");
        }
        if self.last_name.is_some() {
            names.push("last_name");
        }
        if self.email.is_some() {
            names.push("email");
        }
        if self.bio.is_some() {
            names.push("bio");
        }
        if self.gender.is_some() {
            names.push("gender");
        }
        if self.sexual_preference.is_some() {
            names.push("sexual_preference");
        }
        if self.date_of_birth.is_some() {
            names.push("date_of_birth");
        }
        names
    }

    pub fn is_empty(&self) -> bool {
        self.field_names().is_empty()
    }
}

pub struct UserRepository;

impl UserRepository {
    pub async fn create(pool: &Pool<Sqlite>, new: NewUser<'_>) -> Result<User, AppError> {
        let created_at = chrono::Utc::now().timestamp();

        let user = sqlx::query_as::<_, User>(
            r#"
INSERT INTO users (username, email, password_hash, password_salt, first_name, last_name, is_verified, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(new.username)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.password_salt)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.is_verified)
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn username_or_email_taken(
        pool: &Pool<Sqlite>,
        username: &str,
        email: &str,
    ) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = ? OR email = ? LIMIT 1")
                .bind(username)
                .bind(email)
                .fetch_optional(pool)
                .await?;

        Ok(found.is_some())
    }

    pub async fn email_taken_by_other(
        pool: &Pool<Sqlite>,
        email: &str,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ? LIMIT 1")
                .bind(email)
                .bind(user_id)
                .fetch_optional(pool)
                .await?;

        Ok(found.is_some())
    }

    pub async fn exists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(found.is_some())
    }

    pub async fn first_name(pool: &Pool<Sqlite>, id: i64) -> Result<Option<String>, AppError> {
        let name = sqlx::query_scalar("SELECT first_name FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(name)
    }

    pub async fn set_verified(pool: &Pool<Sqlite>, id: i64, verified: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_verified = ? WHERE id = ?")
            .bind(verified)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn touch_last_online(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_online = ? WHERE id = ?")
            .bind(chrono::Utc::now().timestamp())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_password(
        pool: &Pool<Sqlite>,
        id: i64,
        password_hash: &[u8],
        password_salt: &[u8],
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password_hash = ?, password_salt = ? WHERE id = ?")
            .bind(password_hash)
            .bind(password_salt)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn update_location(
        pool: &Pool<Sqlite>,
        id: i64,
        latitude: f64,
        longitude: f64,
        source: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET latitude = ?, longitude = ?, location_source = ? WHERE id = ?")
            .bind(latitude)
            .bind(longitude)
            .bind(source)
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Apply profile changes; an email change drops the verified flag.
    pub async fn update_profile(
        pool: &Pool<Sqlite>,
        id: i64,
        changes: &ProfileChanges,
    ) -> Result<(), AppError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut set = builder.separated(", ");

        if let Some(first_name) = &changes.first_name {
            set.push("first_name = ").push_bind_unseparated(first_name.clone());
        }
        if let Some(last_name) = &changes.last_name {
            set.push("last_name = ").push_bind_unseparated(last_name.clone());
        }
        if let Some(email) = &changes.email {
            set.push("email = ").push_bind_unseparated(email.clone());
            set.push("is_verified = 0");
        }
        if let Some(bio) = &changes.bio {
            set.push("bio = ").push_bind_unseparated(bio.clone());
        }
        if let Some(gender) = changes.gender {
            set.push("gender = ").push_bind_unseparated(gender);
        }
        if let Some(preference) = changes.sexual_preference {
            set.push("sexual_preference = ").push_bind_unseparated(preference);
        }
        if let Some(date_of_birth) = &changes.date_of_birth {
            set.push("date_of_birth = ").push_bind_unseparated(date_of_birth.clone());
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.build().execute(pool).await?;

        Ok(())
    }

    /// Every verified user except `user_id`, in id order.
    pub async fn list_verified_except(
        pool: &Pool<Sqlite>,
        user_id: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id != ? AND is_verified = 1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }
}
