use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::config::Config;
use crate::error::AppError;

pub mod dates;
pub mod images;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod social;
pub mod tags;
pub mod tokens;
pub mod users;

pub use dates::DateProposalRepository;
pub use images::ImageRepository;
pub use messages::MessageRepository;
pub use models::{
    DateProposal, DateStatus, Gender, Image, Message, NotificationKind, SexualPreference, Tag,
    Token, TokenKind, User, UserSummary,
};
pub use notifications::NotificationRepository;
pub use social::SocialRepository;
pub use tags::TagRepository;
pub use tokens::TokenRepository;
pub use users::{NewUser, ProfileChanges, UserRepository};

/// Open the pool described by `config` and bring the schema up to date.
pub async fn connect(config: &Config) -> Result<Pool<Sqlite>, AppError> {
    let db = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await?;

    migrate(&db).await?;
    Ok(db)
}

pub async fn migrate(db: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}
