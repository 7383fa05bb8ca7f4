use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Male" => Some(Gender::Male),
            "Female" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum SexualPreference {
    Straight,
    Gay,
    Bisexual,
}

impl SexualPreference {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Straight" => Some(SexualPreference::Straight),
            "Gay" => Some(SexualPreference::Gay),
            "Bisexual" => Some(SexualPreference::Bisexual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Vec<u8>,
    #[serde(skip_serializing)]
    pub password_salt: Vec<u8>,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub gender: Option<Gender>,
    pub sexual_preference: Option<SexualPreference>,
    pub date_of_birth: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_source: Option<String>,
    pub fame_rating: f64,
    pub is_verified: bool,
    pub last_online: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
pub enum TokenKind {
    Verification,
    Reset,
    Blacklist,
    OauthState,
}

#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub id: i64,
    pub user_id: Option<i64>,
    pub token: String,
    #[sqlx(rename = "type")]
    pub kind: TokenKind,
    pub expires_at: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Image {
    pub id: i64,
    pub user_id: i64,
    pub file_path: String,
    pub is_profile_pic: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tag {
    pub id: i64,
    pub tag_name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserTag {
    pub user_id: i64,
    pub tag_id: i64,
    pub tag_name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub is_read: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum NotificationKind {
    Visit,
    Like,
    Match,
    Unlike,
    Message,
    DateProposal,
    DateAccepted,
    DateDeclined,
}

/// Notification joined with its source user, when that user still exists.
#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: i64,
    pub from_id: Option<i64>,
    pub from_username: Option<String>,
    pub from_first_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DateStatus {
    Pending,
    Accepted,
    Declined,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DateProposal {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub date_time: i64,
    pub location: String,
    pub activity: String,
    pub status: DateStatus,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

/// Minimal public identity used by lists (visitors, likers, conversations).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub last_online: Option<i64>,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VisitorRow {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub last_online: Option<i64>,
    pub profile_image: Option<String>,
    pub visit_count: i64,
    pub last_visit: i64,
}
