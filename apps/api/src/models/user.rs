use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub google_id: String,
    pub email: String,
    pub nickname: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile fields written on every successful sign-in.
#[derive(Debug, Clone)]
pub struct UserUpsert {
    pub google_id: String,
    pub email: String,
    pub nickname: String,
    pub avatar: Option<String>,
}
