use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::provider::ProviderProfile;
use crate::db::{with_transaction, Store};
use crate::errors::AppError;
use crate::models::user::{UserRow, UserUpsert};

/// Minimal profile handed to the front end after sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct SignedInUser {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<UserRow> for SignedInUser {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            nickname: row.nickname,
            avatar: row.avatar,
        }
    }
}

/// Inserts the user on first sign-in, refreshes the stored profile afterwards.
pub async fn upsert_user(store: &dyn Store, profile: ProviderProfile) -> Result<UserRow, AppError> {
    let upsert = UserUpsert {
        google_id: profile.provider_id,
        email: profile.email,
        nickname: profile.name,
        avatar: profile.picture,
    };

    let user = with_transaction(store, move |tx| {
        Box::pin(async move { tx.upsert_user(&upsert, Utc::now()).await })
    })
    .await?;

    info!("User signed in: user_id={}", user.id);
    Ok(user)
}
