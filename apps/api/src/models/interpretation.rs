use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Parent staging record for one language-model call.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterpretationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub input_text: String,
    /// Serialized `InterpretationResult`.
    pub structured_result: Value,
    /// Model output exactly as received. Audit only, never returned to clients.
    #[serde(skip_serializing)]
    pub original_result: String,
    pub ai_model: String,
    pub ai_prompt_tokens: Option<i32>,
    pub ai_completion_tokens: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One reviewable unit derived from an interpretation.
///
/// `status = pending` ⇔ `resource_id` and `reviewed_at` are both NULL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterpretationItemRow {
    pub id: Uuid,
    pub interpretation_id: Uuid,
    pub item_index: i32,
    pub resource_type: String,
    pub status: String,
    pub resource_id: Option<Uuid>,
    pub data: Value,
    pub original_data: Value,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
