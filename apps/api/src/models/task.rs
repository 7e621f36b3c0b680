use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const TASK_STATUSES: &[&str] = &["todo", "in_progress", "done"];
pub const DEFAULT_TASK_STATUS: &str = "todo";

pub const SOURCE_AI: &str = "ai";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    /// One of `TASK_STATUSES`.
    pub status: String,
    /// `manual` for tasks entered directly, `SOURCE_AI` for approved items.
    pub source: String,
    pub ai_interpretation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maps a requested task status onto the accepted set. Empty, missing and
/// unknown values all resolve to `todo`.
pub fn resolve_task_status(requested: Option<&str>) -> &'static str {
    match requested {
        Some(status) => TASK_STATUSES
            .iter()
            .copied()
            .find(|s| *s == status)
            .unwrap_or(DEFAULT_TASK_STATUS),
        None => DEFAULT_TASK_STATUS,
    }
}
