use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::interpretation::InterpretationItemRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Created,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Created => "created",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ItemStatus::Pending),
            "created" => Some(ItemStatus::Created),
            _ => None,
        }
    }
}

/// Kind of downstream resource an item materializes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Task,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Task => "task",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "task" => Some(ResourceType::Task),
            _ => None,
        }
    }
}

/// `data` payload of a `task` item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TaskData {
    /// Decodes and checks a stored or submitted `data` value.
    pub fn from_value(data: &Value) -> Result<Self, String> {
        if !data.is_object() {
            return Err("task data must be a JSON object".to_string());
        }
        let task: TaskData =
            serde_json::from_value(data.clone()).map_err(|e| format!("invalid task data: {e}"))?;
        if task.title.trim().is_empty() {
            return Err("task title must not be empty".to_string());
        }
        Ok(task)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ApproveItemsRequest {
    pub item_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ApproveItemResponse {
    pub resource_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ApproveItemsResponse {
    pub resource_ids: HashMap<Uuid, Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ItemsResponse {
    pub items: Vec<InterpretationItemRow>,
}
