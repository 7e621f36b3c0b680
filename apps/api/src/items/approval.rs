//! Approval engine: promotes pending items into downstream resources.
//!
//! Single and bulk approval share `approve_one` and one enclosing transaction:
//! either every item flips to `created` with its resource inserted, or nothing
//! changes at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{with_transaction, Store, StoreTx};
use crate::errors::AppError;
use crate::items::models::{ItemStatus, ResourceType, TaskData};
use crate::items::staging::load_owned_item;
use crate::models::interpretation::InterpretationItemRow;
use crate::models::task::{resolve_task_status, TaskRow, SOURCE_AI};

/// Approves one item owned by `subject` and returns the new resource id.
pub async fn approve_item(
    store: &dyn Store,
    subject: Uuid,
    item_id: Uuid,
) -> Result<Uuid, AppError> {
    let resource_id = with_transaction(store, move |tx| {
        Box::pin(async move { approve_one(tx, subject, item_id, None, Utc::now()).await })
    })
    .await?;

    info!("Approved item {item_id} as resource {resource_id}");
    Ok(resource_id)
}

/// Approves `item_ids` in the order given, all belonging to `interpretation_id`.
/// Any failure rolls the whole batch back.
pub async fn approve_items(
    store: &dyn Store,
    subject: Uuid,
    interpretation_id: Uuid,
    item_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Uuid>, AppError> {
    if item_ids.is_empty() {
        return Err(AppError::InvalidRequest("item_ids must not be empty".into()));
    }

    let resource_ids = with_transaction(store, move |tx| {
        Box::pin(async move {
            let now = Utc::now();
            let mut resource_ids = HashMap::with_capacity(item_ids.len());
            for item_id in item_ids {
                let resource_id =
                    approve_one(tx, subject, item_id, Some(interpretation_id), now).await?;
                resource_ids.insert(item_id, resource_id);
            }
            Ok(resource_ids)
        })
    })
    .await?;

    info!(
        "Approved {} item(s) of interpretation {interpretation_id}",
        resource_ids.len()
    );
    Ok(resource_ids)
}

async fn approve_one(
    tx: &mut Box<dyn StoreTx>,
    subject: Uuid,
    item_id: Uuid,
    expected_interpretation: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<Uuid, AppError> {
    let item = load_owned_item(tx, subject, item_id).await?;
    if expected_interpretation.is_some_and(|id| id != item.interpretation_id) {
        return Err(AppError::NotFound(format!("Item {item_id} not found")));
    }

    if ItemStatus::parse(&item.status) != Some(ItemStatus::Pending) {
        warn!("Refusing to approve item {item_id} in status '{}'", item.status);
        return Err(AppError::InvalidState(format!(
            "Item {item_id} is '{}' and cannot be approved",
            item.status
        )));
    }

    let resource_id = match ResourceType::parse(&item.resource_type) {
        Some(ResourceType::Task) => create_task(tx, subject, &item, now).await?,
        None => return Err(AppError::UnsupportedResourceType(item.resource_type)),
    };

    // Predicated on status = 'pending'; a concurrent approval makes this miss.
    if !tx.mark_item_created(item_id, resource_id, now).await? {
        return Err(AppError::InvalidState(format!(
            "Item {item_id} is no longer pending"
        )));
    }
    Ok(resource_id)
}

async fn create_task(
    tx: &mut Box<dyn StoreTx>,
    subject: Uuid,
    item: &InterpretationItemRow,
    now: DateTime<Utc>,
) -> Result<Uuid, AppError> {
    let data = TaskData::from_value(&item.data).map_err(AppError::InvalidRequest)?;

    let task = TaskRow {
        id: Uuid::new_v4(),
        user_id: subject,
        title: data.title,
        description: data.description,
        due_at: data.due_at,
        status: resolve_task_status(data.status.as_deref()).to_string(),
        source: SOURCE_AI.to_string(),
        ai_interpretation_id: Some(item.interpretation_id),
        created_at: now,
        updated_at: now,
    };
    tx.insert_task(&task).await?;
    Ok(task.id)
}
