//! Item staging: owner-scoped reads and edits of pending items.

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{with_transaction, Store, StoreTx};
use crate::errors::AppError;
use crate::items::models::{ItemStatus, ResourceType, TaskData};
use crate::models::interpretation::InterpretationItemRow;

/// Loads an item whose parent interpretation belongs to `user_id`.
/// Missing items and items owned by someone else are both `NotFound`.
pub async fn load_owned_item(
    tx: &mut Box<dyn StoreTx>,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<InterpretationItemRow, AppError> {
    let not_found = || AppError::NotFound(format!("Item {item_id} not found"));

    let item = tx.find_item(item_id).await?.ok_or_else(not_found)?;
    match tx.find_interpretation(item.interpretation_id).await? {
        Some(parent) if parent.user_id == user_id => Ok(item),
        _ => Err(not_found()),
    }
}

/// Checks `data` against the schema of `resource_type`.
pub fn validate_item_data(resource_type: &str, data: &Value) -> Result<(), AppError> {
    match ResourceType::parse(resource_type) {
        Some(ResourceType::Task) => TaskData::from_value(data)
            .map(|_| ())
            .map_err(AppError::InvalidRequest),
        None => Err(AppError::UnsupportedResourceType(resource_type.to_string())),
    }
}

/// Items of one interpretation, ordered by `item_index`.
pub async fn get_items(
    store: &dyn Store,
    user_id: Uuid,
    interpretation_id: Uuid,
) -> Result<Vec<InterpretationItemRow>, AppError> {
    with_transaction(store, move |tx| {
        Box::pin(async move {
            match tx.find_interpretation(interpretation_id).await? {
                Some(parent) if parent.user_id == user_id => {}
                _ => {
                    return Err(AppError::NotFound(format!(
                        "Interpretation {interpretation_id} not found"
                    )))
                }
            }
            tx.list_items(interpretation_id).await
        })
    })
    .await
}

pub async fn get_item(
    store: &dyn Store,
    user_id: Uuid,
    item_id: Uuid,
) -> Result<InterpretationItemRow, AppError> {
    with_transaction(store, move |tx| {
        Box::pin(async move { load_owned_item(tx, user_id, item_id).await })
    })
    .await
}

/// Replaces `data` of a pending item. `original_data` is never touched.
/// A non-pending item is `InvalidState`.
pub async fn update_item(
    store: &dyn Store,
    user_id: Uuid,
    item_id: Uuid,
    data: Value,
) -> Result<InterpretationItemRow, AppError> {
    let item = with_transaction(store, move |tx| {
        Box::pin(async move {
            let item = load_owned_item(tx, user_id, item_id).await?;
            if ItemStatus::parse(&item.status) != Some(ItemStatus::Pending) {
                warn!("Refusing to edit item {item_id} in status '{}'", item.status);
                return Err(AppError::InvalidState(format!(
                    "Item {item_id} is '{}' and can no longer be edited",
                    item.status
                )));
            }
            validate_item_data(&item.resource_type, &data)?;

            if !tx.update_pending_item_data(item_id, &data, Utc::now()).await? {
                return Err(AppError::InvalidState(format!(
                    "Item {item_id} is no longer pending"
                )));
            }
            tx.find_item(item_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Item {item_id} not found")))
        })
    })
    .await?;

    info!("Updated item {}", item.id);
    Ok(item)
}
