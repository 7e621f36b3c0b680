use axum::{extract::State, Extension, Json};
use uuid::Uuid;

use crate::auth::middleware::Subject;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::items::approval::{approve_item, approve_items};
use crate::items::models::{
    ApproveItemResponse, ApproveItemsRequest, ApproveItemsResponse, ItemsResponse,
    UpdateItemRequest,
};
use crate::items::staging::{get_item, get_items, update_item};
use crate::models::interpretation::InterpretationItemRow;
use crate::state::AppState;

/// GET /api/v1/interpretations/:id/items
pub async fn handle_list_items(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(interpretation_id): ApiPath<Uuid>,
) -> Result<Json<ItemsResponse>, AppError> {
    let items = get_items(state.store.as_ref(), subject.user_id, interpretation_id).await?;
    Ok(Json(ItemsResponse { items }))
}

/// POST /api/v1/interpretations/:id/approve-items
pub async fn handle_approve_items(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(interpretation_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ApproveItemsRequest>,
) -> Result<Json<ApproveItemsResponse>, AppError> {
    let resource_ids = approve_items(
        state.store.as_ref(),
        subject.user_id,
        interpretation_id,
        req.item_ids,
    )
    .await?;
    Ok(Json(ApproveItemsResponse { resource_ids }))
}

/// GET /api/v1/interpretation-items/:id
pub async fn handle_get_item(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<Json<InterpretationItemRow>, AppError> {
    let item = get_item(state.store.as_ref(), subject.user_id, item_id).await?;
    Ok(Json(item))
}

/// PATCH /api/v1/interpretation-items/:id
pub async fn handle_update_item(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(item_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<Json<InterpretationItemRow>, AppError> {
    let item = update_item(state.store.as_ref(), subject.user_id, item_id, req.data).await?;
    Ok(Json(item))
}

/// POST /api/v1/interpretation-items/:id/approve
pub async fn handle_approve_item(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(item_id): ApiPath<Uuid>,
) -> Result<Json<ApproveItemResponse>, AppError> {
    let resource_id = approve_item(state.store.as_ref(), subject.user_id, item_id).await?;
    Ok(Json(ApproveItemResponse { resource_id }))
}
