use axum::{extract::State, Extension, Json};
use tracing::debug;
use uuid::Uuid;

use crate::auth::middleware::Subject;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::interpretation::models::{
    CreateInterpretationRequest, InterpretationPage, InterpretationResponse, ListParams,
};
use crate::interpretation::store::{get_interpretation, list_interpretations, stage_interpretation};
use crate::models::interpretation::InterpretationRow;
use crate::state::AppState;

/// POST /api/v1/interpretations
pub async fn handle_create_interpretation(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiJson(req): ApiJson<CreateInterpretationRequest>,
) -> Result<Json<InterpretationResponse>, AppError> {
    if req.input_text.trim().is_empty() {
        return Err(AppError::InvalidRequest("input_text must not be empty".into()));
    }
    let interpreter = state
        .interpreter
        .as_ref()
        .ok_or_else(|| AppError::Configuration("AI service is not configured".into()))?;

    debug!(
        "Interpreting {} chars for {} ({})",
        req.input_text.len(),
        subject.user_id,
        subject.email
    );
    let model = interpreter.interpret(&req.input_text).await?;
    let kind = model.result.kind;
    let (interpretation, items) =
        stage_interpretation(state.store.as_ref(), subject.user_id, req.input_text, model).await?;

    let message = Some(format!("{} item(s) staged for review", items.len()));
    Ok(Json(InterpretationResponse {
        kind,
        interpretation,
        items,
        message,
    }))
}

/// GET /api/v1/interpretations
pub async fn handle_list_interpretations(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<InterpretationPage>, AppError> {
    let page = list_interpretations(state.store.as_ref(), subject.user_id, params).await?;
    Ok(Json(page))
}

/// GET /api/v1/interpretations/:id
pub async fn handle_get_interpretation(
    State(state): State<AppState>,
    Extension(subject): Extension<Subject>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<InterpretationRow>, AppError> {
    let row = get_interpretation(state.store.as_ref(), subject.user_id, id).await?;
    Ok(Json(row))
}
