use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::users::{upsert_user, SignedInUser};
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

#[derive(Serialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// Parameters the provider sends back. `error` is set when the user declined.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /auth/provider
pub async fn handle_begin_auth(
    State(state): State<AppState>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let challenge = state.pkce.begin().await;
    let auth_url = state
        .provider
        .authorization_url(&challenge.state, &challenge.code_challenge)?;
    Ok(Json(AuthUrlResponse { auth_url }))
}

/// GET /auth/provider/callback
pub async fn handle_callback_query(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CallbackParams>,
) -> Result<Response, AppError> {
    complete_sign_in(&state, params).await
}

/// POST /auth/provider/callback
pub async fn handle_callback_body(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<CallbackParams>,
) -> Result<Response, AppError> {
    complete_sign_in(&state, params).await
}

async fn complete_sign_in(state: &AppState, params: CallbackParams) -> Result<Response, AppError> {
    if let Some(error) = params.error {
        warn!("Identity provider returned error: {error}");
        return Err(AppError::InvalidRequest(format!(
            "authorization was not granted: {error}"
        )));
    }
    let oauth_state = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("missing state parameter".into()))?;
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("missing code parameter".into()))?;

    // The state is spent even if the exchange below fails.
    let code_verifier = state.pkce.consume(&oauth_state).await?;
    let profile = state.provider.exchange_code(&code, &code_verifier).await?;
    let user = upsert_user(state.store.as_ref(), profile).await?;
    let token = state.sessions.mint(user.id, &user.email)?;

    let user_json = serde_json::to_string(&SignedInUser::from(user))
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
    let location = Url::parse_with_params(
        &state.frontend_callback_url,
        &[("token", token.as_str()), ("user", user_json.as_str())],
    )
    .map_err(|e| AppError::Configuration(format!("Invalid frontend callback URL: {e}")))?;

    Ok((StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response())
}
