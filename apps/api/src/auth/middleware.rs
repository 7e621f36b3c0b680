use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// Authenticated caller, inserted into request extensions by `require_session`.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: Uuid,
    pub email: String,
}

/// Rejects requests without a valid `Authorization: Bearer <token>`.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let claims = state.sessions.verify(token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthenticated("invalid token subject".into()))?;

    request.extensions_mut().insert(Subject {
        user_id,
        email: claims.email,
    });
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let authz = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("missing Authorization header".into()))?;

    let token = authz
        .strip_prefix("Bearer ")
        .or_else(|| authz.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthenticated("Authorization must be a Bearer token".into()))?;

    if token.is_empty() {
        return Err(AppError::Unauthenticated("Bearer token is empty".into()));
    }
    Ok(token)
}
