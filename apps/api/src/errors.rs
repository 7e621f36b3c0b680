use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant renders as `{"code": ..., "message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A pre-condition on stored state was violated, e.g. approving a non-pending item.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The OAuth `state` parameter is unknown, expired, or already consumed.
    #[error("Invalid or expired OAuth state parameter")]
    InvalidOAuthState,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Language model unavailable: {0}")]
    LanguageModelUnavailable(String),

    #[error("Language model returned no candidates")]
    LanguageModelEmpty,

    /// `raw` is kept for diagnosis and never sent to the client.
    #[error("Language model output is malformed: {message}")]
    LanguageModelMalformed { message: String, raw: String },

    /// The per-request deadline elapsed before a response was produced.
    #[error("Request timed out")]
    RequestTimeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::InvalidOAuthState => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::UnsupportedResourceType(_) | AppError::LanguageModelMalformed { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::LanguageModelUnavailable(_) | AppError::LanguageModelEmpty => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Configuration(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::InvalidState(_) | AppError::InvalidOAuthState => "invalid_state",
            AppError::NotFound(_) => "not_found",
            AppError::UnsupportedResourceType(_) => "unsupported_resource_type",
            AppError::LanguageModelUnavailable(_) => "language_model_unavailable",
            AppError::LanguageModelEmpty => "language_model_empty",
            AppError::LanguageModelMalformed { .. } => "language_model_malformed",
            AppError::RequestTimeout => "request_timeout",
            AppError::Configuration(_) => "configuration_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::InvalidRequest(msg)
            | AppError::Unauthenticated(msg)
            | AppError::InvalidState(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::InvalidOAuthState => "Invalid or expired state parameter".to_string(),
            AppError::UnsupportedResourceType(kind) => {
                format!("Resource type '{kind}' cannot be approved")
            }
            AppError::LanguageModelUnavailable(msg) => {
                tracing::error!("Language model unavailable: {msg}");
                "The AI service is temporarily unavailable".to_string()
            }
            AppError::LanguageModelEmpty => {
                tracing::error!("Language model returned no candidates");
                "The AI service returned no result".to_string()
            }
            AppError::LanguageModelMalformed { message, raw } => {
                tracing::warn!("Malformed language model output: {message}");
                tracing::debug!("Raw language model output: {raw}");
                "The AI service returned an unreadable result".to_string()
            }
            AppError::RequestTimeout => {
                tracing::warn!("Request deadline elapsed");
                "The request took too long and was cancelled".to_string()
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                "Server configuration error".to_string()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "code": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}
