pub mod health;

use std::time::Duration;

use anyhow::{bail, Context};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use reqwest::Url;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::auth::{handlers as auth, middleware::require_session};
use crate::errors::AppError;
use crate::interpretation::handlers as interpretations;
use crate::items::handlers as items;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/api/v1/interpretations",
            post(interpretations::handle_create_interpretation)
                .get(interpretations::handle_list_interpretations),
        )
        .route(
            "/api/v1/interpretations/:id",
            get(interpretations::handle_get_interpretation),
        )
        .route(
            "/api/v1/interpretations/:id/items",
            get(items::handle_list_items),
        )
        .route(
            "/api/v1/interpretations/:id/approve-items",
            post(items::handle_approve_items),
        )
        .route(
            "/api/v1/interpretation-items/:id",
            get(items::handle_get_item).patch(items::handle_update_item),
        )
        .route(
            "/api/v1/interpretation-items/:id/approve",
            post(items::handle_approve_item),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/provider", get(auth::handle_begin_auth))
        .route(
            "/auth/provider/callback",
            get(auth::handle_callback_query).post(auth::handle_callback_body),
        )
        .merge(api)
        .with_state(state)
}

/// Applies the per-request deadline. Expired requests still answer with the
/// `{code, message}` body.
pub fn with_request_deadline(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(envelope_timeout))
}

async fn envelope_timeout(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        AppError::RequestTimeout.into_response()
    } else {
        response
    }
}

/// CORS restricted to the origin of the front-end callback URL.
pub fn frontend_cors(frontend_callback_url: &str) -> anyhow::Result<CorsLayer> {
    let url = Url::parse(frontend_callback_url)
        .with_context(|| format!("FRONTEND_CALLBACK_URL '{frontend_callback_url}' is not a URL"))?;
    let origin = url.origin();
    if !origin.is_tuple() {
        bail!("FRONTEND_CALLBACK_URL '{frontend_callback_url}' has no usable origin");
    }
    let origin = HeaderValue::from_str(&origin.ascii_serialization())?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}
