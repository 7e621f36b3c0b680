mod auth;
mod config;
mod db;
mod errors;
mod extract;
mod interpretation;
mod items;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::pkce::{PkceStore, SWEEP_INTERVAL};
use crate::auth::provider::{GoogleEndpoints, GoogleProvider};
use crate::auth::session::SessionKeys;
use crate::config::Config;
use crate::db::{create_pool, run_migrations, PgStore};
use crate::interpretation::interpreter::{GeminiInterpreter, Interpreter};
use crate::interpretation::prompts::PromptTemplate;
use crate::llm_client::LlmClient;
use crate::routes::{build_router, frontend_cors, with_request_deadline};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting plan API v{}", env!("CARGO_PKG_VERSION"));

    // Validate the embedded prompt template once, before serving
    let prompt = PromptTemplate::interpretation().context("invalid embedded prompt template")?;

    // Initialize PostgreSQL
    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;

    // Initialize language model client (optional)
    let interpreter: Option<Arc<dyn Interpreter>> = match &config.gemini_api_key {
        Some(api_key) => {
            let client = LlmClient::new(api_key.as_str(), config.gemini_model.as_str())?;
            info!("LLM client initialized (model: {})", client.model());
            Some(Arc::new(GeminiInterpreter::new(client, prompt)))
        }
        None => {
            warn!("GEMINI_API_KEY not set; interpretation endpoints are disabled");
            None
        }
    };

    // Initialize identity gate
    let sessions = SessionKeys::new(&config.jwt_secret)?;
    let provider = GoogleProvider::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_redirect_url.clone(),
        GoogleEndpoints::default(),
    )?;
    let pkce = PkceStore::default();
    let _sweeper = pkce.spawn_sweeper(SWEEP_INTERVAL);

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        interpreter,
        provider: Arc::new(provider),
        sessions,
        pkce,
        frontend_callback_url: config.frontend_callback_url.clone(),
    };

    // Build router
    let cors = frontend_cors(&config.frontend_callback_url)?;
    let app = with_request_deadline(build_router(state), config.request_timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
