use std::sync::Arc;

use crate::auth::pkce::PkceStore;
use crate::auth::provider::IdentityProvider;
use crate::auth::session::SessionKeys;
use crate::db::Store;
use crate::interpretation::interpreter::Interpreter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// `None` when no Gemini API key is configured.
    pub interpreter: Option<Arc<dyn Interpreter>>,
    pub provider: Arc<dyn IdentityProvider>,
    pub sessions: SessionKeys,
    pub pkce: PkceStore,
    /// Where a successful sign-in redirects to.
    pub frontend_callback_url: String,
}
