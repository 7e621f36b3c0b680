//! Identity provider seam. `GoogleProvider` is the production backend; tests
//! swap in a stub or point it at a mock server.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{error, info};

use crate::errors::AppError;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str =
    "https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/userinfo.profile";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Verified profile returned by the provider after a code exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying `state` and the S256 challenge.
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String, AppError>;

    /// Exchanges an authorization code (with its PKCE verifier) for the user's profile.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AppError>;
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GoogleProvider {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_url: String,
    endpoints: GoogleEndpoints,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl GoogleProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
        endpoints: GoogleEndpoints,
    ) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            client_id,
            client_secret,
            redirect_url,
            endpoints,
        })
    }

    async fn fetch_access_token(&self, code: &str, code_verifier: &str) -> anyhow::Result<String> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", code_verifier),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .send()
            .await
            .context("token request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("token endpoint returned {status}"));
        }
        let token: TokenResponse = response.json().await.context("unreadable token response")?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> anyhow::Result<ProviderProfile> {
        let response = self
            .http
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .context("userinfo request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("userinfo endpoint returned {status}"));
        }
        let info: UserInfo = response.json().await.context("unreadable userinfo response")?;

        let name = info
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| info.email.clone());
        Ok(ProviderProfile {
            provider_id: info.id,
            email: info.email,
            name,
            picture: info.picture.filter(|p| !p.is_empty()),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<String, AppError> {
        let url = Url::parse_with_params(
            &self.endpoints.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "offline"),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| AppError::Configuration(format!("Invalid authorization URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<ProviderProfile, AppError> {
        let access_token = self
            .fetch_access_token(code, code_verifier)
            .await
            .map_err(|e| {
                error!("Google code exchange failed: {e:#}");
                AppError::Internal(e.context("identity provider exchange failed"))
            })?;
        let profile = self.fetch_profile(&access_token).await.map_err(|e| {
            error!("Google profile fetch failed: {e:#}");
            AppError::Internal(e.context("identity provider profile fetch failed"))
        })?;

        info!("Identity provider exchange succeeded");
        Ok(profile)
    }
}
