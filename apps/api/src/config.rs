use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sqlx::postgres::PgConnectOptions;

use crate::auth::session::MIN_SECRET_BYTES;
use crate::llm_client::DEFAULT_MODEL;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DB_HOST: &str = "127.0.0.1";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_REDIRECT_URL: &str = "http://localhost:8080/auth/provider/callback";
const DEFAULT_FRONTEND_CALLBACK_URL: &str = "http://localhost:5173/auth/callback";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or invalid.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: PgConnectOptions,
    pub jwt_secret: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,
    pub frontend_callback_url: String,
    /// Interpretation endpoints answer with a configuration error when unset.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub request_timeout: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let jwt_secret = require("JWT_SECRET")?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            bail!("JWT_SECRET must be at least {MIN_SECRET_BYTES} bytes");
        }

        let database = match get("DB_DSN") {
            Some(dsn) => {
                PgConnectOptions::from_str(&dsn).context("DB_DSN is not a valid Postgres URL")?
            }
            None => {
                let user = require("DB_USER").context("set DB_DSN or DB_USER/DB_PASSWORD/DB_NAME")?;
                PgConnectOptions::new()
                    .host(&get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()))
                    .port(parse_or("DB_PORT", get("DB_PORT"), DEFAULT_DB_PORT)?)
                    .username(&user)
                    .password(&require("DB_PASSWORD")?)
                    .database(&require("DB_NAME")?)
            }
        };

        Ok(Config {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            database,
            jwt_secret,
            google_client_id: require("GOOGLE_CLIENT_ID")?,
            google_client_secret: require("GOOGLE_CLIENT_SECRET")?,
            google_redirect_url: get("GOOGLE_REDIRECT_URL")
                .unwrap_or_else(|| DEFAULT_REDIRECT_URL.to_string()),
            frontend_callback_url: get("FRONTEND_CALLBACK_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_CALLBACK_URL.to_string()),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL")
                .or_else(|| get("GEMINI_MODEL_NAME"))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            request_timeout: Duration::from_secs(parse_or(
                "REQUEST_TIMEOUT_SECS",
                get("REQUEST_TIMEOUT_SECS"),
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", SECRET),
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("DB_DSN", "postgres://plan:pw@db:5433/plan"),
        ]
    }

    #[test]
    fn test_defaults_apply() {
        let config = load(&base()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_model, "gemini-2.5-flash-lite");
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.google_redirect_url, DEFAULT_REDIRECT_URL);
        assert_eq!(config.database.get_port(), 5433);
        assert_eq!(config.database.get_host(), "db");
    }

    #[test]
    fn test_short_jwt_secret_fails() {
        let mut vars = base();
        vars[0] = ("JWT_SECRET", "short");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_missing_required_variable_fails() {
        let vars: Vec<_> = base()
            .into_iter()
            .filter(|(k, _)| *k != "GOOGLE_CLIENT_ID")
            .collect();
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_CLIENT_ID"));
    }

    #[test]
    fn test_database_from_parts() {
        let mut vars: Vec<_> = base().into_iter().filter(|(k, _)| *k != "DB_DSN").collect();
        vars.extend([
            ("DB_USER", "plan"),
            ("DB_PASSWORD", "pw"),
            ("DB_NAME", "plan"),
            ("DB_PORT", "6543"),
        ]);
        let config = load(&vars).unwrap();
        assert_eq!(config.database.get_port(), 6543);
        assert_eq!(config.database.get_host(), DEFAULT_DB_HOST);
        assert_eq!(config.database.get_database(), Some("plan"));

        let without_db: Vec<_> = vars.into_iter().filter(|(k, _)| *k != "DB_USER").collect();
        assert!(load(&without_db).is_err());
    }

    #[test]
    fn test_model_alias_and_invalid_port() {
        let mut vars = base();
        vars.push(("GEMINI_MODEL_NAME", "gemini-pro"));
        assert_eq!(load(&vars).unwrap().gemini_model, "gemini-pro");

        vars.push(("PORT", "eighty"));
        assert!(load(&vars).is_err());
    }
}
