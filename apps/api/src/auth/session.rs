//! Session tokens: HS256 JWTs carrying `sub`, `jti`, `email`, `iat`, `nbf`, `exp`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

pub const MIN_SECRET_BYTES: usize = 32;
const TOKEN_LIFETIME_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub jti: String,
    pub email: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// Signs and verifies session tokens with one shared HMAC secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKeys(..)")
    }
}

impl SessionKeys {
    pub fn new(secret: &str) -> Result<Self, AppError> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(AppError::Configuration(format!(
                "JWT secret must be at least {MIN_SECRET_BYTES} bytes"
            )));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn mint(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        self.mint_at(user_id, email, Utc::now())
    }

    fn mint_at(&self, user_id: Uuid, email: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;
        info!("Session token minted: user_id={user_id}, jti={}", claims.jti);
        Ok(token)
    }

    /// Accepts only HS256 tokens signed with our secret, inside their
    /// `nbf..exp` window, carrying every claim.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let header = decode_header(token).map_err(|e| {
            warn!("Rejected session token with unreadable header: {e}");
            AppError::Unauthenticated("invalid token".into())
        })?;
        if header.alg != Algorithm::HS256 {
            warn!("Rejected session token signed with {:?}", header.alg);
            return Err(AppError::Unauthenticated("invalid token".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);
        validation.validate_nbf = true;
        validation.leeway = 0;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            warn!("Rejected session token: {e}");
            AppError::Unauthenticated("invalid or expired token".into())
        })?;

        if data.claims.jti.is_empty() || Uuid::parse_str(&data.claims.sub).is_err() {
            warn!("Rejected session token with malformed claims");
            return Err(AppError::Unauthenticated("invalid token".into()));
        }
        Ok(data.claims)
    }
}
