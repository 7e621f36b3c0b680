//! PKCE staging: process-local `state → code_verifier` map.
//!
//! Entries are consumed at most once and expire after `STATE_TTL`. A
//! background sweeper evicts expired entries every `SWEEP_INTERVAL`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::AppError;

pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const RANDOM_BYTES: usize = 32;

/// What the authorization request needs from a freshly staged entry.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub state: String,
    pub code_challenge: String,
}

#[derive(Debug)]
struct StagedVerifier {
    code_verifier: String,
    created_at: Instant,
}

#[derive(Clone)]
pub struct PkceStore {
    entries: Arc<RwLock<HashMap<String, StagedVerifier>>>,
    ttl: Duration,
}

impl Default for PkceStore {
    fn default() -> Self {
        Self::new(STATE_TTL)
    }
}

impl PkceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Generates a new `state` and `code_verifier` and stages them.
    pub async fn begin(&self) -> PkceChallenge {
        let state = random_token();
        let code_verifier = random_token();
        let code_challenge = code_challenge(&code_verifier);

        self.entries.write().await.insert(
            state.clone(),
            StagedVerifier {
                code_verifier,
                created_at: Instant::now(),
            },
        );
        debug!("OAuth state staged");

        PkceChallenge {
            state,
            code_challenge,
        }
    }

    /// Removes the entry for `state` and returns its verifier. Unknown,
    /// already consumed and expired states are all `InvalidOAuthState`.
    pub async fn consume(&self, state: &str) -> Result<String, AppError> {
        let staged = self.entries.write().await.remove(state);

        match staged {
            Some(staged) if staged.created_at.elapsed() <= self.ttl => Ok(staged.code_verifier),
            Some(_) => {
                warn!("Rejected expired OAuth state");
                Err(AppError::InvalidOAuthState)
            }
            None => {
                warn!("Rejected unknown or replayed OAuth state");
                Err(AppError::InvalidOAuthState)
            }
        }
    }

    /// Evicts expired entries and returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, staged| staged.created_at.elapsed() <= self.ttl);
        before - entries.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    info!("Expired OAuth states removed: {removed}");
                }
            }
        })
    }
}

/// 256 bits from the OS RNG, URL-safe base64 without padding.
pub fn random_token() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `BASE64URL(SHA-256(code_verifier))`, the S256 challenge.
pub fn code_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}
