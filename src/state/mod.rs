mod challenge;
mod duel;
pub mod rank;
mod solo;

use rand::Rng;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::limiter::{MemoryRateLimiter, RateDecision, RateLimitStore};
use crate::store::{MemoryStore, Store};
use crate::token::TokenSigner;
use crate::types::{
    is_speedrun, PlayerKey, CUSTOM_DURATION_MAX_MS, CUSTOM_DURATION_MIN_MS,
};

/// Safe character set for match codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

const MAX_USERNAME_CHARS: usize = 24;

/// Shared application state: every durable fact lives behind the store
/// traits, so concurrent requests for one match race only through the
/// store's atomic operations.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub limiter: Arc<dyn RateLimitStore>,
    pub signer: TokenSigner,
    pub config: AppConfig,
}

impl AppState {
    /// State backed by the in-process store and limiter.
    pub fn new(config: AppConfig) -> Self {
        Self::with_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRateLimiter::new()),
            config,
        )
    }

    /// State over injected store and limiter implementations.
    pub fn with_parts(
        store: Arc<dyn Store>,
        limiter: Arc<dyn RateLimitStore>,
        config: AppConfig,
    ) -> Self {
        let signer = TokenSigner::new(config.signing_secret.clone());
        Self {
            store,
            limiter,
            signer,
            config,
        }
    }

    /// Rate-limit gate for submission endpoints. Keys combine the client
    /// address with the participant identity where one exists, so players
    /// behind a shared IP do not starve each other. Runs before any store
    /// write.
    pub(crate) async fn check_submit_rate(
        &self,
        scope: &str,
        client: IpAddr,
        player_key: Option<&str>,
    ) -> Result<(), ApiError> {
        let key = match player_key {
            Some(pk) => format!("{}:{}:{}", scope, client, pk),
            None => format!("{}:{}", scope, client),
        };
        match self
            .limiter
            .check(&key, self.config.submit_max_requests, self.config.submit_window)
            .await
        {
            RateDecision::Allowed => Ok(()),
            RateDecision::Limited { retry_after_secs } => {
                tracing::warn!(key, "Rate limited submission");
                Err(ApiError::RateLimited { retry_after_secs })
            }
        }
    }
}

/// Accept the speedrun sentinel or a bounded custom duration.
pub(crate) fn validate_duration(duration_ms: i64) -> Result<(), ApiError> {
    if is_speedrun(duration_ms)
        || (CUSTOM_DURATION_MIN_MS..=CUSTOM_DURATION_MAX_MS).contains(&duration_ms)
    {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "duration_ms must be the speedrun sentinel or between {} and {}",
            CUSTOM_DURATION_MIN_MS, CUSTOM_DURATION_MAX_MS
        )))
    }
}

pub(crate) fn validate_username(username: &str) -> Result<String, ApiError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation("username must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        return Err(ApiError::Validation(format!(
            "username must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Generate a random shareable match code.
pub(crate) fn generate_match_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Opaque per-match capability credential for one participant.
pub(crate) fn generate_player_key() -> PlayerKey {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::net::TrustedProxies;
    use std::net::SocketAddr;
    use std::time::Duration;

    pub fn test_config() -> AppConfig {
        AppConfig {
            signing_secret: b"test-secret".to_vec(),
            base_url: "http://localhost:6767".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 6767)),
            submit_max_requests: 100,
            submit_window: Duration::from_secs(10),
            trusted_proxies: TrustedProxies::default(),
        }
    }

    pub fn test_state() -> AppState {
        AppState::new(test_config())
    }

    pub fn client() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_duration() {
        assert!(validate_duration(crate::types::SPEEDRUN_DURATION).is_ok());
        assert!(validate_duration(6_700).is_ok());
        assert!(validate_duration(67_000).is_ok());
        assert!(validate_duration(300_000).is_ok());
        assert!(validate_duration(4_999).is_err());
        assert!(validate_duration(300_001).is_err());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(-2).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  alice  ").unwrap(), "alice");
        assert!(validate_username("   ").is_err());
        assert!(validate_username(&"x".repeat(25)).is_err());
    }

    #[test]
    fn test_generated_identifiers() {
        let code = generate_match_code();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));

        let key = generate_player_key();
        assert_eq!(key.len(), 32);
        assert_ne!(key, generate_player_key());
    }
}
