//! Environment-driven server configuration.

use rand::RngCore;
use std::net::SocketAddr;
use std::time::Duration;

use crate::net::TrustedProxies;

const DEFAULT_PORT: u16 = 6767;

#[derive(Clone)]
pub struct AppConfig {
    /// Symmetric key for session token signing.
    pub signing_secret: Vec<u8>,
    /// Public base URL used to build shareable match links.
    pub base_url: String,
    pub bind_addr: SocketAddr,
    /// Submission endpoints allow this many requests per key per window.
    pub submit_max_requests: u32,
    pub submit_window: Duration,
    pub trusted_proxies: TrustedProxies,
}

impl AppConfig {
    /// Load config from environment variables.
    ///
    /// `SESSION_SIGNING_SECRET` must be hex-encoded. Without it a random
    /// key is generated, which works but invalidates all outstanding
    /// session tokens on restart.
    pub fn from_env() -> Self {
        let signing_secret = std::env::var("SESSION_SIGNING_SECRET")
            .ok()
            .and_then(|hex_key| match hex::decode(hex_key.trim()) {
                Ok(key) if !key.is_empty() => Some(key),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("SESSION_SIGNING_SECRET is not valid hex: {}", e);
                    None
                }
            })
            .unwrap_or_else(|| {
                tracing::warn!(
                    "SESSION_SIGNING_SECRET not set - using a random key, session tokens will not survive a restart"
                );
                let mut key = vec![0u8; 32];
                rand::rng().fill_bytes(&mut key);
                key
            });

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let base_url = std::env::var("BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let submit_max_requests = std::env::var("RATE_LIMIT_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let window_secs = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let trusted_proxies = std::env::var("TRUSTED_PROXY_RANGES")
            .map(|v| TrustedProxies::parse(&v))
            .unwrap_or_default();

        tracing::info!(
            port,
            base_url,
            submit_max_requests,
            window_secs,
            "Config loaded"
        );

        Self {
            signing_secret,
            base_url,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            submit_max_requests,
            submit_window: Duration::from_secs(window_secs),
            trusted_proxies,
        }
    }

    pub fn share_url(&self, kind: &str, match_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, kind, match_id)
    }
}
