//! Signed session capability tokens.
//!
//! A token authorizes exactly one scored play session. It is stateless: the
//! server keeps no session table, the signed claims are the whole artifact a
//! client carries between "start round" and "submit score". Format:
//! `base64url(claims_json).base64url(hmac_sha256(claims_json))`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::{
    is_speedrun, GameMode, MatchId, PlayerKey, GRACE_WINDOW_MS, SPEEDRUN_CEILING_MS,
    TOKEN_EXPIRY_SLACK_MS,
};

type HmacSha256 = Hmac<Sha256>;

/// Signed claims carried by a session token. All fields are tamper-evident:
/// altering any of them invalidates the signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub mode: GameMode,
    pub duration_ms: i64,
    pub issued_at: i64,
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_id: Option<MatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_key: Option<PlayerKey>,
}

/// Issues and verifies session tokens with a server-held symmetric secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a token for one play session starting now.
    ///
    /// Speedrun rounds have no predetermined length, so their token window
    /// is a generous fixed ceiling instead of `duration_ms`.
    pub fn issue(
        &self,
        mode: GameMode,
        duration_ms: i64,
        match_id: Option<MatchId>,
        player_key: Option<PlayerKey>,
        now: i64,
    ) -> String {
        let effective_window = if is_speedrun(duration_ms) {
            SPEEDRUN_CEILING_MS
        } else {
            duration_ms
        };
        let claims = SessionClaims {
            mode,
            duration_ms,
            issued_at: now,
            expires_at: now + effective_window + GRACE_WINDOW_MS + TOKEN_EXPIRY_SLACK_MS,
            match_id,
            player_key,
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &SessionClaims) -> String {
        // Serialization of a plain struct cannot fail
        let payload = serde_json::to_vec(claims).expect("claims serialize");
        let sig = self.mac(&payload);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig)
        )
    }

    /// Validate signature and embedded expiry, returning the claims.
    ///
    /// Every failure mode (malformed, tampered, wrong secret, expired)
    /// collapses to `None`; nothing past this boundary throws.
    pub fn verify(&self, token: &str, now: i64) -> Option<SessionClaims> {
        let (payload_b64, sig_b64) = token.split_once('.')?;
        if sig_b64.contains('.') {
            return None;
        }
        let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(&payload);
        // Constant-time comparison
        mac.verify_slice(&sig).ok()?;

        let claims: SessionClaims = serde_json::from_slice(&payload).ok()?;
        if now > claims.expires_at {
            return None;
        }
        Some(claims)
    }

    fn mac(&self, data: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("hmac accepts any key size");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }
}
