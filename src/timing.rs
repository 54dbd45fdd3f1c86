//! Server-side submission timing policy.
//!
//! A pure function of the token claims and the submission wall-clock time.
//! Client-reported timers are never consulted.

use thiserror::Error;

use crate::token::SessionClaims;
use crate::types::{is_speedrun, GRACE_WINDOW_MS, MIN_SUBMIT_DELAY_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimingError {
    /// Arrived before any gameplay could plausibly have occurred.
    #[error("too early")]
    TooEarly,
    /// Arrived past the nominal round end plus the grace window.
    #[error("too late")]
    TooLate,
    /// Past the token's own embedded expiry.
    #[error("token expired")]
    TokenExpired,
}

/// Decide whether a submission at `submitted_at` is validly timed for
/// `claims`. Speedrun rounds have no predetermined length and skip the
/// duration bound, but remain subject to token expiry.
pub fn validate(claims: &SessionClaims, submitted_at: i64) -> Result<(), TimingError> {
    if submitted_at < claims.issued_at + MIN_SUBMIT_DELAY_MS {
        return Err(TimingError::TooEarly);
    }
    if !is_speedrun(claims.duration_ms)
        && submitted_at > claims.issued_at + claims.duration_ms + GRACE_WINDOW_MS
    {
        return Err(TimingError::TooLate);
    }
    // Defense in depth: verify() already enforces this bound
    if submitted_at > claims.expires_at {
        return Err(TimingError::TokenExpired);
    }
    Ok(())
}
