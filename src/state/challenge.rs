//! Asynchronous challenge lifecycle: create -> (anyone) session -> submit.
//!
//! Unlike a duel there is no lobby: the creator plays immediately and the
//! opponent may show up days later. Entries are created at submission time;
//! the `(match_id, player_key)` uniqueness constraint is the authoritative
//! double-submission defense.

use std::net::IpAddr;

use super::duel::scoped_ids;
use super::{generate_match_code, generate_player_key, validate_duration, validate_username};
use crate::error::ApiError;
use crate::protocol::{
    ChallengeSessionResponse, ChallengeView, MatchCreateResponse, MatchResult, SubmitOutcome,
};
use crate::state::AppState;
use crate::store::{ChallengeEntry, ChallengeMatch, StoreError};
use crate::timing;
use crate::types::{
    lower_is_better, outcome_of, ChallengeStatus, GameMode, CHALLENGE_EXPIRY_MS,
};

fn effective_status(challenge: &ChallengeMatch, now: i64) -> ChallengeStatus {
    match challenge.status {
        ChallengeStatus::Pending if now > challenge.expires_at => ChallengeStatus::Expired,
        status => status,
    }
}

impl AppState {
    pub async fn create_challenge(
        &self,
        username: &str,
        duration_ms: i64,
        now: i64,
    ) -> Result<MatchCreateResponse, ApiError> {
        let username = validate_username(username)?;
        validate_duration(duration_ms)?;

        let match_id = loop {
            let code = generate_match_code();
            if self.store.get_challenge(&code).await?.is_none() {
                break code;
            }
        };
        let player_key = generate_player_key();

        self.store
            .create_challenge(ChallengeMatch {
                id: match_id.clone(),
                duration_ms,
                status: ChallengeStatus::Pending,
                creator_username: username,
                created_at: now,
                expires_at: now + CHALLENGE_EXPIRY_MS,
            })
            .await?;

        tracing::info!(match_id, "Challenge created");
        Ok(MatchCreateResponse {
            share_url: self.config.share_url("challenge", &match_id),
            match_id,
            player_key,
        })
    }

    /// Issue a play-session token for a challenge.
    ///
    /// Open to any caller supplying the match id and a player key of their
    /// choosing, gated on: match exists and is not expired, the key has no
    /// entry yet (no replaying against your own earlier run), and fewer
    /// than two entries exist.
    pub async fn challenge_session(
        &self,
        match_id: &str,
        player_key: &str,
        now: i64,
    ) -> Result<ChallengeSessionResponse, ApiError> {
        let challenge = self.require_challenge(match_id).await?;
        match effective_status(&challenge, now) {
            ChallengeStatus::Pending => {}
            ChallengeStatus::Expired => {
                return Err(ApiError::Conflict("challenge has expired".into()))
            }
            ChallengeStatus::Complete => {
                return Err(ApiError::Conflict("challenge is already complete".into()))
            }
        }

        let entries = self.store.challenge_entries(match_id).await?;
        if entries.iter().any(|e| e.player_key == player_key) {
            return Err(ApiError::Conflict("already submitted".into()));
        }
        if entries.len() >= 2 {
            return Err(ApiError::Conflict(
                "challenge already has two entries".into(),
            ));
        }

        let token = self.signer.issue(
            GameMode::Challenge,
            challenge.duration_ms,
            Some(match_id.to_string()),
            Some(player_key.to_string()),
            now,
        );
        Ok(ChallengeSessionResponse {
            token,
            duration_ms: challenge.duration_ms,
        })
    }

    pub async fn submit_challenge(
        &self,
        token: &str,
        username: &str,
        score: i64,
        client: IpAddr,
        now: i64,
    ) -> Result<SubmitOutcome, ApiError> {
        let claims = self
            .signer
            .verify(token, now)
            .filter(|c| c.mode == GameMode::Challenge)
            .ok_or(ApiError::InvalidToken)?;
        let (match_id, player_key) = scoped_ids(&claims)?;
        let username = validate_username(username)?;

        timing::validate(&claims, now)?;
        self.check_submit_rate("challenge", client, Some(&player_key))
            .await?;

        let challenge = self.require_challenge(&match_id).await?;
        if effective_status(&challenge, now) == ChallengeStatus::Expired {
            return Err(ApiError::Conflict("challenge has expired".into()));
        }

        match self
            .store
            .insert_challenge_entry(ChallengeEntry {
                match_id: match_id.clone(),
                player_key: player_key.clone(),
                username,
                score,
                created_at: now,
            })
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadySubmitted) => {
                return Err(ApiError::Conflict("already submitted".into()))
            }
            Err(StoreError::MatchFull) => {
                return Err(ApiError::Conflict(
                    "challenge already has two entries".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let entries = self.store.challenge_entries(&match_id).await?;
        let me = entries
            .iter()
            .find(|e| e.player_key == player_key)
            .ok_or(StoreError::ParticipantNotFound)?;
        let opponent = entries.iter().find(|e| e.player_key != player_key);

        let Some(opponent) = opponent else {
            return Ok(SubmitOutcome::Waiting);
        };

        // Either submitter's request may observe the pair first; the
        // conditional transition keeps completion single-shot.
        self.store.try_complete_challenge(&match_id).await?;
        tracing::info!(match_id, "Challenge complete");

        Ok(SubmitOutcome::Complete {
            result: MatchResult {
                my_username: me.username.clone(),
                my_score: me.score,
                opponent_username: opponent.username.clone(),
                opponent_score: opponent.score,
                outcome: outcome_of(
                    me.score,
                    opponent.score,
                    lower_is_better(challenge.duration_ms),
                ),
                my_rank: None,
                opponent_rank: None,
            },
        })
    }

    /// Poll view for the share and result screens.
    pub async fn challenge_view(
        &self,
        match_id: &str,
        player_key: Option<&str>,
        now: i64,
    ) -> Result<ChallengeView, ApiError> {
        let challenge = self.require_challenge(match_id).await?;
        let entries = self.store.challenge_entries(match_id).await?;
        let status = effective_status(&challenge, now);

        let result = match (status, player_key) {
            (ChallengeStatus::Complete, Some(key)) => {
                let me = entries.iter().find(|e| e.player_key == key);
                let opponent = entries.iter().find(|e| e.player_key != key);
                match (me, opponent) {
                    (Some(me), Some(opp)) => Some(MatchResult {
                        my_username: me.username.clone(),
                        my_score: me.score,
                        opponent_username: opp.username.clone(),
                        opponent_score: opp.score,
                        outcome: outcome_of(
                            me.score,
                            opp.score,
                            lower_is_better(challenge.duration_ms),
                        ),
                        my_rank: None,
                        opponent_rank: None,
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(ChallengeView {
            status,
            duration_ms: challenge.duration_ms,
            creator_username: challenge.creator_username.clone(),
            entry_count: entries.len(),
            result,
        })
    }

    async fn require_challenge(&self, match_id: &str) -> Result<ChallengeMatch, ApiError> {
        self.store
            .get_challenge(match_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("challenge {} not found", match_id)))
    }
}
