//! Duel lifecycle: create -> join -> ready -> start -> session -> submit.
//!
//! Requests are stateless; every transition races through the store's
//! conditional updates. Expiry is evaluated lazily on read, there is no
//! background sweeper for matches.

use std::net::IpAddr;

use super::{generate_match_code, generate_player_key, validate_duration, validate_username};
use crate::error::ApiError;
use crate::protocol::{
    DuelJoinResponse, DuelPlayerView, DuelSessionResponse, DuelStartResponse, DuelView,
    MatchCreateResponse, MatchResult, SubmitOutcome,
};
use crate::state::rank::RankStats;
use crate::state::AppState;
use crate::store::{DuelMatch, DuelPlayer, ScoreRecord, StoreError};
use crate::timing;
use crate::token::SessionClaims;
use crate::types::{
    is_ranked_duration, is_speedrun, lower_is_better, outcome_of, DuelStatus, GameMode,
    DUEL_EXPIRY_MS, DUEL_SYNC_DELAY_MS, GRACE_WINDOW_MS, SPEEDRUN_CEILING_MS,
    TOKEN_EXPIRY_SLACK_MS,
};

/// Status as seen by clients: a lapsed match reads as expired no matter
/// what the stored row says.
fn effective_status(duel: &DuelMatch, now: i64) -> DuelStatus {
    match duel.status {
        DuelStatus::Waiting | DuelStatus::Active if now > duel.expires_at => DuelStatus::Expired,
        status => status,
    }
}

/// Window a participant has to finish the round once it starts.
fn play_window_ms(duration_ms: i64) -> i64 {
    let nominal = if is_speedrun(duration_ms) {
        SPEEDRUN_CEILING_MS
    } else {
        duration_ms
    };
    nominal + GRACE_WINDOW_MS + TOKEN_EXPIRY_SLACK_MS
}

impl AppState {
    pub async fn create_duel(
        &self,
        username: &str,
        duration_ms: i64,
        now: i64,
    ) -> Result<MatchCreateResponse, ApiError> {
        let username = validate_username(username)?;
        validate_duration(duration_ms)?;

        let match_id = loop {
            let code = generate_match_code();
            if self.store.get_duel(&code).await?.is_none() {
                break code;
            }
            // Collision - try again
        };
        let player_key = generate_player_key();

        let duel = DuelMatch {
            id: match_id.clone(),
            duration_ms,
            status: DuelStatus::Waiting,
            start_at: None,
            created_at: now,
            expires_at: now + DUEL_EXPIRY_MS,
        };
        let creator = DuelPlayer {
            match_id: match_id.clone(),
            player_key: player_key.clone(),
            username,
            ready: false,
            score: None,
            submitted_at: None,
        };
        self.store.create_duel(duel, creator).await?;

        tracing::info!(match_id, "Duel created");
        Ok(MatchCreateResponse {
            share_url: self.config.share_url("duel", &match_id),
            match_id,
            player_key,
        })
    }

    pub async fn join_duel(
        &self,
        match_id: &str,
        username: &str,
        now: i64,
    ) -> Result<DuelJoinResponse, ApiError> {
        let username = validate_username(username)?;
        let duel = self.require_duel(match_id).await?;

        match effective_status(&duel, now) {
            DuelStatus::Waiting => {}
            DuelStatus::Expired => return Err(ApiError::Conflict("duel has expired".into())),
            _ => return Err(ApiError::Conflict("duel is no longer joinable".into())),
        }

        let player_key = generate_player_key();
        let player = DuelPlayer {
            match_id: match_id.to_string(),
            player_key: player_key.clone(),
            username,
            ready: false,
            score: None,
            submitted_at: None,
        };
        match self.store.add_duel_player(player).await {
            Ok(()) => Ok(DuelJoinResponse { player_key }),
            Err(StoreError::MatchFull) => Err(ApiError::Conflict("duel is already full".into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Flip one participant's ready flag. Never transitions the match.
    pub async fn set_duel_ready(
        &self,
        match_id: &str,
        player_key: &str,
        ready: bool,
        now: i64,
    ) -> Result<(), ApiError> {
        let duel = self.require_duel(match_id).await?;
        match effective_status(&duel, now) {
            DuelStatus::Waiting => {}
            DuelStatus::Expired => return Err(ApiError::Conflict("duel has expired".into())),
            _ => return Err(ApiError::Conflict("duel has already started".into())),
        }

        match self.store.set_duel_ready(match_id, player_key, ready).await {
            Ok(()) => Ok(()),
            Err(StoreError::ParticipantNotFound) => {
                Err(ApiError::Forbidden("not a participant of this duel".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Book the shared countdown anchor. Requires two ready participants.
    ///
    /// The waiting -> active transition and `start_at` are written in one
    /// conditional update, so a concurrent second start cannot double-book
    /// the anchor; it simply reads back the one that won.
    pub async fn start_duel(&self, match_id: &str, now: i64) -> Result<DuelStartResponse, ApiError> {
        let duel = self.require_duel(match_id).await?;

        match effective_status(&duel, now) {
            DuelStatus::Waiting => {}
            DuelStatus::Active => {
                // Already started; report the booked anchor
                let start_at = duel
                    .start_at
                    .ok_or_else(|| StoreError::Backend("active duel without start_at".into()))?;
                return Ok(DuelStartResponse { start_at });
            }
            DuelStatus::Expired => return Err(ApiError::Conflict("duel has expired".into())),
            DuelStatus::Complete => {
                return Err(ApiError::Conflict("duel is already complete".into()))
            }
        }

        let players = self.store.duel_players(match_id).await?;
        if players.len() != 2 {
            return Err(ApiError::Conflict("duel needs two participants".into()));
        }
        if !players.iter().all(|p| p.ready) {
            return Err(ApiError::Conflict("both participants must be ready".into()));
        }

        let start_at = now + DUEL_SYNC_DELAY_MS;
        // Started rounds must outlive the lobby expiry
        let expires_at = start_at + play_window_ms(duel.duration_ms);
        let started = self
            .store
            .try_start_duel(match_id, start_at, expires_at)
            .await?;

        if started {
            tracing::info!(match_id, start_at, "Duel started");
            Ok(DuelStartResponse { start_at })
        } else {
            // Lost the race; the winner booked the anchor
            let duel = self.require_duel(match_id).await?;
            let start_at = duel
                .start_at
                .ok_or_else(|| StoreError::Backend("started duel without start_at".into()))?;
            Ok(DuelStartResponse { start_at })
        }
    }

    /// Issue a play-session token for one participant of an active duel.
    pub async fn duel_session(
        &self,
        match_id: &str,
        player_key: &str,
        now: i64,
    ) -> Result<DuelSessionResponse, ApiError> {
        let duel = self.require_duel(match_id).await?;

        match effective_status(&duel, now) {
            DuelStatus::Active => {}
            DuelStatus::Waiting => {
                return Err(ApiError::Conflict("duel has not started yet".into()))
            }
            DuelStatus::Expired => return Err(ApiError::Conflict("duel has expired".into())),
            DuelStatus::Complete => {
                return Err(ApiError::Conflict("duel is already complete".into()))
            }
        }

        let players = self.store.duel_players(match_id).await?;
        let me = players
            .iter()
            .find(|p| p.player_key == player_key)
            .ok_or_else(|| ApiError::Forbidden("not a participant of this duel".into()))?;
        if me.score.is_some() {
            return Err(ApiError::Conflict("already submitted".into()));
        }

        let start_at = duel
            .start_at
            .ok_or_else(|| StoreError::Backend("active duel without start_at".into()))?;

        let token = self.signer.issue(
            GameMode::Duel,
            duel.duration_ms,
            Some(match_id.to_string()),
            Some(player_key.to_string()),
            now,
        );
        Ok(DuelSessionResponse {
            token,
            start_at,
            duration_ms: duel.duration_ms,
        })
    }

    /// Accept one participant's score.
    ///
    /// The first submitter sees `waiting`. Whoever observes both scores
    /// present drives completion; the active -> complete conditional
    /// transition guards the leaderboard append so it runs at most once
    /// even when both submissions observe a finished board simultaneously.
    pub async fn submit_duel(
        &self,
        token: &str,
        score: i64,
        client: IpAddr,
        now: i64,
    ) -> Result<SubmitOutcome, ApiError> {
        let claims = self
            .signer
            .verify(token, now)
            .filter(|c| c.mode == GameMode::Duel)
            .ok_or(ApiError::InvalidToken)?;
        let (match_id, player_key) = scoped_ids(&claims)?;

        timing::validate(&claims, now)?;
        self.check_submit_rate("duel", client, Some(&player_key))
            .await?;

        let duel = self.require_duel(&match_id).await?;
        match effective_status(&duel, now) {
            DuelStatus::Active | DuelStatus::Complete => {}
            DuelStatus::Waiting => {
                return Err(ApiError::Conflict("duel has not started yet".into()))
            }
            DuelStatus::Expired => return Err(ApiError::Conflict("duel has expired".into())),
        }

        match self
            .store
            .record_duel_score(&match_id, &player_key, score, now)
            .await
        {
            Ok(()) => {}
            Err(StoreError::AlreadySubmitted) => {
                return Err(ApiError::Conflict("already submitted".into()))
            }
            Err(StoreError::ParticipantNotFound) => {
                return Err(ApiError::Forbidden("not a participant of this duel".into()))
            }
            Err(e) => return Err(e.into()),
        }

        let players = self.store.duel_players(&match_id).await?;
        let me = players
            .iter()
            .find(|p| p.player_key == player_key)
            .ok_or(StoreError::ParticipantNotFound)?;
        let opponent = players
            .iter()
            .find(|p| p.player_key != player_key)
            .ok_or_else(|| StoreError::Backend("started duel without opponent".into()))?;

        let (my_score, opponent_score) = match (me.score, opponent.score) {
            (Some(mine), Some(theirs)) => (mine, theirs),
            _ => return Ok(SubmitOutcome::Waiting),
        };

        let completed_now = self.store.try_complete_duel(&match_id).await?;
        if completed_now && is_ranked_duration(duel.duration_ms) {
            for p in &players {
                if let Some(s) = p.score {
                    self.store
                        .append_score(ScoreRecord {
                            id: ulid::Ulid::new().to_string(),
                            username: p.username.clone(),
                            score: s,
                            duration_ms: duel.duration_ms,
                            created_at: now,
                        })
                        .await?;
                }
            }
            tracing::info!(match_id, "Duel complete, scores recorded");
        }

        let (my_rank, opponent_rank) = self
            .duel_rank_stats(duel.duration_ms, my_score, opponent_score, now)
            .await?;

        Ok(SubmitOutcome::Complete {
            result: MatchResult {
                my_username: me.username.clone(),
                my_score,
                opponent_username: opponent.username.clone(),
                opponent_score,
                outcome: outcome_of(my_score, opponent_score, lower_is_better(duel.duration_ms)),
                my_rank,
                opponent_rank,
            },
        })
    }

    /// Poll view covering the lobby, countdown and result screens.
    pub async fn duel_view(
        &self,
        match_id: &str,
        player_key: Option<&str>,
        now: i64,
    ) -> Result<DuelView, ApiError> {
        let duel = self.require_duel(match_id).await?;
        let players = self.store.duel_players(match_id).await?;
        let status = effective_status(&duel, now);

        let result = match (status, player_key) {
            (DuelStatus::Complete, Some(key)) => {
                let me = players.iter().find(|p| p.player_key == key);
                let opponent = players.iter().find(|p| p.player_key != key);
                match (me, opponent) {
                    (Some(me), Some(opp)) => match (me.score, opp.score) {
                        (Some(mine), Some(theirs)) => {
                            let (my_rank, opponent_rank) = self
                                .duel_rank_stats(duel.duration_ms, mine, theirs, now)
                                .await?;
                            Some(MatchResult {
                                my_username: me.username.clone(),
                                my_score: mine,
                                opponent_username: opp.username.clone(),
                                opponent_score: theirs,
                                outcome: outcome_of(
                                    mine,
                                    theirs,
                                    lower_is_better(duel.duration_ms),
                                ),
                                my_rank,
                                opponent_rank,
                            })
                        }
                        _ => None,
                    },
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(DuelView {
            status,
            duration_ms: duel.duration_ms,
            start_at: duel.start_at,
            players: players
                .iter()
                .map(|p| DuelPlayerView {
                    username: p.username.clone(),
                    ready: p.ready,
                    submitted: p.score.is_some(),
                })
                .collect(),
            result,
        })
    }

    async fn require_duel(&self, match_id: &str) -> Result<DuelMatch, ApiError> {
        self.store
            .get_duel(match_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("duel {} not found", match_id)))
    }

    async fn duel_rank_stats(
        &self,
        duration_ms: i64,
        my_score: i64,
        opponent_score: i64,
        now: i64,
    ) -> Result<(Option<RankStats>, Option<RankStats>), ApiError> {
        if !is_ranked_duration(duration_ms) {
            return Ok((None, None));
        }
        let mine = self.compute_rank(duration_ms, my_score, now).await?;
        let theirs = self.compute_rank(duration_ms, opponent_score, now).await?;
        Ok((Some(mine), Some(theirs)))
    }
}

/// Match scoping is mandatory on duel/challenge tokens.
pub(crate) fn scoped_ids(claims: &SessionClaims) -> Result<(String, String), ApiError> {
    match (&claims.match_id, &claims.player_key) {
        (Some(m), Some(p)) => Ok((m.clone(), p.clone())),
        _ => Err(ApiError::InvalidToken),
    }
}
