//! Solo rounds and the public leaderboard.

use std::net::IpAddr;

use super::{validate_duration, validate_username};
use crate::error::ApiError;
use crate::protocol::{
    LeaderboardEntry, LeaderboardResponse, SoloSubmitResponse, TokenResponse,
};
use crate::state::AppState;
use crate::store::ScoreRecord;
use crate::timing;
use crate::types::{is_ranked_duration, lower_is_better, GameMode};

const LEADERBOARD_LIMIT: usize = 100;

impl AppState {
    pub fn solo_session(&self, duration_ms: i64, now: i64) -> Result<TokenResponse, ApiError> {
        validate_duration(duration_ms)?;
        let token = self
            .signer
            .issue(GameMode::Solo, duration_ms, None, None, now);
        Ok(TokenResponse { token })
    }

    /// Persist a solo score and rank it.
    ///
    /// Custom-duration practice rounds are validated like any other but
    /// never reach the ranked table; they come back with a null score id.
    pub async fn submit_solo(
        &self,
        token: &str,
        username: &str,
        score: i64,
        client: IpAddr,
        now: i64,
    ) -> Result<SoloSubmitResponse, ApiError> {
        let claims = self
            .signer
            .verify(token, now)
            .filter(|c| c.mode == GameMode::Solo)
            .ok_or(ApiError::InvalidToken)?;
        let username = validate_username(username)?;

        timing::validate(&claims, now)?;
        self.check_submit_rate("solo", client, None).await?;

        if !is_ranked_duration(claims.duration_ms) {
            return Ok(SoloSubmitResponse {
                score_id: None,
                rank: None,
            });
        }

        let record = ScoreRecord {
            id: ulid::Ulid::new().to_string(),
            username,
            score,
            duration_ms: claims.duration_ms,
            created_at: now,
        };
        let score_id = record.id.clone();
        self.store.append_score(record).await?;

        let rank = self.compute_rank(claims.duration_ms, score, now).await?;
        Ok(SoloSubmitResponse {
            score_id: Some(score_id),
            rank: Some(rank),
        })
    }

    /// Top 100 of a ranked partition, direction per mode, ties sharing a
    /// rank and ordered by earliest submission.
    pub async fn leaderboard(&self, duration_ms: i64) -> Result<LeaderboardResponse, ApiError> {
        if !is_ranked_duration(duration_ms) {
            return Err(ApiError::Validation(
                "duration_ms is not a ranked round configuration".into(),
            ));
        }

        let inverted = lower_is_better(duration_ms);
        let records = self
            .store
            .top_scores(duration_ms, inverted, LEADERBOARD_LIMIT)
            .await?;

        let mut entries = Vec::with_capacity(records.len());
        let mut rank = 0u64;
        let mut previous_score = None;
        for (i, record) in records.into_iter().enumerate() {
            if previous_score != Some(record.score) {
                rank = i as u64 + 1;
                previous_score = Some(record.score);
            }
            entries.push(LeaderboardEntry {
                id: record.id,
                username: record.username,
                score: record.score,
                rank,
                created_at: record.created_at,
            });
        }

        Ok(LeaderboardResponse { entries })
    }
}
