//! Request/response bodies for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::state::rank::RankStats;
use crate::types::{ChallengeStatus, DuelStatus, MatchId, Outcome, PlayerKey, ScoreId};

// ---------- Requests ----------

#[derive(Debug, Deserialize)]
pub struct SoloSessionRequest {
    pub duration_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct SoloSubmitRequest {
    pub token: String,
    pub username: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct MatchCreateRequest {
    pub username: String,
    pub duration_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct DuelJoinRequest {
    pub match_id: MatchId,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct DuelReadyRequest {
    pub match_id: MatchId,
    pub player_key: PlayerKey,
    pub ready: bool,
}

#[derive(Debug, Deserialize)]
pub struct DuelStartRequest {
    pub match_id: MatchId,
}

#[derive(Debug, Deserialize)]
pub struct MatchSessionRequest {
    pub match_id: MatchId,
    pub player_key: PlayerKey,
}

#[derive(Debug, Deserialize)]
pub struct DuelSubmitRequest {
    pub token: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeSubmitRequest {
    pub token: String,
    pub username: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub duration_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct MatchViewQuery {
    pub player_key: Option<PlayerKey>,
}

// ---------- Responses ----------

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SoloSubmitResponse {
    /// None when the round configuration is not leaderboard-eligible.
    pub score_id: Option<ScoreId>,
    pub rank: Option<RankStats>,
}

#[derive(Debug, Serialize)]
pub struct MatchCreateResponse {
    pub match_id: MatchId,
    pub player_key: PlayerKey,
    pub share_url: String,
}

#[derive(Debug, Serialize)]
pub struct DuelJoinResponse {
    pub player_key: PlayerKey,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct DuelStartResponse {
    /// Shared countdown anchor, epoch ms.
    pub start_at: i64,
}

#[derive(Debug, Serialize)]
pub struct DuelSessionResponse {
    pub token: String,
    pub start_at: i64,
    pub duration_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct ChallengeSessionResponse {
    pub token: String,
    pub duration_ms: i64,
}

/// Head-to-head result from the requesting participant's perspective.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub my_username: String,
    pub my_score: i64,
    pub opponent_username: String,
    pub opponent_score: i64,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rank: Option<RankStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_rank: Option<RankStats>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// The peer has not submitted yet; poll the match view for the result.
    Waiting,
    Complete { result: MatchResult },
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub id: ScoreId,
    pub username: String,
    pub score: i64,
    /// Tied scores share a rank.
    pub rank: u64,
    pub created_at: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct DuelPlayerView {
    pub username: String,
    pub ready: bool,
    pub submitted: bool,
}

/// Poll view for the duel lobby, countdown and result screens.
#[derive(Debug, Serialize)]
pub struct DuelView {
    pub status: DuelStatus,
    pub duration_ms: i64,
    pub start_at: Option<i64>,
    pub players: Vec<DuelPlayerView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
}

/// Poll view for the challenge share/result screens.
#[derive(Debug, Serialize)]
pub struct ChallengeView {
    pub status: ChallengeStatus,
    pub duration_ms: i64,
    pub creator_username: String,
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
}
