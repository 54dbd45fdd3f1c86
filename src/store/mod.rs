//! Persistence seam for matches and the leaderboard.
//!
//! All durable state lives behind these traits; concurrent requests for the
//! same match race only through the store's atomicity primitives
//! (conditional transitions, first-write-wins score writes, unique entry
//! inserts). The bundled [`memory::MemoryStore`] provides those guarantees
//! with a single write lock per collection; a relational backend provides
//! them with conditional `UPDATE ... WHERE status = ?` statements and a
//! unique index on `(match_id, player_key)`.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChallengeStatus, DuelStatus, MatchId, PlayerKey, ScoreId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("match not found: {0}")]
    MatchNotFound(MatchId),

    #[error("participant not found")]
    ParticipantNotFound,

    #[error("match already has two participants")]
    MatchFull,

    #[error("already joined this match")]
    DuplicateParticipant,

    /// Score is immutable once set; a second write is a replay.
    #[error("already submitted")]
    AlreadySubmitted,

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct DuelMatch {
    pub id: MatchId,
    pub duration_ms: i64,
    pub status: DuelStatus,
    /// Set exactly once, atomically with the waiting -> active transition.
    pub start_at: Option<i64>,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct DuelPlayer {
    pub match_id: MatchId,
    pub player_key: PlayerKey,
    pub username: String,
    pub ready: bool,
    pub score: Option<i64>,
    pub submitted_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ChallengeMatch {
    pub id: MatchId,
    pub duration_ms: i64,
    pub status: ChallengeStatus,
    /// Shown on the share page; entries carry their own usernames.
    pub creator_username: String,
    pub created_at: i64,
    pub expires_at: i64,
}

#[derive(Debug, Clone)]
pub struct ChallengeEntry {
    pub match_id: MatchId,
    pub player_key: PlayerKey,
    pub username: String,
    pub score: i64,
    pub created_at: i64,
}

/// Persisted leaderboard row.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub id: ScoreId,
    pub username: String,
    pub score: i64,
    /// Leaderboard partition key.
    pub duration_ms: i64,
    pub created_at: i64,
}

#[async_trait]
pub trait DuelStore: Send + Sync {
    /// Insert a duel with its creator. Fails on id collision.
    async fn create_duel(&self, duel: DuelMatch, creator: DuelPlayer) -> Result<(), StoreError>;

    async fn get_duel(&self, id: &str) -> Result<Option<DuelMatch>, StoreError>;

    async fn duel_players(&self, id: &str) -> Result<Vec<DuelPlayer>, StoreError>;

    /// Add the second participant. Rejects a third participant
    /// (`MatchFull`) and a repeated key (`DuplicateParticipant`) atomically.
    async fn add_duel_player(&self, player: DuelPlayer) -> Result<(), StoreError>;

    async fn set_duel_ready(
        &self,
        id: &str,
        player_key: &str,
        ready: bool,
    ) -> Result<(), StoreError>;

    /// Conditional waiting -> active transition, booking `start_at` and
    /// refreshing `expires_at` in the same step. Returns whether this call
    /// performed the transition; a concurrent second attempt gets `false`.
    async fn try_start_duel(
        &self,
        id: &str,
        start_at: i64,
        expires_at: i64,
    ) -> Result<bool, StoreError>;

    /// First-write-wins score write for one participant; a second write for
    /// the same participant fails with `AlreadySubmitted`.
    async fn record_duel_score(
        &self,
        id: &str,
        player_key: &str,
        score: i64,
        submitted_at: i64,
    ) -> Result<(), StoreError>;

    /// Conditional active -> complete transition guarding the completion
    /// side effects: exactly one caller observes `true`.
    async fn try_complete_duel(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn create_challenge(&self, challenge: ChallengeMatch) -> Result<(), StoreError>;

    async fn get_challenge(&self, id: &str) -> Result<Option<ChallengeMatch>, StoreError>;

    async fn challenge_entries(&self, id: &str) -> Result<Vec<ChallengeEntry>, StoreError>;

    /// Insert an entry under the `(match_id, player_key)` uniqueness
    /// constraint — the authoritative double-submission defense. Also
    /// rejects a third entry (`MatchFull`).
    async fn insert_challenge_entry(&self, entry: ChallengeEntry) -> Result<(), StoreError>;

    /// Conditional pending -> complete transition; exactly one caller
    /// observes `true`.
    async fn try_complete_challenge(&self, id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    async fn append_score(&self, record: ScoreRecord) -> Result<(), StoreError>;

    /// Count of records in the partition strictly better than `score`;
    /// "better" is `<` when `inverted`, `>` otherwise. `since` restricts to
    /// records created at or after the given timestamp.
    async fn count_better(
        &self,
        duration_ms: i64,
        score: i64,
        inverted: bool,
        since: Option<i64>,
    ) -> Result<u64, StoreError>;

    async fn count_scores(&self, duration_ms: i64, since: Option<i64>) -> Result<u64, StoreError>;

    /// Best `limit` records in the partition, ordered by score in the
    /// partition's direction, ties broken by earliest `created_at`.
    async fn top_scores(
        &self,
        duration_ms: i64,
        inverted: bool,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, StoreError>;
}

/// The full persistence surface the orchestrator is wired against.
pub trait Store: DuelStore + ChallengeStore + LeaderboardStore {}

impl<T: DuelStore + ChallengeStore + LeaderboardStore> Store for T {}
