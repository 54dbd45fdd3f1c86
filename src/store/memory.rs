//! In-process store used by the server binary and the test suite.
//!
//! Every compound operation holds a single write lock for its collection,
//! which is what makes the conditional transitions and uniqueness checks
//! atomic here the way a relational backend's conditional updates are.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{
    ChallengeEntry, ChallengeMatch, ChallengeStore, DuelMatch, DuelPlayer, DuelStore,
    LeaderboardStore, ScoreRecord, StoreError,
};
use crate::types::{beats, ChallengeStatus, DuelStatus};

#[derive(Clone, Default)]
pub struct MemoryStore {
    duels: Arc<RwLock<HashMap<String, DuelMatch>>>,
    duel_players: Arc<RwLock<HashMap<String, Vec<DuelPlayer>>>>,
    challenges: Arc<RwLock<HashMap<String, ChallengeMatch>>>,
    challenge_entries: Arc<RwLock<HashMap<String, Vec<ChallengeEntry>>>>,
    scores: Arc<RwLock<Vec<ScoreRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DuelStore for MemoryStore {
    async fn create_duel(&self, duel: DuelMatch, creator: DuelPlayer) -> Result<(), StoreError> {
        let mut duels = self.duels.write().await;
        if duels.contains_key(&duel.id) {
            return Err(StoreError::Backend(format!(
                "duel id collision: {}",
                duel.id
            )));
        }
        self.duel_players
            .write()
            .await
            .insert(duel.id.clone(), vec![creator]);
        duels.insert(duel.id.clone(), duel);
        Ok(())
    }

    async fn get_duel(&self, id: &str) -> Result<Option<DuelMatch>, StoreError> {
        Ok(self.duels.read().await.get(id).cloned())
    }

    async fn duel_players(&self, id: &str) -> Result<Vec<DuelPlayer>, StoreError> {
        Ok(self
            .duel_players
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_duel_player(&self, player: DuelPlayer) -> Result<(), StoreError> {
        let mut all = self.duel_players.write().await;
        let players = all
            .get_mut(&player.match_id)
            .ok_or_else(|| StoreError::MatchNotFound(player.match_id.clone()))?;

        if players.iter().any(|p| p.player_key == player.player_key) {
            return Err(StoreError::DuplicateParticipant);
        }
        if players.len() >= 2 {
            return Err(StoreError::MatchFull);
        }
        players.push(player);
        Ok(())
    }

    async fn set_duel_ready(
        &self,
        id: &str,
        player_key: &str,
        ready: bool,
    ) -> Result<(), StoreError> {
        let mut all = self.duel_players.write().await;
        let players = all
            .get_mut(id)
            .ok_or_else(|| StoreError::MatchNotFound(id.to_string()))?;
        let player = players
            .iter_mut()
            .find(|p| p.player_key == player_key)
            .ok_or(StoreError::ParticipantNotFound)?;
        player.ready = ready;
        Ok(())
    }

    async fn try_start_duel(
        &self,
        id: &str,
        start_at: i64,
        expires_at: i64,
    ) -> Result<bool, StoreError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(id)
            .ok_or_else(|| StoreError::MatchNotFound(id.to_string()))?;
        if duel.status != DuelStatus::Waiting {
            return Ok(false);
        }
        duel.status = DuelStatus::Active;
        duel.start_at = Some(start_at);
        duel.expires_at = expires_at;
        Ok(true)
    }

    async fn record_duel_score(
        &self,
        id: &str,
        player_key: &str,
        score: i64,
        submitted_at: i64,
    ) -> Result<(), StoreError> {
        let mut all = self.duel_players.write().await;
        let players = all
            .get_mut(id)
            .ok_or_else(|| StoreError::MatchNotFound(id.to_string()))?;
        let player = players
            .iter_mut()
            .find(|p| p.player_key == player_key)
            .ok_or(StoreError::ParticipantNotFound)?;
        if player.score.is_some() {
            return Err(StoreError::AlreadySubmitted);
        }
        player.score = Some(score);
        player.submitted_at = Some(submitted_at);
        Ok(())
    }

    async fn try_complete_duel(&self, id: &str) -> Result<bool, StoreError> {
        let mut duels = self.duels.write().await;
        let duel = duels
            .get_mut(id)
            .ok_or_else(|| StoreError::MatchNotFound(id.to_string()))?;
        if duel.status != DuelStatus::Active {
            return Ok(false);
        }
        duel.status = DuelStatus::Complete;
        Ok(true)
    }
}

#[async_trait]
impl ChallengeStore for MemoryStore {
    async fn create_challenge(&self, challenge: ChallengeMatch) -> Result<(), StoreError> {
        let mut challenges = self.challenges.write().await;
        if challenges.contains_key(&challenge.id) {
            return Err(StoreError::Backend(format!(
                "challenge id collision: {}",
                challenge.id
            )));
        }
        self.challenge_entries
            .write()
            .await
            .insert(challenge.id.clone(), Vec::new());
        challenges.insert(challenge.id.clone(), challenge);
        Ok(())
    }

    async fn get_challenge(&self, id: &str) -> Result<Option<ChallengeMatch>, StoreError> {
        Ok(self.challenges.read().await.get(id).cloned())
    }

    async fn challenge_entries(&self, id: &str) -> Result<Vec<ChallengeEntry>, StoreError> {
        Ok(self
            .challenge_entries
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_challenge_entry(&self, entry: ChallengeEntry) -> Result<(), StoreError> {
        let mut all = self.challenge_entries.write().await;
        let entries = all
            .get_mut(&entry.match_id)
            .ok_or_else(|| StoreError::MatchNotFound(entry.match_id.clone()))?;

        if entries.iter().any(|e| e.player_key == entry.player_key) {
            return Err(StoreError::AlreadySubmitted);
        }
        if entries.len() >= 2 {
            return Err(StoreError::MatchFull);
        }
        entries.push(entry);
        Ok(())
    }

    async fn try_complete_challenge(&self, id: &str) -> Result<bool, StoreError> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges
            .get_mut(id)
            .ok_or_else(|| StoreError::MatchNotFound(id.to_string()))?;
        if challenge.status != ChallengeStatus::Pending {
            return Ok(false);
        }
        challenge.status = ChallengeStatus::Complete;
        Ok(true)
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn append_score(&self, record: ScoreRecord) -> Result<(), StoreError> {
        self.scores.write().await.push(record);
        Ok(())
    }

    async fn count_better(
        &self,
        duration_ms: i64,
        score: i64,
        inverted: bool,
        since: Option<i64>,
    ) -> Result<u64, StoreError> {
        let scores = self.scores.read().await;
        let count = scores
            .iter()
            .filter(|r| r.duration_ms == duration_ms)
            .filter(|r| since.is_none_or(|t| r.created_at >= t))
            .filter(|r| beats(r.score, score, inverted))
            .count();
        Ok(count as u64)
    }

    async fn count_scores(&self, duration_ms: i64, since: Option<i64>) -> Result<u64, StoreError> {
        let scores = self.scores.read().await;
        let count = scores
            .iter()
            .filter(|r| r.duration_ms == duration_ms)
            .filter(|r| since.is_none_or(|t| r.created_at >= t))
            .count();
        Ok(count as u64)
    }

    async fn top_scores(
        &self,
        duration_ms: i64,
        inverted: bool,
        limit: usize,
    ) -> Result<Vec<ScoreRecord>, StoreError> {
        let scores = self.scores.read().await;
        let mut partition: Vec<ScoreRecord> = scores
            .iter()
            .filter(|r| r.duration_ms == duration_ms)
            .cloned()
            .collect();
        partition.sort_by(|a, b| {
            let by_score = if inverted {
                a.score.cmp(&b.score)
            } else {
                b.score.cmp(&a.score)
            };
            by_score.then(a.created_at.cmp(&b.created_at))
        });
        partition.truncate(limit);
        Ok(partition)
    }
}
