//! Rank and percentile computation against the leaderboard.
//!
//! Recompute-on-demand: ranks are derived by counting strictly better
//! records in the partition, never materialized. Tied scores share a rank
//! by construction.

use serde::Serialize;

use super::AppState;
use crate::error::ApiError;
use crate::types::lower_is_better;

const DAY_MS: i64 = 24 * 60 * 60 * 1_000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RankStats {
    pub daily_rank: u64,
    pub all_time_rank: u64,
    pub percentile: u32,
    pub total_count: u64,
}

impl AppState {
    /// Rank `score` within its duration partition. `daily_rank` looks at
    /// the trailing 24 hours only. The comparison direction follows the
    /// partition: elapsed-time partitions rank lower scores above higher
    /// ones.
    pub async fn compute_rank(
        &self,
        duration_ms: i64,
        score: i64,
        now: i64,
    ) -> Result<RankStats, ApiError> {
        let inverted = lower_is_better(duration_ms);

        let all_time_rank = self
            .store
            .count_better(duration_ms, score, inverted, None)
            .await?
            + 1;
        let daily_rank = self
            .store
            .count_better(duration_ms, score, inverted, Some(now - DAY_MS))
            .await?
            + 1;
        let total_count = self.store.count_scores(duration_ms, None).await?;

        let percentile = if total_count == 0 {
            1
        } else {
            (all_time_rank as f64 / total_count as f64 * 100.0).round() as u32
        };

        Ok(RankStats {
            daily_rank,
            all_time_rank,
            percentile,
            total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;
    use crate::store::ScoreRecord;
    use crate::types::{SPEEDRUN_DURATION, SPRINT_DURATION_MS};

    async fn seed(state: &crate::state::AppState, duration_ms: i64, scores: &[(i64, i64)]) {
        for (i, (score, created_at)) in scores.iter().enumerate() {
            state
                .store
                .append_score(ScoreRecord {
                    id: format!("s{}", i),
                    username: format!("u{}", i),
                    score: *score,
                    duration_ms,
                    created_at: *created_at,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_partition_defaults() {
        let state = test_state();
        let stats = state.compute_rank(SPRINT_DURATION_MS, 10, 0).await.unwrap();
        assert_eq!(stats.all_time_rank, 1);
        assert_eq!(stats.daily_rank, 1);
        assert_eq!(stats.percentile, 1);
        assert_eq!(stats.total_count, 0);
    }

    #[tokio::test]
    async fn test_best_score_ranks_first() {
        let state = test_state();
        seed(&state, SPRINT_DURATION_MS, &[(10, 0), (20, 0), (30, 0)]).await;
        // Strictly better than everything, including itself once inserted
        seed(&state, SPRINT_DURATION_MS, &[(40, 0)]).await;

        let stats = state.compute_rank(SPRINT_DURATION_MS, 40, 0).await.unwrap();
        assert_eq!(stats.all_time_rank, 1);
        assert_eq!(stats.total_count, 4);
    }

    #[tokio::test]
    async fn test_worst_score_ranks_last() {
        let state = test_state();
        seed(&state, SPRINT_DURATION_MS, &[(10, 0), (20, 0), (30, 0), (5, 0)]).await;

        let stats = state.compute_rank(SPRINT_DURATION_MS, 5, 0).await.unwrap();
        assert_eq!(stats.all_time_rank, stats.total_count);
    }

    #[tokio::test]
    async fn test_tied_scores_share_rank() {
        let state = test_state();
        seed(&state, SPRINT_DURATION_MS, &[(30, 0), (20, 0), (20, 0), (10, 0)]).await;

        let stats = state.compute_rank(SPRINT_DURATION_MS, 20, 0).await.unwrap();
        // One strictly better record; both 20s rank 2nd
        assert_eq!(stats.all_time_rank, 2);
    }

    #[tokio::test]
    async fn test_inverted_partition() {
        let state = test_state();
        seed(&state, SPEEDRUN_DURATION, &[(5_000, 0), (8_000, 0)]).await;

        // Lower elapsed time ranks above higher
        let fast = state.compute_rank(SPEEDRUN_DURATION, 5_000, 0).await.unwrap();
        let slow = state.compute_rank(SPEEDRUN_DURATION, 8_000, 0).await.unwrap();
        assert_eq!(fast.all_time_rank, 1);
        assert_eq!(slow.all_time_rank, 2);
    }

    #[tokio::test]
    async fn test_daily_rank_ignores_old_records() {
        let state = test_state();
        let now = 10 * DAY_MS;
        // An old better score and a recent worse one
        seed(
            &state,
            SPRINT_DURATION_MS,
            &[(100, 0), (20, now - 1_000)],
        )
        .await;

        let stats = state.compute_rank(SPRINT_DURATION_MS, 50, now).await.unwrap();
        assert_eq!(stats.all_time_rank, 2); // behind the old 100
        assert_eq!(stats.daily_rank, 1); // the 100 is outside the window
    }

    #[tokio::test]
    async fn test_percentile() {
        let state = test_state();
        seed(
            &state,
            SPRINT_DURATION_MS,
            &[(40, 0), (30, 0), (20, 0), (10, 0)],
        )
        .await;

        // Rank 2 of 4 -> 50%
        let stats = state.compute_rank(SPRINT_DURATION_MS, 30, 0).await.unwrap();
        assert_eq!(stats.percentile, 50);
    }
}
