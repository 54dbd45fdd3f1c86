use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type MatchId = String;
pub type PlayerKey = String;
pub type ScoreId = String;

/// Game mode a session token is scoped to. A token is only accepted by the
/// submission endpoint matching its mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Solo,
    Duel,
    Challenge,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DuelStatus {
    Waiting,
    Active,
    Complete,
    Expired,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Complete,
    Expired,
}

/// Head-to-head outcome from the perspective of one participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Tie,
}

/// Sentinel `duration_ms` for the race-to-67 mode: the round has no fixed
/// length, it ends when the rep target is reached and the score is elapsed
/// milliseconds.
pub const SPEEDRUN_DURATION: i64 = -1;
pub const SPEEDRUN_TARGET_REPS: u32 = 67;

/// The two fixed timed round lengths.
pub const SPRINT_DURATION_MS: i64 = 6_700;
pub const MARATHON_DURATION_MS: i64 = 67_000;

/// Round configurations eligible for the public leaderboard. Custom
/// durations play fine but are never written to the ranked table.
pub const RANKED_DURATIONS: &[i64] =
    &[SPRINT_DURATION_MS, MARATHON_DURATION_MS, SPEEDRUN_DURATION];

/// Accepted custom duration range for unranked rounds.
pub const CUSTOM_DURATION_MIN_MS: i64 = 5_000;
pub const CUSTOM_DURATION_MAX_MS: i64 = 300_000;

/// A submission is rejected if it arrives earlier than this after issuance.
pub const MIN_SUBMIT_DELAY_MS: i64 = 1_000;
/// Extra time after the nominal round end during which a late submission is
/// still accepted (network latency headroom, not replay headroom).
pub const GRACE_WINDOW_MS: i64 = 30_000;
/// Effective window for speedrun tokens, whose real duration is unknown at
/// issue time.
pub const SPEEDRUN_CEILING_MS: i64 = 600_000;
/// Slack added on top of the grace window before the token itself expires.
pub const TOKEN_EXPIRY_SLACK_MS: i64 = 5_000;

/// Duel lobbies are short-lived.
pub const DUEL_EXPIRY_MS: i64 = 10 * 60 * 1_000;
/// Shared countdown offset: both clients start `start_at - now` from their
/// own clock.
pub const DUEL_SYNC_DELAY_MS: i64 = 3_000;
/// Challenges wait for an opponent for days.
pub const CHALLENGE_EXPIRY_MS: i64 = 7 * 24 * 60 * 60 * 1_000;

pub fn is_speedrun(duration_ms: i64) -> bool {
    duration_ms == SPEEDRUN_DURATION
}

pub fn is_ranked_duration(duration_ms: i64) -> bool {
    RANKED_DURATIONS.contains(&duration_ms)
}

/// Whether a lower score wins in this partition (speedrun: elapsed ms).
pub fn lower_is_better(duration_ms: i64) -> bool {
    is_speedrun(duration_ms)
}

/// Strict "a beats b" under the partition's comparison direction.
pub fn beats(a: i64, b: i64, inverted: bool) -> bool {
    if inverted {
        a < b
    } else {
        a > b
    }
}

/// Outcome of `mine` vs `theirs` under the partition's direction.
pub fn outcome_of(mine: i64, theirs: i64, inverted: bool) -> Outcome {
    if mine == theirs {
        Outcome::Tie
    } else if beats(mine, theirs, inverted) {
        Outcome::Win
    } else {
        Outcome::Lose
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
