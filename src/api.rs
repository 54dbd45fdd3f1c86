//! HTTP API: route table and handlers.
//!
//! Handlers stay thin: resolve the caller's network identity, stamp the
//! request with the server clock, and delegate to the orchestration layer.

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use std::net::{IpAddr, SocketAddr};

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;
use crate::types::now_ms;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", post(solo_session))
        .route("/api/submit", post(solo_submit))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/duel/create", post(duel_create))
        .route("/api/duel/join", post(duel_join))
        .route("/api/duel/ready", post(duel_ready))
        .route("/api/duel/start", post(duel_start))
        .route("/api/duel/session", post(duel_session))
        .route("/api/duel/submit", post(duel_submit))
        .route("/api/duel/{match_id}", get(duel_view))
        .route("/api/challenge/create", post(challenge_create))
        .route("/api/challenge/session", post(challenge_session))
        .route("/api/challenge/submit", post(challenge_submit))
        .route("/api/challenge/{match_id}", get(challenge_view))
        .with_state(state)
}

/// Resolve the client address for rate-limit keying.
fn client_ip(state: &AppState, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    state.config.trusted_proxies.client_ip(peer, headers)
}

async fn solo_session(
    State(state): State<AppState>,
    Json(req): Json<SoloSessionRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.solo_session(req.duration_ms, now_ms())?))
}

async fn solo_submit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SoloSubmitRequest>,
) -> Result<Json<SoloSubmitResponse>, ApiError> {
    let client = client_ip(&state, peer, &headers);
    let response = state
        .submit_solo(&req.token, &req.username, req.score, client, now_ms())
        .await?;
    Ok(Json(response))
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    Ok(Json(state.leaderboard(query.duration_ms).await?))
}

async fn duel_create(
    State(state): State<AppState>,
    Json(req): Json<MatchCreateRequest>,
) -> Result<Json<MatchCreateResponse>, ApiError> {
    Ok(Json(
        state
            .create_duel(&req.username, req.duration_ms, now_ms())
            .await?,
    ))
}

async fn duel_join(
    State(state): State<AppState>,
    Json(req): Json<DuelJoinRequest>,
) -> Result<Json<DuelJoinResponse>, ApiError> {
    Ok(Json(
        state
            .join_duel(&req.match_id, &req.username, now_ms())
            .await?,
    ))
}

async fn duel_ready(
    State(state): State<AppState>,
    Json(req): Json<DuelReadyRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .set_duel_ready(&req.match_id, &req.player_key, req.ready, now_ms())
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn duel_start(
    State(state): State<AppState>,
    Json(req): Json<DuelStartRequest>,
) -> Result<Json<DuelStartResponse>, ApiError> {
    Ok(Json(state.start_duel(&req.match_id, now_ms()).await?))
}

async fn duel_session(
    State(state): State<AppState>,
    Json(req): Json<MatchSessionRequest>,
) -> Result<Json<DuelSessionResponse>, ApiError> {
    Ok(Json(
        state
            .duel_session(&req.match_id, &req.player_key, now_ms())
            .await?,
    ))
}

async fn duel_submit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<DuelSubmitRequest>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let client = client_ip(&state, peer, &headers);
    let outcome = state
        .submit_duel(&req.token, req.score, client, now_ms())
        .await?;
    Ok(Json(outcome))
}

async fn duel_view(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(query): Query<MatchViewQuery>,
) -> Result<Json<DuelView>, ApiError> {
    Ok(Json(
        state
            .duel_view(&match_id, query.player_key.as_deref(), now_ms())
            .await?,
    ))
}

async fn challenge_create(
    State(state): State<AppState>,
    Json(req): Json<MatchCreateRequest>,
) -> Result<Json<MatchCreateResponse>, ApiError> {
    Ok(Json(
        state
            .create_challenge(&req.username, req.duration_ms, now_ms())
            .await?,
    ))
}

async fn challenge_session(
    State(state): State<AppState>,
    Json(req): Json<MatchSessionRequest>,
) -> Result<Json<ChallengeSessionResponse>, ApiError> {
    Ok(Json(
        state
            .challenge_session(&req.match_id, &req.player_key, now_ms())
            .await?,
    ))
}

async fn challenge_submit(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ChallengeSubmitRequest>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let client = client_ip(&state, peer, &headers);
    let outcome = state
        .submit_challenge(&req.token, &req.username, req.score, client, now_ms())
        .await?;
    Ok(Json(outcome))
}

async fn challenge_view(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Query(query): Query<MatchViewQuery>,
) -> Result<Json<ChallengeView>, ApiError> {
    Ok(Json(
        state
            .challenge_view(&match_id, query.player_key.as_deref(), now_ms())
            .await?,
    ))
}
