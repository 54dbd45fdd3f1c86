use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tower::util::ServiceExt;

use ranked67::api;
use ranked67::config::AppConfig;
use ranked67::net::TrustedProxies;
use ranked67::protocol::SubmitOutcome;
use ranked67::state::AppState;
use ranked67::types::{now_ms, DuelStatus, Outcome, SPRINT_DURATION_MS};

fn test_state() -> AppState {
    AppState::new(AppConfig {
        signing_secret: b"integration-secret".to_vec(),
        base_url: "http://localhost:6767".to_string(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 6767)),
        submit_max_requests: 100,
        submit_window: Duration::from_secs(10),
        trusted_proxies: TrustedProxies::default(),
    })
}

fn client() -> IpAddr {
    "203.0.113.9".parse().unwrap()
}

/// End-to-end duel: create -> join -> ready -> start -> sessions -> submits.
#[tokio::test]
async fn test_full_duel_flow() {
    let state = test_state();
    let t0 = now_ms();

    // 1. Alice creates a sprint duel
    let created = state
        .create_duel("Alice", SPRINT_DURATION_MS, t0)
        .await
        .expect("create duel");
    assert!(created.share_url.contains(&created.match_id));

    // 2. Bob joins via the shared code
    let joined = state
        .join_duel(&created.match_id, "Bob", t0 + 1_000)
        .await
        .expect("join duel");

    // 3. Both flag ready
    state
        .set_duel_ready(&created.match_id, &created.player_key, true, t0 + 2_000)
        .await
        .expect("alice ready");
    state
        .set_duel_ready(&created.match_id, &joined.player_key, true, t0 + 2_500)
        .await
        .expect("bob ready");

    // 4. Start books the shared countdown anchor exactly once
    let started = state
        .start_duel(&created.match_id, t0 + 3_000)
        .await
        .expect("start duel");
    let view = state
        .duel_view(&created.match_id, None, t0 + 3_000)
        .await
        .expect("view");
    assert_eq!(view.status, DuelStatus::Active);
    assert_eq!(view.start_at, Some(started.start_at));

    let again = state
        .start_duel(&created.match_id, t0 + 3_500)
        .await
        .expect("repeated start is a no-op");
    assert_eq!(again.start_at, started.start_at);

    // 5. Both participants obtain session tokens
    let session_a = state
        .duel_session(&created.match_id, &created.player_key, t0 + 4_000)
        .await
        .expect("alice session");
    let session_b = state
        .duel_session(&created.match_id, &joined.player_key, t0 + 4_000)
        .await
        .expect("bob session");
    assert_eq!(session_a.start_at, started.start_at);
    assert_eq!(session_a.duration_ms, SPRINT_DURATION_MS);

    // 6. Scores come in: Alice 42 reps, Bob 37
    let submit_at = t0 + 4_000 + SPRINT_DURATION_MS + 500;
    let first = state
        .submit_duel(&session_a.token, 42, client(), submit_at)
        .await
        .expect("alice submit");
    assert!(matches!(first, SubmitOutcome::Waiting));

    let second = state
        .submit_duel(&session_b.token, 37, client(), submit_at + 200)
        .await
        .expect("bob submit");
    match second {
        SubmitOutcome::Complete { result } => {
            assert_eq!(result.my_username, "Bob");
            assert_eq!(result.my_score, 37);
            assert_eq!(result.opponent_username, "Alice");
            assert_eq!(result.opponent_score, 42);
            assert_eq!(result.outcome, Outcome::Lose);
        }
        SubmitOutcome::Waiting => panic!("second submission should complete the duel"),
    }

    // 7. The duel is complete and both scores sit on the leaderboard
    let view = state
        .duel_view(&created.match_id, Some(&created.player_key), submit_at + 500)
        .await
        .expect("final view");
    assert_eq!(view.status, DuelStatus::Complete);
    assert_eq!(view.result.expect("alice's result").outcome, Outcome::Win);

    let board = state
        .leaderboard(SPRINT_DURATION_MS)
        .await
        .expect("leaderboard");
    assert_eq!(board.entries.len(), 2);
    assert_eq!(board.entries[0].username, "Alice");
    assert_eq!(board.entries[0].rank, 1);
}

/// Asynchronous challenge round-trip with double-submission defense.
#[tokio::test]
async fn test_challenge_flow_and_replay_defense() {
    let state = test_state();
    let t0 = now_ms();

    let created = state
        .create_challenge("Alice", SPRINT_DURATION_MS, t0)
        .await
        .expect("create challenge");

    // Creator plays immediately
    let session_a = state
        .challenge_session(&created.match_id, &created.player_key, t0)
        .await
        .expect("creator session");
    let first = state
        .submit_challenge(&session_a.token, "Alice", 40, client(), t0 + 2_000)
        .await
        .expect("creator submit");
    assert!(matches!(first, SubmitOutcome::Waiting));

    // The same key cannot get another session
    assert!(state
        .challenge_session(&created.match_id, &created.player_key, t0 + 3_000)
        .await
        .is_err());

    // A second submission over the still-valid token is rejected and the
    // stored score survives untouched
    let replay = state
        .submit_challenge(&session_a.token, "Alice", 99, client(), t0 + 4_000)
        .await;
    assert!(replay.is_err());

    // An opponent finishes the challenge later
    let session_b = state
        .challenge_session(&created.match_id, "bob-key", t0 + 60_000)
        .await
        .expect("opponent session");
    let second = state
        .submit_challenge(&session_b.token, "Bob", 55, client(), t0 + 62_000)
        .await
        .expect("opponent submit");
    match second {
        SubmitOutcome::Complete { result } => {
            assert_eq!(result.outcome, Outcome::Win);
            assert_eq!(result.opponent_score, 40);
        }
        SubmitOutcome::Waiting => panic!("second entry should complete the challenge"),
    }

    // Challenge scores stay off the public leaderboard
    let board = state
        .leaderboard(SPRINT_DURATION_MS)
        .await
        .expect("leaderboard");
    assert!(board.entries.is_empty());
}

mod http {
    use super::*;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;

    fn test_app() -> Router {
        api::router(test_state()).layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 9], 4711))))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_solo_round_over_http() {
        let app = test_app();

        // Obtain a token
        let response = app
            .clone()
            .oneshot(post(
                "/api/session",
                serde_json::json!({"duration_ms": SPRINT_DURATION_MS}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let token = body_json(response).await["token"]
            .as_str()
            .expect("token string")
            .to_string();

        // Submitting immediately is too early, with the reason spelled out
        let response = app
            .clone()
            .oneshot(post(
                "/api/submit",
                serde_json::json!({"token": token, "username": "Alice", "score": 42}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "too early");
    }

    #[tokio::test]
    async fn test_error_shapes() {
        let app = test_app();

        // Tampered token -> 401
        let response = app
            .clone()
            .oneshot(post(
                "/api/submit",
                serde_json::json!({"token": "bogus.token", "username": "A", "score": 1}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_json(response).await["error"].is_string());

        // Unknown duel -> 404
        let response = app
            .clone()
            .oneshot(post(
                "/api/duel/join",
                serde_json::json!({"match_id": "NOPE99", "username": "A"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Custom duration is not a leaderboard partition -> 400
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/leaderboard?duration_ms=10000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duel_create_over_http() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(post(
                "/api/duel/create",
                serde_json::json!({"username": "Alice", "duration_ms": SPRINT_DURATION_MS}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let match_id = body["match_id"].as_str().expect("match id");
        assert!(body["share_url"]
            .as_str()
            .expect("share url")
            .ends_with(match_id));

        // The poll view shows the waiting lobby
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/duel/{}", match_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["status"], "waiting");
        assert_eq!(view["players"].as_array().expect("players").len(), 1);
    }
}
