//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod identity;

/// Build the application router with:
/// - REST API under `/api/v1/...` (caller identity from `X-User-Id` / `X-User-Name`)
/// - CORS (allow any origin/method/headers); tighten at the gateway for production
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route(
            "/api/v1/challenges/:id/participation",
            post(http::http_enroll)
                .get(http::http_get_participation)
                .delete(http::http_cancel),
        )
        .route(
            "/api/v1/challenges/:id/verifications",
            post(http::http_record_verification).get(http::http_list_verifications),
        )
        .route("/api/v1/challenges/:id/stamps", get(http::http_list_stamps))
        .route("/api/v1/challenges/:id/reward", post(http::http_claim_reward))
        .route("/api/v1/challenges/:id/quizzes/:quiz_id", get(http::http_get_quiz))
        .route("/api/v1/challenges/:id/quizzes/:quiz_id/attempts", post(http::http_attempt_quiz))
        .route("/api/v1/challenges/:id/roulette", get(http::http_get_roulette))
        .route("/api/v1/challenges/:id/roulette/spin", post(http::http_spin))
        .route("/api/v1/challenges/:id/leaderboard", get(http::http_leaderboard))
        .route("/api/v1/points", get(http::http_points))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::roulette::FixedDraw;
    use crate::store;
    use crate::testkit::{self, at};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let conn = testkit::store_with(&[
            testkit::manual_challenge(1, 2),
            testkit::roulette_challenge(2),
            testkit::quiz_challenge(3),
        ]);
        store::roulette::upsert_settings(&conn, &testkit::wheel(2)).expect("wheel");
        store::quizzes::upsert(&conn, &testkit::ox_quiz(10, 3)).expect("quiz");
        let clock = Arc::new(FixedClock::new(at("2026-10-05", 9, 0)));
        build_router(Arc::new(AppState::from_parts(conn, clock, Arc::new(FixedDraw(85.0)), None)))
    }

    fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(u) = user {
            builder = builder.header("x-user-id", u).header("x-user-name", "Tester");
        }
        match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.expect("body");
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json") };
        (status, value)
    }

    #[tokio::test]
    async fn health_needs_no_identity() {
        let (status, body) = send(&app(), request(Method::GET, "/api/v1/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn missing_identity_is_rejected() {
        let (status, body) =
            send(&app(), request(Method::POST, "/api/v1/challenges/1/participation", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }

    #[tokio::test]
    async fn enroll_verify_and_read_back() {
        let app = app();
        let (status, p) = send(&app, request(Method::POST, "/api/v1/challenges/1/participation", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(p["status"], "participating");
        assert_eq!(p["totalRequiredCount"], 14);

        let (status, _) = send(&app, request(Method::POST, "/api/v1/challenges/1/participation", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let proof = json!({ "slot": 1, "payload": { "kind": "supplement", "memo": "omega 3" } });
        let (status, out) =
            send(&app, request(Method::POST, "/api/v1/challenges/1/verifications", Some("u1"), Some(proof.clone()))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(out["totalVerificationCount"], 1);
        assert_eq!(out["stampAwarded"], false);

        let (status, err) =
            send(&app, request(Method::POST, "/api/v1/challenges/1/verifications", Some("u1"), Some(proof))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "slot_already_verified");

        let (_, list) = send(&app, request(Method::GET, "/api/v1/challenges/1/verifications?date=2026-10-05", Some("u1"), None)).await;
        assert_eq!(list.as_array().map(Vec::len), Some(1));
        assert_eq!(list[0]["verificationData"]["kind"], "supplement");

        let (_, stamps) = send(&app, request(Method::GET, "/api/v1/challenges/1/stamps", Some("u1"), None)).await;
        assert_eq!(stamps.as_array().map(Vec::len), Some(7));

        let (status, _) = send(&app, request(Method::DELETE, "/api/v1/challenges/1/participation", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        let (_, p) = send(&app, request(Method::GET, "/api/v1/challenges/1/participation", Some("u1"), None)).await;
        assert_eq!(p["status"], "cancelled");
    }

    #[tokio::test]
    async fn wrong_payload_and_unknown_rows() {
        let app = app();
        send(&app, request(Method::POST, "/api/v1/challenges/1/participation", Some("u1"), None)).await;
        let proof = json!({ "slot": 1, "payload": { "kind": "steps", "steps": 9000 } });
        let (status, _) = send(&app, request(Method::POST, "/api/v1/challenges/1/verifications", Some("u1"), Some(proof))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, request(Method::GET, "/api/v1/challenges/99/leaderboard", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn roulette_spin_then_duplicate_shows_previous() {
        let app = app();
        send(&app, request(Method::POST, "/api/v1/challenges/2/participation", Some("u1"), None)).await;
        let (status, spin) = send(&app, request(Method::POST, "/api/v1/challenges/2/roulette/spin", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(spin["wonIndex"], 2);
        assert_eq!(spin["wonSegment"]["label"], "Next time");
        assert!(spin.get("pointsCredited").is_none());

        let (status, err) = send(&app, request(Method::POST, "/api/v1/challenges/2/roulette/spin", Some("u1"), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["error"], "already_spun_today");
        assert_eq!(err["previous"]["wonIndex"], 2);

        let (_, wheel) = send(&app, request(Method::GET, "/api/v1/challenges/2/roulette", Some("u1"), None)).await;
        assert_eq!(wheel["todaySpin"]["wonIndex"], 2);
    }

    #[tokio::test]
    async fn quiz_attempt_and_leaderboard() {
        let app = app();
        send(&app, request(Method::POST, "/api/v1/challenges/3/participation", Some("u1"), None)).await;

        let (_, quiz) = send(&app, request(Method::GET, "/api/v1/challenges/3/quizzes/10", Some("u1"), None)).await;
        assert!(quiz.get("correctAnswers").is_none());
        assert_eq!(quiz["canAttempt"], true);

        let (status, wrong) = send(
            &app,
            request(Method::POST, "/api/v1/challenges/3/quizzes/10/attempts", Some("u1"), Some(json!({ "selected": true }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(wrong["isCorrect"], false);
        assert_eq!(wrong["canRetry"], true);
        assert!(wrong["hint"].is_string());

        let (_, right) = send(
            &app,
            request(Method::POST, "/api/v1/challenges/3/quizzes/10/attempts", Some("u1"), Some(json!({ "selected": "false" }))),
        )
        .await;
        assert_eq!(right["isCorrect"], true);
        assert_eq!(right["verification"]["totalVerificationCount"], 1);

        let (_, board) = send(&app, request(Method::GET, "/api/v1/challenges/3/leaderboard", Some("u1"), None)).await;
        assert_eq!(board["totalParticipants"], 1);
        assert_eq!(board["rankings"][0]["displayName"], "T****");
        assert_eq!(board["myRanking"]["isMe"], true);

        let (_, points) = send(&app, request(Method::GET, "/api/v1/points", Some("u1"), None)).await;
        assert_eq!(points["balance"], 0);
    }
}
