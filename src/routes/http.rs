//! HTTP endpoint handlers. These are thin wrappers that forward to the engine through
//! `AppState`. Each handler is instrumented and logs its outcome.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};

use crate::error::Result;
use crate::protocol::*;
use crate::routes::identity::CurrentUser;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_enroll(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let participation = state.enroll(challenge_id, &user).await?;
    info!(target: "challenge", challenge_id, participation = participation.id, "HTTP enroll");
    Ok((StatusCode::CREATED, Json(participation)))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_get_participation(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.participation(challenge_id, &user.id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_cancel(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.cancel(challenge_id, &user.id).await?;
    Ok(Json(OkOut { ok: true }))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id, slot = body.slot))]
pub async fn http_record_verification(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
    Json(body): Json<VerificationIn>,
) -> Result<impl IntoResponse> {
    let outcome = state.record_verification(challenge_id, &user.id, body.slot, body.payload).await?;
    info!(
        target: "challenge",
        challenge_id,
        rate = %format!("{:.1}", outcome.participation.achievement_rate),
        stamp = ?outcome.stamp_awarded,
        "HTTP verification recorded"
    );
    Ok((StatusCode::CREATED, Json(RecordOut::from(outcome))))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_list_verifications(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
    Query(q): Query<VerificationQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.verifications(challenge_id, &user.id, q.date).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_list_stamps(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.stamps(challenge_id, &user.id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_claim_reward(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (outcome, settled) = state.claim_reward(challenge_id, &user.id).await?;
    info!(target: "challenge", challenge_id, settled, "HTTP reward claimed");
    Ok(Json(ClaimOut::new(outcome.participation, outcome.reward, outcome.credit.as_ref(), settled)))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_get_quiz(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((challenge_id, quiz_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.quiz(challenge_id, quiz_id, &user.id).await?))
}

#[instrument(level = "info", skip(state, user, body), fields(user_id = %user.id, slot = body.slot))]
pub async fn http_attempt_quiz(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path((challenge_id, quiz_id)): Path<(i64, i64)>,
    Json(body): Json<QuizAttemptIn>,
) -> Result<impl IntoResponse> {
    let outcome = state.attempt_quiz(challenge_id, quiz_id, &user.id, &body.selected, body.slot).await?;
    info!(target: "challenge", challenge_id, quiz_id, correct = outcome.is_correct, attempt = outcome.attempt_count, "HTTP quiz attempt");
    Ok(Json(AttemptOut::from(outcome)))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_get_roulette(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.roulette(challenge_id, &user.id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_spin(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (outcome, settled) = state.spin(challenge_id, &user.id).await?;
    info!(target: "challenge", challenge_id, won = outcome.spin.won_index, settled, "HTTP roulette spin");
    Ok(Json(SpinOut::new(outcome, settled)))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_leaderboard(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.leaderboard(challenge_id, &user.id).await?))
}

#[instrument(level = "info", skip(state, user), fields(user_id = %user.id))]
pub async fn http_points(State(state): State<Arc<AppState>>, CurrentUser(user): CurrentUser) -> Result<impl IntoResponse> {
    let (balance, history) = state.points(&user.id).await?;
    Ok(Json(PointsOut { balance, history }))
}
