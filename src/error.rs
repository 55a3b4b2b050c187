//! Error taxonomy for the participation engine and its HTTP mapping.
//!
//! Every failure falls in one of four kinds:
//!   - Validation:    malformed input, never worth retrying as-is
//!   - StateConflict: the request is well-formed but the current state forbids it
//!   - NotFound:      a referenced challenge/participation/quiz/settings row is missing
//!   - Dependency:    the store or the point ledger failed; the caller retries the whole call

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::domain::RouletteSegment;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    StateConflict,
    NotFound,
    Dependency,
}

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("recruitment has not opened yet")]
    NotOpen,

    #[error("recruitment is closed or the challenge is full")]
    RecruitmentClosed,

    #[error("already participating in this challenge")]
    AlreadyParticipating,

    #[error("already participating in another challenge of the same type")]
    DuplicateTypeParticipation,

    #[error("participation is already {0}")]
    TerminalState(&'static str),

    #[error("participation is not active")]
    NotParticipating,

    #[error("the participation period has ended")]
    WindowClosed,

    #[error("today's verification quota is already met")]
    DailyQuotaReached,

    #[error("slot {0} is already verified today")]
    SlotAlreadyVerified(u32),

    #[error("slot {0} is outside its verification time window")]
    OutsideTimeWindow(u32),

    #[error("this quiz was already answered correctly today")]
    AlreadyCorrect,

    #[error("no quiz attempts left today")]
    RetriesExhausted,

    #[error("this challenge does not use roulette verification")]
    WrongChallengeKind,

    #[error("already spun the roulette today")]
    AlreadySpunToday {
        won_index: usize,
        won_segment: RouletteSegment,
    },

    #[error("the challenge is not completed yet")]
    NotCompleted,

    #[error("the reward was already claimed")]
    RewardAlreadyClaimed,

    #[error("storage failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("point ledger failure: {0}")]
    Ledger(String),
}

pub type Result<T> = std::result::Result<T, ChallengeError>;

impl ChallengeError {
    pub fn kind(&self) -> ErrorKind {
        use ChallengeError::*;
        match self {
            Validation(_) => ErrorKind::Validation,
            NotFound(_) => ErrorKind::NotFound,
            Store(_) | Ledger(_) => ErrorKind::Dependency,
            NotOpen
            | RecruitmentClosed
            | AlreadyParticipating
            | DuplicateTypeParticipation
            | TerminalState(_)
            | NotParticipating
            | WindowClosed
            | DailyQuotaReached
            | SlotAlreadyVerified(_)
            | OutsideTimeWindow(_)
            | AlreadyCorrect
            | RetriesExhausted
            | WrongChallengeKind
            | AlreadySpunToday { .. }
            | NotCompleted
            | RewardAlreadyClaimed => ErrorKind::StateConflict,
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        use ChallengeError::*;
        match self {
            Validation(_) => "validation_error",
            NotFound(_) => "not_found",
            NotOpen => "not_open",
            RecruitmentClosed => "recruitment_closed",
            AlreadyParticipating => "already_participating",
            DuplicateTypeParticipation => "duplicate_type_participation",
            TerminalState(_) => "terminal_state",
            NotParticipating => "not_participating",
            WindowClosed => "window_closed",
            DailyQuotaReached => "daily_quota_reached",
            SlotAlreadyVerified(_) => "slot_already_verified",
            OutsideTimeWindow(_) => "outside_time_window",
            AlreadyCorrect => "already_correct",
            RetriesExhausted => "retries_exhausted",
            WrongChallengeKind => "wrong_challenge_kind",
            AlreadySpunToday { .. } => "already_spun_today",
            NotCompleted => "not_completed",
            RewardAlreadyClaimed => "reward_already_claimed",
            Store(_) | Ledger(_) => "dependency_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StateConflict => StatusCode::CONFLICT,
            ErrorKind::Dependency => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<PreviousSpin>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviousSpin {
    won_index: usize,
    won_segment: RouletteSegment,
}

impl IntoResponse for ChallengeError {
    fn into_response(self) -> Response {
        let message = match self.kind() {
            ErrorKind::Dependency => {
                error!(target: "challenge", error = %self, "Dependency failure");
                "temporary failure, please retry".to_string()
            }
            _ => self.to_string(),
        };
        let previous = match &self {
            ChallengeError::AlreadySpunToday { won_index, won_segment } => Some(PreviousSpin {
                won_index: *won_index,
                won_segment: won_segment.clone(),
            }),
            _ => None,
        };
        let body = ErrorBody { error: self.code(), message, previous };
        (self.status(), Json(body)).into_response()
    }
}
