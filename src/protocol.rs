//! Public protocol structs for the HTTP endpoints (serde ready, camelCase on the wire).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Participation, Reward, RouletteSegment, Verification, VerificationPayload};
use crate::ledger::PointCredit;
use crate::quiz::AttemptOutcome;
use crate::roulette::SpinOutcome;
use crate::store::points::PointHistoryRow;
use crate::verification::RecordOutcome;

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct OkOut {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerificationIn {
    pub slot: u32,
    pub payload: VerificationPayload,
}

#[derive(Debug, Deserialize)]
pub struct VerificationQuery {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct QuizAttemptIn {
    /// `true`, `"O"`, or `["a", "b"]`.
    pub selected: Value,
    #[serde(default = "first_slot")]
    pub slot: u32,
}

fn first_slot() -> u32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOut {
    pub verification: Verification,
    pub total_verification_count: u32,
    pub today_verification_count: u32,
    pub achievement_rate: f64,
    pub completed: bool,
    pub stamp_awarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp_number: Option<u32>,
}

impl From<RecordOutcome> for RecordOut {
    fn from(o: RecordOutcome) -> Self {
        Self {
            verification: o.verification,
            total_verification_count: o.participation.total_verification_count,
            today_verification_count: o.participation.today_verification_count,
            achievement_rate: o.participation.achievement_rate,
            completed: o.just_completed,
            stamp_awarded: o.stamp_awarded.is_some(),
            stamp_number: o.stamp_awarded,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOut {
    pub is_correct: bool,
    pub can_retry: bool,
    pub attempt_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<Vec<String>>,
    /// Present when the correct answer also counted as today's verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<RecordOut>,
}

impl From<AttemptOutcome> for AttemptOut {
    fn from(o: AttemptOutcome) -> Self {
        Self {
            is_correct: o.is_correct,
            can_retry: o.can_retry,
            attempt_count: o.attempt_count,
            hint: o.hint,
            correct_answers: o.correct_answers,
            verification: o.recorded.map(RecordOut::from),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinOut {
    pub won_index: usize,
    pub won_segment: RouletteSegment,
    pub message: String,
    pub achievement_rate: f64,
    pub total_verification_count: u32,
    pub completed: bool,
    pub stamp_awarded: bool,
    /// Only for point segments: false when the remote ledger could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_credited: Option<bool>,
}

impl SpinOut {
    pub fn new(o: SpinOutcome, settled: bool) -> Self {
        let participation = &o.recorded.participation;
        Self {
            won_index: o.spin.won_index,
            achievement_rate: participation.achievement_rate,
            total_verification_count: participation.total_verification_count,
            completed: o.recorded.just_completed,
            stamp_awarded: o.recorded.stamp_awarded.is_some(),
            points_credited: o.credit.as_ref().map(|_| settled),
            won_segment: o.spin.won_segment,
            message: o.message,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOut {
    pub participation: Participation,
    pub reward: Option<Reward>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_credited: Option<bool>,
}

impl ClaimOut {
    pub fn new(participation: Participation, reward: Option<Reward>, credit: Option<&PointCredit>, settled: bool) -> Self {
        Self { participation, reward, points_credited: credit.map(|_| settled) }
    }
}

#[derive(Debug, Serialize)]
pub struct PointsOut {
    pub balance: i64,
    pub history: Vec<PointHistoryRow>,
}
