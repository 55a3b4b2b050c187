//! Domain models: catalog descriptors (challenge, quiz, roulette settings) and the
//! participation-side records the engine writes (participation, verification, stamp,
//! quiz attempt, roulette spin, ranking row).

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Text-backed enums are stored as their snake_case names.
macro_rules! text_enum {
  ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
    impl $name {
      pub fn as_str(&self) -> &'static str {
        match self { $($name::$variant => $text),+ }
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
    }

    impl FromStr for $name {
      type Err = String;
      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
          $($text => Ok($name::$variant),)+
          other => Err(format!("unknown {} '{}'", stringify!($name), other)),
        }
      }
    }
  };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
  Attendance,
  Steps,
  Meal,
  Supplement,
  NutritionDiagnosis,
  HealthHabit,
  Quiz,
}
text_enum!(ChallengeType {
  Attendance => "attendance",
  Steps => "steps",
  Meal => "meal",
  Supplement => "supplement",
  NutritionDiagnosis => "nutrition_diagnosis",
  HealthHabit => "health_habit",
  Quiz => "quiz",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
  Roulette,
  Auto,
  Manual,
}
text_enum!(VerificationMethod {
  Roulette => "roulette",
  Auto => "auto",
  Manual => "manual",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipationStatus {
  Participating,
  Completed,
  Cancelled,
  Expired,
}
text_enum!(ParticipationStatus {
  Participating => "participating",
  Completed => "completed",
  Cancelled => "cancelled",
  Expired => "expired",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
  /// True/false question; exactly one answer is selected.
  Ox,
  /// Multi-select question graded as a set.
  MultipleChoice,
}
text_enum!(QuizKind {
  Ox => "ox",
  MultipleChoice => "multiple_choice",
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
  Point,
  Coupon,
  Gift,
  /// Losing segment ("better luck next time").
  None,
}

/// A user as vouched for by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
  pub id: String,
  pub display_name: String,
}

impl User {
  pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
    Self { id: id.into(), display_name: display_name.into() }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct TimeSlot {
  pub start: NaiveTime,
  pub end: NaiveTime,
  #[serde(default)]
  pub label: String,
}

impl TimeSlot {
  /// Inclusive on both ends.
  pub fn contains(&self, t: NaiveTime) -> bool {
    self.start <= t && t <= self.end
  }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Reward {
  #[serde(alias = "rewardType")]
  pub reward_type: RewardType,
  #[serde(default)]
  pub value: i64,
  #[serde(default)]
  pub description: String,
}

/// Catalog descriptor of a challenge. Read-only to the engine apart from
/// `current_participants`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Challenge {
  pub id: i64,
  #[serde(default)]
  pub title: String,
  pub challenge_type: ChallengeType,
  pub verification_method: VerificationMethod,
  pub recruitment_start: NaiveDate,
  pub recruitment_end: NaiveDate,
  pub operation_start: NaiveDate,
  pub operation_end: NaiveDate,
  pub challenge_duration_days: u32,
  pub daily_verification_count: u32,
  #[serde(default)]
  pub time_slots: Vec<TimeSlot>,
  #[serde(default)]
  pub max_participants: Option<u32>,
  #[serde(default)]
  pub current_participants: u32,
  #[serde(default)]
  pub total_stamp_count: u32,
  #[serde(default)]
  pub reward: Option<Reward>,
}

impl Challenge {
  /// `None` when the product does not fit a `u32`.
  pub fn total_required_count(&self) -> Option<u32> {
    self.challenge_duration_days.checked_mul(self.daily_verification_count)
  }

  /// Slots index from 1; slot `i` maps to `time_slots[i - 1]`.
  pub fn slot_window(&self, slot: u32) -> Option<&TimeSlot> {
    let idx = usize::try_from(slot).ok()?.checked_sub(1)?;
    self.time_slots.get(idx)
  }

  pub fn is_roulette_attendance(&self) -> bool {
    self.challenge_type == ChallengeType::Attendance
      && self.verification_method == VerificationMethod::Roulette
  }
}

/// `min(100, 100 * total / required)`; zero when nothing is required.
pub fn achievement_rate(total: u32, required: u32) -> f64 {
  if required == 0 {
    return 0.0;
  }
  (100.0 * f64::from(total) / f64::from(required)).min(100.0)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
  pub id: i64,
  pub challenge_id: i64,
  pub user_id: String,
  pub status: ParticipationStatus,
  pub start_date: NaiveDate,
  pub end_date: NaiveDate,
  pub total_required_count: u32,
  pub total_verification_count: u32,
  pub today_verification_count: u32,
  pub achievement_rate: f64,
  pub last_verification_date: Option<NaiveDate>,
  pub is_reward_claimed: bool,
  pub created_at: NaiveDateTime,
  pub updated_at: NaiveDateTime,
}

impl Participation {
  /// Status as seen on `today`. Expiry is never written back; a stored
  /// `participating` row past its end date reads as `expired`.
  pub fn effective_status(&self, today: NaiveDate) -> ParticipationStatus {
    match self.status {
      ParticipationStatus::Participating if today > self.end_date => ParticipationStatus::Expired,
      other => other,
    }
  }

  pub fn is_active(&self, today: NaiveDate) -> bool {
    self.effective_status(today) == ParticipationStatus::Participating
  }

  /// Read-time view: derived status, and the daily counter zeroed once the day rolled over.
  pub fn as_of(mut self, today: NaiveDate) -> Self {
    self.status = self.effective_status(today);
    if self.last_verification_date != Some(today) {
      self.today_verification_count = 0;
    }
    self
  }
}

/// Proof payload, one shape per challenge type. Quiz and roulette payloads
/// are produced by their engines, never submitted directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationPayload {
  Attendance {
    #[serde(default)]
    memo: Option<String>,
  },
  Steps {
    steps: u32,
  },
  Meal {
    #[serde(rename = "mealType")]
    meal_type: String,
    #[serde(default)]
    memo: Option<String>,
    #[serde(default, rename = "photoUrl")]
    photo_url: Option<String>,
  },
  Supplement {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    memo: Option<String>,
  },
  NutritionDiagnosis {
    answers: serde_json::Value,
  },
  HealthHabit {
    #[serde(default)]
    memo: Option<String>,
    #[serde(default, rename = "photoUrl")]
    photo_url: Option<String>,
  },
  Quiz {
    #[serde(rename = "quizId")]
    quiz_id: i64,
    selected: Vec<String>,
    #[serde(rename = "isCorrect")]
    is_correct: bool,
  },
  Roulette {
    #[serde(rename = "segmentIndex")]
    segment_index: usize,
    label: String,
  },
}

impl VerificationPayload {
  /// The challenge type this payload shape belongs to.
  pub fn challenge_type(&self) -> ChallengeType {
    match self {
      VerificationPayload::Attendance { .. } | VerificationPayload::Roulette { .. } => ChallengeType::Attendance,
      VerificationPayload::Steps { .. } => ChallengeType::Steps,
      VerificationPayload::Meal { .. } => ChallengeType::Meal,
      VerificationPayload::Supplement { .. } => ChallengeType::Supplement,
      VerificationPayload::NutritionDiagnosis { .. } => ChallengeType::NutritionDiagnosis,
      VerificationPayload::HealthHabit { .. } => ChallengeType::HealthHabit,
      VerificationPayload::Quiz { .. } => ChallengeType::Quiz,
    }
  }

  pub fn is_engine_produced(&self) -> bool {
    matches!(self, VerificationPayload::Quiz { .. } | VerificationPayload::Roulette { .. })
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
  pub id: i64,
  pub participation_id: i64,
  pub verification_date: NaiveDate,
  pub verification_time: NaiveTime,
  pub verification_slot: u32,
  pub verification_data: VerificationPayload,
  pub is_verified: bool,
  pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stamp {
  pub stamp_number: u32,
  pub is_achieved: bool,
  pub achieved_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Quiz {
  pub id: i64,
  pub challenge_id: i64,
  pub kind: QuizKind,
  pub question: String,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(deserialize_with = "answer_tokens")]
  pub correct_answers: Vec<String>,
  #[serde(default)]
  pub hint: Option<String>,
}

/// Canonical text for one answer: `true`, `"true"`, `2` and `2.0` compare by this form.
pub fn answer_token(v: &serde_json::Value) -> Option<String> {
  use serde_json::Value;
  match v {
    Value::Bool(b) => Some(b.to_string()),
    Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
      (Some(i), _, _) => Some(i.to_string()),
      (_, Some(u), _) => Some(u.to_string()),
      (_, _, Some(f)) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => Some(format!("{}", f as i64)),
      _ => Some(n.to_string()),
    },
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    _ => None,
  }
}

fn answer_tokens<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
  raw
    .iter()
    .map(|v| answer_token(v).ok_or_else(|| serde::de::Error::custom(format!("unsupported answer value: {v}"))))
    .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
  pub id: i64,
  pub quiz_id: i64,
  pub participation_id: i64,
  pub attempt_date: NaiveDate,
  pub selected: Vec<String>,
  pub is_correct: bool,
  pub attempt_count: u32,
  pub created_at: NaiveDateTime,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteSegment {
  pub label: String,
  /// Relative weight; need not sum to 100.
  pub probability: f64,
  #[serde(alias = "reward_type")]
  pub reward_type: RewardType,
  #[serde(default, alias = "reward_value")]
  pub reward_value: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct RouletteSettings {
  pub challenge_id: i64,
  pub segments: Vec<RouletteSegment>,
}

impl RouletteSettings {
  pub fn total_weight(&self) -> f64 {
    self.segments.iter().map(|s| s.probability).sum()
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteSpin {
  pub id: i64,
  pub challenge_id: i64,
  pub user_id: String,
  pub participation_id: i64,
  pub spin_date: NaiveDate,
  pub won_index: usize,
  pub won_segment: RouletteSegment,
  pub created_at: NaiveDateTime,
}

/// Leaderboard projection row; not a source of truth.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingRow {
  pub user_id: String,
  pub display_name: String,
  pub achievement_rate: f64,
  pub completed_at: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(s: &str) -> NaiveDate {
    s.parse().expect("date")
  }

  fn participation(end: &str) -> Participation {
    let created = date("2026-10-01").and_hms_opt(9, 0, 0).expect("time");
    Participation {
      id: 1,
      challenge_id: 1,
      user_id: "u1".into(),
      status: ParticipationStatus::Participating,
      start_date: date("2026-10-01"),
      end_date: date(end),
      total_required_count: 7,
      total_verification_count: 2,
      today_verification_count: 1,
      achievement_rate: achievement_rate(2, 7),
      last_verification_date: Some(date("2026-10-02")),
      is_reward_claimed: false,
      created_at: created,
      updated_at: created,
    }
  }

  #[test]
  fn rate_is_capped_and_zero_safe() {
    assert_eq!(achievement_rate(0, 10), 0.0);
    assert_eq!(achievement_rate(5, 10), 50.0);
    assert_eq!(achievement_rate(12, 10), 100.0);
    assert_eq!(achievement_rate(3, 0), 0.0);
  }

  #[test]
  fn expiry_is_derived_at_read_time() {
    let p = participation("2026-10-08");
    assert_eq!(p.effective_status(date("2026-10-08")), ParticipationStatus::Participating);
    assert_eq!(p.effective_status(date("2026-10-09")), ParticipationStatus::Expired);

    let mut cancelled = participation("2026-10-08");
    cancelled.status = ParticipationStatus::Cancelled;
    assert_eq!(cancelled.effective_status(date("2026-12-01")), ParticipationStatus::Cancelled);
  }

  #[test]
  fn stale_daily_counter_reads_as_zero() {
    let p = participation("2026-10-08");
    assert_eq!(p.clone().as_of(date("2026-10-02")).today_verification_count, 1);
    assert_eq!(p.as_of(date("2026-10-03")).today_verification_count, 0);
  }

  #[test]
  fn slot_windows_index_from_one() {
    let slot = TimeSlot {
      start: NaiveTime::from_hms_opt(6, 0, 0).expect("t"),
      end: NaiveTime::from_hms_opt(9, 0, 0).expect("t"),
      label: "morning".into(),
    };
    let challenge = Challenge {
      id: 1,
      title: String::new(),
      challenge_type: ChallengeType::Supplement,
      verification_method: VerificationMethod::Manual,
      recruitment_start: date("2026-10-01"),
      recruitment_end: date("2026-10-31"),
      operation_start: date("2026-10-01"),
      operation_end: date("2026-11-30"),
      challenge_duration_days: 7,
      daily_verification_count: 2,
      time_slots: vec![slot.clone()],
      max_participants: None,
      current_participants: 0,
      total_stamp_count: 7,
      reward: None,
    };
    assert_eq!(challenge.slot_window(0), None);
    assert_eq!(challenge.slot_window(1), Some(&slot));
    assert_eq!(challenge.slot_window(2), None);
    assert_eq!(challenge.total_required_count(), Some(14));

    let huge = Challenge { challenge_duration_days: 70_000, daily_verification_count: 70_000, ..challenge };
    assert_eq!(huge.total_required_count(), None);
  }

  #[test]
  fn payload_is_tagged_by_kind() {
    let p: VerificationPayload =
      serde_json::from_str(r#"{"kind":"meal","mealType":"lunch","memo":"salad"}"#).expect("payload");
    assert_eq!(p.challenge_type(), ChallengeType::Meal);
    assert!(!p.is_engine_produced());

    let out = serde_json::to_value(&VerificationPayload::Roulette { segment_index: 2, label: "100P".into() })
      .expect("json");
    assert_eq!(out["kind"], "roulette");
    assert_eq!(out["segmentIndex"], 2);
  }
}
