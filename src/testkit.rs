//! Shared test fixtures.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::domain::{
  Challenge, ChallengeType, Quiz, QuizKind, Reward, RewardType, RouletteSegment, RouletteSettings, User,
  VerificationMethod,
};
use crate::store;

pub fn day(s: &str) -> NaiveDate {
  s.parse().expect("date")
}

pub fn at(date: &str, hour: u32, minute: u32) -> NaiveDateTime {
  day(date).and_hms_opt(hour, minute, 0).expect("time")
}

pub fn user(id: &str) -> User {
  User::new(id, format!("{id}-name"))
}

/// Manual supplement challenge recruiting and operating through October 2026.
pub fn manual_challenge(id: i64, daily: u32) -> Challenge {
  Challenge {
    id,
    title: format!("challenge {id}"),
    challenge_type: ChallengeType::Supplement,
    verification_method: VerificationMethod::Manual,
    recruitment_start: day("2026-10-01"),
    recruitment_end: day("2026-10-31"),
    operation_start: day("2026-10-01"),
    operation_end: day("2026-11-30"),
    challenge_duration_days: 7,
    daily_verification_count: daily,
    time_slots: Vec::new(),
    max_participants: None,
    current_participants: 0,
    total_stamp_count: 7,
    reward: None,
  }
}

pub fn quiz_challenge(id: i64) -> Challenge {
  Challenge {
    challenge_type: ChallengeType::Quiz,
    verification_method: VerificationMethod::Auto,
    reward: Some(Reward { reward_type: RewardType::Point, value: 300, description: "quiz master".into() }),
    ..manual_challenge(id, 1)
  }
}

pub fn roulette_challenge(id: i64) -> Challenge {
  Challenge {
    challenge_type: ChallengeType::Attendance,
    verification_method: VerificationMethod::Roulette,
    ..manual_challenge(id, 1)
  }
}

pub fn ox_quiz(id: i64, challenge_id: i64) -> Quiz {
  Quiz {
    id,
    challenge_id,
    kind: QuizKind::Ox,
    question: "Vitamin C is fat-soluble.".into(),
    options: vec!["true".into(), "false".into()],
    correct_answers: vec!["false".into()],
    hint: Some("Think about what dissolves in water.".into()),
  }
}

pub fn multi_quiz(id: i64, challenge_id: i64) -> Quiz {
  Quiz {
    id,
    challenge_id,
    kind: QuizKind::MultipleChoice,
    question: "Which are leafy greens?".into(),
    options: vec!["spinach".into(), "kale".into(), "carrot".into()],
    correct_answers: vec!["spinach".into(), "kale".into()],
    hint: None,
  }
}

pub fn segment(label: &str, probability: f64, reward_type: RewardType, reward_value: i64) -> RouletteSegment {
  RouletteSegment { label: label.into(), probability, reward_type, reward_value }
}

/// Weights 10/20/70: 100P, 50P, a miss.
pub fn wheel(challenge_id: i64) -> RouletteSettings {
  RouletteSettings {
    challenge_id,
    segments: vec![
      segment("100P", 10.0, RewardType::Point, 100),
      segment("50P", 20.0, RewardType::Point, 50),
      segment("Next time", 70.0, RewardType::None, 0),
    ],
  }
}

/// In-memory store with the given challenges loaded.
pub fn store_with(challenges: &[Challenge]) -> Connection {
  let conn = store::open_memory().expect("open");
  for c in challenges {
    store::challenges::upsert(&conn, c).expect("challenge");
  }
  conn
}
