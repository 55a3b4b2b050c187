//! Built-in demo catalog so the service is useful without a config file.

use chrono::{Days, NaiveDate, NaiveTime};

use crate::domain::{
  Challenge, ChallengeType, Quiz, QuizKind, Reward, RewardType, RouletteSegment, RouletteSettings, TimeSlot,
  VerificationMethod,
};

/// Catalog entries that ship with the binary. Windows are placed around `today`
/// so a fresh install can enroll immediately.
pub struct SeedCatalog {
  pub challenges: Vec<Challenge>,
  pub quizzes: Vec<Quiz>,
  pub roulette: Vec<RouletteSettings>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
  NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn base(id: i64, title: &str, today: NaiveDate) -> Challenge {
  let open = today.checked_sub_days(Days::new(7)).unwrap_or(today);
  let close = today.checked_add_days(Days::new(60)).unwrap_or(today);
  let finish = today.checked_add_days(Days::new(120)).unwrap_or(today);
  Challenge {
    id,
    title: title.into(),
    challenge_type: ChallengeType::Attendance,
    verification_method: VerificationMethod::Manual,
    recruitment_start: open,
    recruitment_end: close,
    operation_start: open,
    operation_end: finish,
    challenge_duration_days: 14,
    daily_verification_count: 1,
    time_slots: Vec::new(),
    max_participants: None,
    current_participants: 0,
    total_stamp_count: 14,
    reward: None,
  }
}

pub fn seed_catalog(today: NaiveDate) -> SeedCatalog {
  let roulette = Challenge {
    verification_method: VerificationMethod::Roulette,
    max_participants: Some(1000),
    reward: Some(Reward { reward_type: RewardType::Point, value: 1000, description: "Perfect attendance".into() }),
    ..base(1, "Daily roulette attendance", today)
  };

  let supplements = Challenge {
    challenge_type: ChallengeType::Supplement,
    daily_verification_count: 2,
    time_slots: vec![
      TimeSlot { start: hm(6, 0), end: hm(11, 0), label: "morning".into() },
      TimeSlot { start: hm(17, 0), end: hm(23, 0), label: "evening".into() },
    ],
    reward: Some(Reward { reward_type: RewardType::Coupon, value: 0, description: "10% off multivitamins".into() }),
    ..base(2, "Morning and evening supplements", today)
  };

  let quiz = Challenge {
    challenge_type: ChallengeType::Quiz,
    verification_method: VerificationMethod::Auto,
    challenge_duration_days: 7,
    total_stamp_count: 7,
    reward: Some(Reward { reward_type: RewardType::Point, value: 300, description: "Nutrition quiz week".into() }),
    ..base(3, "Nutrition quiz week", today)
  };

  let walk = Challenge {
    challenge_type: ChallengeType::HealthHabit,
    challenge_duration_days: 30,
    total_stamp_count: 30,
    ..base(4, "Thirty days of walking", today)
  };

  SeedCatalog {
    challenges: vec![roulette, supplements, quiz, walk],
    quizzes: vec![
      Quiz {
        id: 1,
        challenge_id: 3,
        kind: QuizKind::Ox,
        question: "Vitamin C is a fat-soluble vitamin.".into(),
        options: vec!["true".into(), "false".into()],
        correct_answers: vec!["false".into()],
        hint: Some("Think about which vitamins the body cannot store.".into()),
      },
      Quiz {
        id: 2,
        challenge_id: 3,
        kind: QuizKind::MultipleChoice,
        question: "Which of these are good sources of fibre?".into(),
        options: vec!["oats".into(), "lentils".into(), "butter".into(), "white rice".into()],
        correct_answers: vec!["oats".into(), "lentils".into()],
        hint: Some("Whole grains and legumes.".into()),
      },
    ],
    roulette: vec![RouletteSettings {
      challenge_id: 1,
      segments: vec![
        RouletteSegment { label: "100P".into(), probability: 5.0, reward_type: RewardType::Point, reward_value: 100 },
        RouletteSegment { label: "30P".into(), probability: 15.0, reward_type: RewardType::Point, reward_value: 30 },
        RouletteSegment { label: "10P".into(), probability: 30.0, reward_type: RewardType::Point, reward_value: 10 },
        RouletteSegment { label: "Coupon".into(), probability: 5.0, reward_type: RewardType::Coupon, reward_value: 0 },
        RouletteSegment { label: "Next time".into(), probability: 45.0, reward_type: RewardType::None, reward_value: 0 },
      ],
    }],
  }
}
