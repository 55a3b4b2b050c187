//! Catalog synchronisation: validate configured (or seeded) challenges, quizzes and
//! roulette settings and upsert them into the store.

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{error, info, instrument};

use crate::config::AppConfig;
use crate::domain::{Challenge, Quiz, QuizKind, RouletteSettings};
use crate::error::Result;
use crate::seeds::seed_catalog;
use crate::store::{challenges, quizzes, roulette};

pub fn validate_challenge(c: &Challenge) -> std::result::Result<(), String> {
  if c.challenge_duration_days == 0 {
    return Err("challenge_duration_days must be positive".into());
  }
  if c.daily_verification_count == 0 {
    return Err("daily_verification_count must be positive".into());
  }
  if c.total_required_count().is_none() {
    return Err("challenge_duration_days * daily_verification_count overflows".into());
  }
  if c.recruitment_start > c.recruitment_end {
    return Err("recruitment window ends before it starts".into());
  }
  if c.operation_start > c.operation_end {
    return Err("operation window ends before it starts".into());
  }
  if c.time_slots.iter().any(|s| s.start > s.end) {
    return Err("time slot windows must not cross midnight".into());
  }
  Ok(())
}

pub fn validate_quiz(q: &Quiz) -> std::result::Result<(), String> {
  if q.correct_answers.is_empty() {
    return Err("quiz has no correct answers".into());
  }
  if q.kind == QuizKind::Ox && q.correct_answers.len() != 1 {
    return Err("an O/X quiz has exactly one correct answer".into());
  }
  Ok(())
}

pub fn validate_roulette(s: &RouletteSettings) -> std::result::Result<(), String> {
  if s.segments.is_empty() {
    return Err("roulette has no segments".into());
  }
  if s.segments.iter().any(|seg| !seg.probability.is_finite() || seg.probability < 0.0) {
    return Err("segment weights must be finite and non-negative".into());
  }
  if s.total_weight() <= 0.0 {
    return Err("segment weights sum to zero".into());
  }
  Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncSummary {
  pub challenges: usize,
  pub quizzes: usize,
  pub roulette: usize,
  pub skipped: usize,
}

/// Upsert the configured catalog, or the built-in seeds when the config has none.
/// Invalid entries are logged and skipped; `current_participants` is never overwritten.
#[instrument(level = "info", skip_all)]
pub fn sync(conn: &mut Connection, cfg: &AppConfig, today: NaiveDate) -> Result<SyncSummary> {
  let (challenge_list, quiz_list, roulette_list) = if cfg.has_catalog() {
    (cfg.challenges.clone(), cfg.quizzes.clone(), cfg.roulette.clone())
  } else {
    info!(target: "challenge_engine", "No catalog configured; loading built-in seeds");
    let seeds = seed_catalog(today);
    (seeds.challenges, seeds.quizzes, seeds.roulette)
  };

  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let mut summary = SyncSummary::default();

  for c in &challenge_list {
    match validate_challenge(c) {
      Ok(()) => {
        challenges::upsert(&tx, c)?;
        summary.challenges += 1;
      }
      Err(reason) => {
        error!(target: "challenge_engine", id = c.id, %reason, "Skipping catalog challenge");
        summary.skipped += 1;
      }
    }
  }

  for q in &quiz_list {
    let check = validate_quiz(q).and_then(|_| owner_exists(&tx, q.challenge_id));
    match check {
      Ok(()) => {
        quizzes::upsert(&tx, q)?;
        summary.quizzes += 1;
      }
      Err(reason) => {
        error!(target: "challenge_engine", id = q.id, challenge_id = q.challenge_id, %reason, "Skipping catalog quiz");
        summary.skipped += 1;
      }
    }
  }

  for s in &roulette_list {
    let check = validate_roulette(s).and_then(|_| owner_exists(&tx, s.challenge_id));
    match check {
      Ok(()) => {
        roulette::upsert_settings(&tx, s)?;
        summary.roulette += 1;
      }
      Err(reason) => {
        error!(target: "challenge_engine", challenge_id = s.challenge_id, %reason, "Skipping roulette settings");
        summary.skipped += 1;
      }
    }
  }

  tx.commit()?;
  info!(
    target: "challenge_engine",
    challenges = summary.challenges,
    quizzes = summary.quizzes,
    roulette = summary.roulette,
    skipped = summary.skipped,
    "Catalog synchronised"
  );
  Ok(summary)
}

fn owner_exists(conn: &Connection, challenge_id: i64) -> std::result::Result<(), String> {
  match challenges::get(conn, challenge_id) {
    Ok(Some(_)) => Ok(()),
    Ok(None) => Err(format!("challenge {challenge_id} is not in the catalog")),
    Err(e) => Err(e.to_string()),
  }
}
