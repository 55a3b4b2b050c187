//! Roulette Engine: one weighted spin per participant per day. The spin doubles as the
//! day's attendance verification, and point segments credit the ledger.

use chrono::NaiveDateTime;
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::{RewardType, RouletteSegment, RouletteSpin, VerificationPayload};
use crate::error::{ChallengeError, Result};
use crate::ledger::{self, PointCredit};
use crate::store::{self, challenges, participations, roulette};
use crate::verification::{self, RecordOutcome};

/// Uniform draw in `[0, upper]`.
pub trait DrawSource: Send + Sync {
  fn draw(&self, upper: f64) -> f64;
}

pub struct ThreadDraw;

impl DrawSource for ThreadDraw {
  fn draw(&self, upper: f64) -> f64 {
    if upper <= 0.0 {
      return 0.0;
    }
    rand::thread_rng().gen_range(0.0..=upper)
  }
}

/// Always returns the same value (clamped to the upper bound).
#[cfg(test)]
pub struct FixedDraw(pub f64);

#[cfg(test)]
impl DrawSource for FixedDraw {
  fn draw(&self, upper: f64) -> f64 {
    self.0.min(upper)
  }
}

/// Weighted pick: walk the cumulative weights and take the first segment with `r <= c`.
/// Floating-point drift that leaves `r` past the final sum lands on the last segment.
pub fn select_segment(segments: &[RouletteSegment], r: f64) -> Option<usize> {
  if segments.is_empty() {
    return None;
  }
  let mut cumulative = 0.0;
  for (i, seg) in segments.iter().enumerate() {
    cumulative += seg.probability;
    if r <= cumulative {
      return Some(i);
    }
  }
  Some(segments.len() - 1)
}

pub fn reward_message(segment: &RouletteSegment) -> String {
  match segment.reward_type {
    RewardType::Point => format!("You won {} points!", segment.reward_value),
    RewardType::Coupon => format!("You won a coupon: {}", segment.label),
    RewardType::Gift => format!("You won a gift: {}", segment.label),
    RewardType::None => "Better luck next time! Your attendance still counts.".to_string(),
  }
}

#[derive(Debug, Clone)]
pub struct SpinOutcome {
  pub spin: RouletteSpin,
  pub message: String,
  pub recorded: RecordOutcome,
  /// Set for point segments; forward it once the transaction committed.
  pub credit: Option<PointCredit>,
}

#[instrument(level = "info", skip(conn, draw), fields(%challenge_id, %user_id))]
pub fn spin(
  conn: &mut Connection,
  challenge_id: i64,
  user_id: &str,
  draw: &dyn DrawSource,
  now: NaiveDateTime,
) -> Result<SpinOutcome> {
  let today = now.date();
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let challenge = challenges::get(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;
  if !challenge.is_roulette_attendance() {
    return Err(ChallengeError::WrongChallengeKind);
  }
  let settings = roulette::settings(&tx, challenge_id)?.ok_or(ChallengeError::NotFound("roulette settings"))?;
  let participation =
    participations::find(&tx, challenge_id, user_id)?.ok_or(ChallengeError::NotFound("participation"))?;

  if let Some(previous) = roulette::spin_on(&tx, challenge_id, user_id, today)? {
    return Err(ChallengeError::AlreadySpunToday { won_index: previous.won_index, won_segment: previous.won_segment });
  }
  // Recorder rules still apply; reject before drawing so nothing is logged.
  if !participation.is_active(today) {
    return Err(ChallengeError::NotParticipating);
  }

  let r = draw.draw(settings.total_weight());
  let won_index = select_segment(&settings.segments, r)
    .ok_or_else(|| ChallengeError::Validation("roulette has no segments".into()))?;
  let won = settings.segments[won_index].clone();

  let spin_id = match roulette::insert_spin(&tx, challenge_id, user_id, participation.id, today, won_index, &won, now) {
    Ok(id) => id,
    Err(e) if store::is_constraint_violation(&e) => {
      let previous = roulette::spin_on(&tx, challenge_id, user_id, today)?.ok_or(ChallengeError::Store(e))?;
      return Err(ChallengeError::AlreadySpunToday { won_index: previous.won_index, won_segment: previous.won_segment });
    }
    Err(e) => return Err(e.into()),
  };

  let payload = VerificationPayload::Roulette { segment_index: won_index, label: won.label.clone() };
  let recorded = verification::record_in(&tx, &challenge, &participation, 1, &payload, now)?;

  let credit = if won.reward_type == RewardType::Point && won.reward_value > 0 {
    let credit = PointCredit::roulette(user_id, spin_id, won.reward_value, &won.label);
    ledger::credit_local(&tx, &credit, now)?;
    Some(credit)
  } else {
    None
  };

  let spin = roulette::spin_on(&tx, challenge_id, user_id, today)?.ok_or(ChallengeError::NotFound("roulette spin"))?;
  tx.commit()?;

  info!(target: "challenge", won_index, label = %won.label, r = %format!("{:.3}", r), "Roulette spun");
  Ok(SpinOutcome { message: reward_message(&won), spin, recorded, credit })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouletteView {
  pub challenge_id: i64,
  pub segments: Vec<RouletteSegment>,
  pub today_spin: Option<RouletteSpin>,
}

#[instrument(level = "debug", skip(conn), fields(%challenge_id, %user_id))]
pub fn view(conn: &Connection, challenge_id: i64, user_id: &str, now: NaiveDateTime) -> Result<RouletteView> {
  let settings = roulette::settings(conn, challenge_id)?.ok_or(ChallengeError::NotFound("roulette settings"))?;
  let today_spin = roulette::spin_on(conn, challenge_id, user_id, now.date())?;
  Ok(RouletteView { challenge_id, segments: settings.segments, today_spin })
}
