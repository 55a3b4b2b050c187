//! Ranking Service: sorted, competition-ranked, masked and windowed leaderboards.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use tracing::instrument;

use crate::domain::RankingRow;
use crate::error::{ChallengeError, Result};
use crate::store::{challenges, rankings};
use crate::util::mask_display_name;

/// Up to this many participants, everyone is listed.
const SHOW_ALL_MAX: usize = 10;
/// From this many participants on, the requester sees their neighbourhood.
const NEIGHBOURHOOD_MIN: usize = 30;
const TOP_LIST: usize = 10;
const TOP_WITH_NEIGHBOURHOOD: usize = 5;
const NEIGHBOURS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
  pub rank: u32,
  pub display_name: String,
  pub achievement_rate: f64,
  pub completed_at: Option<NaiveDateTime>,
  pub is_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
  pub rankings: Vec<RankingEntry>,
  pub my_ranking: Option<RankingEntry>,
  pub total_participants: usize,
}

/// Rate descending, then earlier completion first with incomplete rows last.
/// User id breaks the remaining ties so the order is stable.
pub fn sort_rows(rows: &mut [RankingRow]) {
  rows.sort_by(|a, b| {
    b.achievement_rate
      .partial_cmp(&a.achievement_rate)
      .unwrap_or(Ordering::Equal)
      .then_with(|| match (a.completed_at, b.completed_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
      })
      .then_with(|| a.user_id.cmp(&b.user_id))
  });
}

/// Competition ranks over sorted rows: equal rates share a rank, and the next
/// distinct rate takes its 1-based position.
pub fn competition_ranks(sorted: &[RankingRow]) -> Vec<u32> {
  let mut ranks: Vec<u32> = Vec::with_capacity(sorted.len());
  for (i, row) in sorted.iter().enumerate() {
    let rank = match (i.checked_sub(1), ranks.last()) {
      (Some(prev), Some(&prev_rank)) if sorted[prev].achievement_rate == row.achievement_rate => prev_rank,
      _ => u32::try_from(i + 1).unwrap_or(u32::MAX),
    };
    ranks.push(rank);
  }
  ranks
}

/// Positions (0-based, ascending) to display for `total` rows given the requester's position.
pub fn visible_positions(total: usize, mine: Option<usize>) -> Vec<usize> {
  if total <= SHOW_ALL_MAX {
    return (0..total).collect();
  }
  match mine {
    Some(me) if total >= NEIGHBOURHOOD_MIN => {
      let lo = me.saturating_sub(NEIGHBOURS);
      let hi = (me + NEIGHBOURS).min(total - 1);
      let set: BTreeSet<usize> = (0..TOP_WITH_NEIGHBOURHOOD).chain(lo..=hi).collect();
      set.into_iter().collect()
    }
    _ => (0..TOP_LIST.min(total)).collect(),
  }
}

#[instrument(level = "debug", skip(conn), fields(%challenge_id, %user_id))]
pub fn leaderboard(conn: &Connection, challenge_id: i64, user_id: &str) -> Result<Leaderboard> {
  challenges::get(conn, challenge_id)?.ok_or(ChallengeError::NotFound("challenge"))?;
  let mut rows = rankings::list(conn, challenge_id)?;
  sort_rows(&mut rows);
  let ranks = competition_ranks(&rows);

  let entries: Vec<RankingEntry> = rows
    .iter()
    .zip(&ranks)
    .map(|(row, &rank)| RankingEntry {
      rank,
      display_name: mask_display_name(&row.display_name),
      achievement_rate: row.achievement_rate,
      completed_at: row.completed_at,
      is_me: row.user_id == user_id,
    })
    .collect();

  let mine = entries.iter().position(|e| e.is_me);
  let rankings = visible_positions(entries.len(), mine).into_iter().map(|i| entries[i].clone()).collect();

  Ok(Leaderboard {
    rankings,
    my_ranking: mine.map(|i| entries[i].clone()),
    total_participants: entries.len(),
  })
}
