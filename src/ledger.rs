//! Point ledger.
//!
//! Credits always land in the local ledger (`point_balances` + `point_history`) inside the
//! caller's transaction, keyed by an idempotency key. When a remote ledger is configured the
//! committed credit is forwarded afterwards with the same key, so a client retry never
//! double-credits on either side.
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::config::PointLedgerConfig;
use crate::error::{ChallengeError, Result};
use crate::store::points;
use crate::util::trunc_for_log;

/// A single credit. `idempotency_key` is derived from the row that earned it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointCredit {
  pub user_id: String,
  pub amount: i64,
  pub reason: String,
  #[serde(skip)]
  pub idempotency_key: String,
}

impl PointCredit {
  pub fn roulette(user_id: &str, spin_id: i64, amount: i64, label: &str) -> Self {
    Self {
      user_id: user_id.to_string(),
      amount,
      reason: format!("roulette: {label}"),
      idempotency_key: format!("roulette-spin:{spin_id}"),
    }
  }

  pub fn challenge_reward(user_id: &str, participation_id: i64, amount: i64, challenge_title: &str) -> Self {
    Self {
      user_id: user_id.to_string(),
      amount,
      reason: format!("challenge reward: {challenge_title}"),
      idempotency_key: format!("challenge-reward:{participation_id}"),
    }
  }
}

/// Write the credit to the local ledger. Returns false if the key was already used.
pub fn credit_local(conn: &Connection, credit: &PointCredit, now: NaiveDateTime) -> Result<bool> {
  let fresh = points::credit(conn, &credit.user_id, credit.amount, &credit.reason, &credit.idempotency_key, now)?;
  if fresh {
    info!(target: "challenge", user_id = %credit.user_id, amount = credit.amount, key = %credit.idempotency_key, "Points credited");
  }
  Ok(fresh)
}

#[derive(Clone)]
pub struct RemoteLedger {
  pub client: reqwest::Client,
  pub base_url: String,
  api_key: Option<String>,
}

impl RemoteLedger {
  /// Construct the client if a base URL is configured; otherwise return None.
  pub fn from_config(cfg: &PointLedgerConfig) -> Option<Self> {
    let base_url = cfg.base_url.as_deref()?.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
      return None;
    }
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
      .build()
      .map_err(|e| error!(target: "challenge_engine", error = %e, "Failed to build point ledger client"))
      .ok()?;
    Some(Self { client, base_url, api_key: cfg.api_key.clone() })
  }

  fn credit_url(&self) -> String {
    format!("{}/points/credit", self.base_url)
  }

  /// Forward a committed credit. The remote side deduplicates on `Idempotency-Key`.
  #[instrument(level = "info", skip(self, credit), fields(user_id = %credit.user_id, amount = credit.amount, key = %credit.idempotency_key))]
  pub async fn forward(&self, credit: &PointCredit) -> Result<()> {
    let start = std::time::Instant::now();
    let mut req = self
      .client
      .post(self.credit_url())
      .header(USER_AGENT, "challenge-engine/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("Idempotency-Key", &credit.idempotency_key);
    if let Some(key) = &self.api_key {
      req = req.header(AUTHORIZATION, format!("Bearer {key}"));
    }

    let res = req.json(credit).send().await.map_err(|e| ChallengeError::Ledger(e.to_string()))?;
    let elapsed = start.elapsed();
    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      error!(target: "challenge", ?elapsed, %status, body = %trunc_for_log(&body, 200), "Point ledger rejected credit");
      return Err(ChallengeError::Ledger(format!("ledger HTTP {status}")));
    }
    info!(target: "challenge", ?elapsed, "Point credit forwarded");
    Ok(())
  }
}

/// Forward if a remote ledger is configured. Returns whether the credit is settled:
/// always true locally, and true remotely only if the call succeeded.
pub async fn settle(remote: Option<&RemoteLedger>, credit: &PointCredit) -> bool {
  match remote {
    None => true,
    Some(ledger) => match ledger.forward(credit).await {
      Ok(()) => true,
      Err(e) => {
        error!(target: "challenge", error = %e, key = %credit.idempotency_key, "Point credit not forwarded; local history keeps it");
        false
      }
    },
  }
}
