//! Application state: the store connection, injected clock and draw source, and the
//! optional remote point ledger.
//!
//! Each method takes the connection lock, reads the clock once, and runs one engine
//! operation. Remote ledger forwarding happens after the lock is released.

use std::sync::Arc;

use rusqlite::Connection;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::domain::{Participation, Stamp, User, Verification, VerificationPayload};
use crate::error::Result;
use crate::ledger::{self, RemoteLedger};
use crate::participation::{self, ClaimOutcome};
use crate::quiz::{self, AttemptOutcome, QuizView};
use crate::ranking::{self, Leaderboard};
use crate::roulette::{self, DrawSource, RouletteView, SpinOutcome, ThreadDraw};
use crate::store::{self, points};
use crate::verification::{self, RecordOutcome};

/// Points history entries returned by `points`.
const HISTORY_LIMIT: u32 = 50;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub clock: Arc<dyn Clock>,
    pub draw: Arc<dyn DrawSource>,
    pub ledger: Option<RemoteLedger>,
}

impl AppState {
    /// Build state from config: open the store, sync the catalog, init the ledger client.
    #[instrument(level = "info", skip_all)]
    pub fn new(cfg: &AppConfig) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::with_offset_minutes(cfg.clock.utc_offset_minutes));

        let mut conn = if cfg.database.path == ":memory:" {
            store::open_memory()?
        } else {
            store::open(std::path::Path::new(&cfg.database.path))?
        };
        catalog::sync(&mut conn, cfg, clock.today())?;

        let ledger = RemoteLedger::from_config(&cfg.point_ledger);
        if let Some(l) = &ledger {
            info!(target: "challenge_engine", base_url = %l.base_url, "Remote point ledger enabled.");
        } else {
            info!(target: "challenge_engine", "Remote point ledger disabled. Using the local ledger only.");
        }
        info!(
            target: "challenge_engine",
            db = %cfg.database.path,
            utc_offset_minutes = cfg.clock.utc_offset_minutes,
            "Store ready"
        );

        Ok(Self::from_parts(conn, clock, Arc::new(ThreadDraw), ledger))
    }

    pub fn from_parts(
        conn: Connection,
        clock: Arc<dyn Clock>,
        draw: Arc<dyn DrawSource>,
        ledger: Option<RemoteLedger>,
    ) -> Self {
        Self { db: Arc::new(Mutex::new(conn)), clock, draw, ledger }
    }

    pub async fn enroll(&self, challenge_id: i64, user: &User) -> Result<Participation> {
        let mut conn = self.db.lock().await;
        participation::enroll(&mut conn, challenge_id, user, self.clock.now())
    }

    pub async fn cancel(&self, challenge_id: i64, user_id: &str) -> Result<()> {
        let mut conn = self.db.lock().await;
        participation::cancel(&mut conn, challenge_id, user_id, self.clock.now())
    }

    pub async fn participation(&self, challenge_id: i64, user_id: &str) -> Result<Participation> {
        let conn = self.db.lock().await;
        participation::get(&conn, challenge_id, user_id, self.clock.now())
    }

    pub async fn record_verification(
        &self,
        challenge_id: i64,
        user_id: &str,
        slot: u32,
        payload: VerificationPayload,
    ) -> Result<RecordOutcome> {
        let mut conn = self.db.lock().await;
        verification::record(&mut conn, challenge_id, user_id, slot, payload, self.clock.now())
    }

    pub async fn verifications(
        &self,
        challenge_id: i64,
        user_id: &str,
        date: Option<chrono::NaiveDate>,
    ) -> Result<Vec<Verification>> {
        let conn = self.db.lock().await;
        verification::list(&conn, challenge_id, user_id, date)
    }

    pub async fn stamps(&self, challenge_id: i64, user_id: &str) -> Result<Vec<Stamp>> {
        let conn = self.db.lock().await;
        verification::list_stamps(&conn, challenge_id, user_id)
    }

    /// Returns the claim and whether any point credit is settled.
    pub async fn claim_reward(&self, challenge_id: i64, user_id: &str) -> Result<(ClaimOutcome, bool)> {
        let outcome = {
            let mut conn = self.db.lock().await;
            participation::claim_reward(&mut conn, challenge_id, user_id, self.clock.now())?
        };
        let settled = match &outcome.credit {
            Some(credit) => ledger::settle(self.ledger.as_ref(), credit).await,
            None => true,
        };
        Ok((outcome, settled))
    }

    pub async fn quiz(&self, challenge_id: i64, quiz_id: i64, user_id: &str) -> Result<QuizView> {
        let conn = self.db.lock().await;
        quiz::view(&conn, challenge_id, quiz_id, user_id, self.clock.now())
    }

    pub async fn attempt_quiz(
        &self,
        challenge_id: i64,
        quiz_id: i64,
        user_id: &str,
        selected: &Value,
        slot: u32,
    ) -> Result<AttemptOutcome> {
        let mut conn = self.db.lock().await;
        quiz::attempt(&mut conn, challenge_id, quiz_id, user_id, selected, slot, self.clock.now())
    }

    pub async fn roulette(&self, challenge_id: i64, user_id: &str) -> Result<RouletteView> {
        let conn = self.db.lock().await;
        roulette::view(&conn, challenge_id, user_id, self.clock.now())
    }

    /// Returns the spin and whether its point credit (if any) is settled.
    pub async fn spin(&self, challenge_id: i64, user_id: &str) -> Result<(SpinOutcome, bool)> {
        let outcome = {
            let mut conn = self.db.lock().await;
            roulette::spin(&mut conn, challenge_id, user_id, self.draw.as_ref(), self.clock.now())?
        };
        let settled = match &outcome.credit {
            Some(credit) => ledger::settle(self.ledger.as_ref(), credit).await,
            None => true,
        };
        Ok((outcome, settled))
    }

    pub async fn leaderboard(&self, challenge_id: i64, user_id: &str) -> Result<Leaderboard> {
        let conn = self.db.lock().await;
        ranking::leaderboard(&conn, challenge_id, user_id)
    }

    pub async fn points(&self, user_id: &str) -> Result<(i64, Vec<points::PointHistoryRow>)> {
        let conn = self.db.lock().await;
        let balance = points::balance(&conn, user_id)?;
        let history = points::history(&conn, user_id, HISTORY_LIMIT)?;
        Ok((balance, history))
    }
}
