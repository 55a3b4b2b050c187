//! Challenge participation & verification engine.
//!
//! - Axum HTTP API over a SQLite store
//! - Enrollment, verification recording, stamps, quizzes, roulette, leaderboards
//! - Optional remote point ledger (local ledger always kept)
//!
//! Important env variables:
//!   CHALLENGE_CONFIG_PATH : path to TOML config (server, database, clock, ledger, catalog)
//!   PORT                  : u16 (default 8080)
//!   DATABASE_PATH         : SQLite file, or ":memory:"
//!   POINT_LEDGER_URL      : enables remote point ledger forwarding
//!   POINT_LEDGER_API_KEY  : bearer token for the remote ledger
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod catalog;
mod clock;
mod config;
mod domain;
mod error;
mod ledger;
mod participation;
mod protocol;
mod quiz;
mod ranking;
mod roulette;
mod routes;
mod seeds;
mod state;
mod store;
mod telemetry;
mod util;
mod verification;

#[cfg(test)]
mod testkit;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let cfg = config::load_from_env();

  // Open the store, sync the catalog, build the optional ledger client.
  let state = Arc::new(AppState::new(&cfg)?);

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "challenge_engine", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "challenge_engine", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "challenge_engine", error = %e, "Failed to listen for Ctrl-C");
    std::future::pending::<()>().await;
  }
  info!(target: "challenge_engine", "Shutdown signal received");
}
