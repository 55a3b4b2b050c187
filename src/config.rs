//! Service configuration and the challenge catalog, loaded from TOML.
//!
//! `CHALLENGE_CONFIG_PATH` names the file; every section is optional. A few env vars
//! (`PORT`, `DATABASE_PATH`, `POINT_LEDGER_URL`, `POINT_LEDGER_API_KEY`) override it.
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [clock]
//! utc_offset_minutes = 540
//!
//! [[challenges]]
//! id = 1
//! challenge_type = "supplement"
//! verification_method = "manual"
//! recruitment_start = "2026-10-01"
//! ...
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Challenge, Quiz, RouletteSettings};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub database: DatabaseConfig,
  #[serde(default)]
  pub clock: ClockConfig,
  #[serde(default)]
  pub point_ledger: PointLedgerConfig,
  #[serde(default)]
  pub challenges: Vec<Challenge>,
  #[serde(default)]
  pub quizzes: Vec<Quiz>,
  #[serde(default)]
  pub roulette: Vec<RouletteSettings>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self { port: default_port() }
  }
}

fn default_port() -> u16 {
  8080
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
  /// SQLite file; `:memory:` keeps everything in process.
  #[serde(default = "default_db_path")]
  pub path: String,
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self { path: default_db_path() }
  }
}

fn default_db_path() -> String {
  "challenge.db".into()
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClockConfig {
  /// "Today" is evaluated in this fixed offset.
  #[serde(default = "default_offset")]
  pub utc_offset_minutes: i32,
}

impl Default for ClockConfig {
  fn default() -> Self {
    Self { utc_offset_minutes: default_offset() }
  }
}

fn default_offset() -> i32 {
  540
}

/// Remote point ledger. Without a `base_url`, credits stay in the local ledger only.
#[derive(Clone, Debug, Deserialize)]
pub struct PointLedgerConfig {
  #[serde(default)]
  pub base_url: Option<String>,
  #[serde(default)]
  pub api_key: Option<String>,
  #[serde(default = "default_ledger_timeout")]
  pub timeout_secs: u64,
}

impl Default for PointLedgerConfig {
  fn default() -> Self {
    Self { base_url: None, api_key: None, timeout_secs: default_ledger_timeout() }
  }
}

fn default_ledger_timeout() -> u64 {
  5
}

impl AppConfig {
  pub fn has_catalog(&self) -> bool {
    !self.challenges.is_empty()
  }

  /// Apply env overrides on top of whatever the file said.
  pub fn with_env_overrides(mut self) -> Self {
    self.apply_overrides(|key| std::env::var(key).ok());
    self
  }

  fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
      self.server.port = port;
    }
    if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
      self.database.path = path;
    }
    if let Some(url) = lookup("POINT_LEDGER_URL").filter(|u| !u.trim().is_empty()) {
      self.point_ledger.base_url = Some(url);
    }
    if let Some(key) = lookup("POINT_LEDGER_API_KEY").filter(|k| !k.trim().is_empty()) {
      self.point_ledger.api_key = Some(key);
    }
  }
}

pub fn parse(text: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str(text)
}

/// Load from CHALLENGE_CONFIG_PATH, then apply env overrides. A missing variable, an
/// unreadable file or a parse error all fall back to defaults (logged).
pub fn load_from_env() -> AppConfig {
  let file = match std::env::var("CHALLENGE_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse(&s) {
        Ok(cfg) => {
          info!(target: "challenge_engine", %path, challenges = cfg.challenges.len(), "Loaded config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "challenge_engine", %path, error = %e, "Failed to parse TOML config; using defaults");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "challenge_engine", %path, error = %e, "Failed to read TOML config file; using defaults");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };
  file.with_env_overrides()
}
