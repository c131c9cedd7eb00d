//! Engine configuration loading, including the seeded game rules.

use std::collections::HashMap;
use std::time::Duration as StdDuration;
use std::{env, fs, io::ErrorKind, path::PathBuf};

use chrono::Duration;
use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::models::GameRule;

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GOLDEN_TICKET_CONFIG_PATH";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_DATABASE_PATH: &str = "golden_ticket.db";
const DEFAULT_CUTOFF_LEAD_MINUTES: i64 = 60;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 3_600;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Immutable runtime configuration shared across the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the backend API.
    pub api_base_url: String,
    /// Path of the local SQLite database file.
    pub database_path: String,
    cutoff_lead_minutes: i64,
    poll_interval_secs: u64,
    request_timeout_secs: u64,
    games: Vec<GameRule>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        games = config.games.len(),
                        "loaded engine configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// How far ahead of the draw instant editing closes.
    pub fn cutoff_lead(&self) -> Duration {
        Duration::minutes(self.cutoff_lead_minutes)
    }

    /// Interval between result poll cycles.
    pub fn poll_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.poll_interval_secs)
    }

    /// Per-request deadline for remote calls.
    pub fn request_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.request_timeout_secs)
    }

    /// Game rules to seed the local store with at startup.
    pub fn games(&self) -> &[GameRule] {
        &self.games
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            database_path: DEFAULT_DATABASE_PATH.into(),
            cutoff_lead_minutes: DEFAULT_CUTOFF_LEAD_MINUTES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            games: default_game_rules(),
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    api_base_url: Option<String>,
    database_path: Option<String>,
    cutoff_lead_minutes: Option<i64>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    games: Option<Vec<GameRule>>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: raw.api_base_url.unwrap_or(defaults.api_base_url),
            database_path: raw.database_path.unwrap_or(defaults.database_path),
            cutoff_lead_minutes: raw.cutoff_lead_minutes.unwrap_or(defaults.cutoff_lead_minutes),
            poll_interval_secs: raw.poll_interval_secs.unwrap_or(defaults.poll_interval_secs),
            request_timeout_secs: raw
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            games: raw.games.unwrap_or(defaults.games),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in game rules shipped with the binary.
fn default_game_rules() -> Vec<GameRule> {
    vec![GameRule {
        game: "golden-7".into(),
        pool_size: 49,
        regular_count: 6,
        bonus_pool_size: 49,
        bonus_count: 1,
        schedule: "Wed 20:30 America/Edmonton,Sat 20:30 America/Edmonton".into(),
        tier_format: "matched of 6".into(),
        odds: HashMap::from([
            ("6 of 6".into(), "1 in 13,983,816".into()),
            ("5 of 6 + bonus".into(), "1 in 2,330,636".into()),
            ("5 of 6".into(), "1 in 55,492".into()),
            ("4 of 6".into(), "1 in 1,033".into()),
            ("3 of 6".into(), "1 in 57".into()),
        ]),
    }]
}
