//! Service configuration.
//!
//! Loaded from a TOML file (default `aquaguard.toml`), then overridden by
//! environment variables, which may come from a `.env` file. Every field has
//! a default, so a missing file is not an error.
//!
//! ```toml
//! [collaborator]
//! base_url = "http://127.0.0.1:8000"
//!
//! [live]
//! interval_secs = 10
//! history_capacity = 20
//!
//! [ranking]
//! interval_secs = 30
//! ```

use crate::history::{DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY, MIN_HISTORY_CAPACITY};
use crate::ingest::collaborator::DEFAULT_BASE_URL;
use crate::model::{MonitorError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "aquaguard.toml";

pub const ENV_BASE_URL: &str = "AQUAGUARD_BASE_URL";
pub const ENV_LIVE_INTERVAL: &str = "AQUAGUARD_LIVE_INTERVAL_SECS";
pub const ENV_RANKING_INTERVAL: &str = "AQUAGUARD_RANKING_INTERVAL_SECS";
pub const ENV_LOG_DIR: &str = "AQUAGUARD_LOG_DIR";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub collaborator: CollaboratorConfig,
    pub live: LiveConfig,
    pub ranking: RankingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CollaboratorConfig {
    pub base_url: String,
    /// Per-request timeout. Unset leaves the HTTP client's default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl CollaboratorConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Live-monitoring view settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    pub interval_secs: u64,
    /// Snapshots kept per region for charting.
    pub history_capacity: usize,
    /// Age after which a region's newest snapshot is flagged stale.
    pub stale_after_secs: u64,
    /// Points per chart series (taken from the end of the history).
    pub chart_points: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            stale_after_secs: 60,
            chart_points: 15,
        }
    }
}

impl LiveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Ranking-summary view settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub interval_secs: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl RankingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for the rolling log file; console only when unset.
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,aquaguard_monitor=debug".to_string(),
            directory: None,
        }
    }
}

impl MonitorConfig {
    /// Loads `path` if it exists (defaults otherwise), applies `.env` and
    /// process environment overrides, and validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_toml_str(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies environment overrides through `lookup`, so tests don't have
    /// to touch the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.collaborator.base_url = url;
        }
        if let Some(raw) = lookup(ENV_LIVE_INTERVAL) {
            self.live.interval_secs = parse_secs(ENV_LIVE_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RANKING_INTERVAL) {
            self.ranking.interval_secs = parse_secs(ENV_RANKING_INTERVAL, &raw)?;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.logging.directory = Some(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.collaborator.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MonitorError::Config(format!(
                "collaborator.base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.live.interval_secs == 0 || self.ranking.interval_secs == 0 {
            return Err(MonitorError::Config("poll intervals must be at least 1 second".to_string()));
        }
        if !(MIN_HISTORY_CAPACITY..=MAX_HISTORY_CAPACITY).contains(&self.live.history_capacity) {
            return Err(MonitorError::Config(format!(
                "live.history_capacity must be between {} and {}, got {}",
                MIN_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY, self.live.history_capacity
            )));
        }
        if self.live.chart_points == 0 {
            return Err(MonitorError::Config("live.chart_points must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_secs(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| MonitorError::Config(format!("{} must be a whole number of seconds, got '{}'", key, raw)))
}
