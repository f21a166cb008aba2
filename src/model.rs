//! Core data types for the AquaGuard live-monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the per-region records delivered by the analytics collaborator, the
//! endpoint identifiers used to tag fetches, and the error taxonomy.
//! Wire formats live in `ingest::payloads`; everything here is already
//! validated and defaulted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Risk enumerations
// ---------------------------------------------------------------------------

/// Live risk status reported by the collaborator for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Normal,
    Elevated,
    /// An elevation that began during the most recent collaborator cycle.
    NewElevation,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskStatus::Normal => write!(f, "normal"),
            RiskStatus::Elevated => write!(f, "elevated"),
            RiskStatus::NewElevation => write!(f, "new_elevation"),
        }
    }
}

/// Severity of an elevated-risk event, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
        }
    }
}

/// Ranking risk level. Also the bucket set of the historical-dashboard
/// thresholds (see `alert::thresholds`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Direction of a region's risk over the last two weeks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTrend {
    Increasing,
    Decreasing,
    Unknown,
}

// ---------------------------------------------------------------------------
// Live records
// ---------------------------------------------------------------------------

/// Descriptive detail attached to a region that is in an elevated period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskInfo {
    pub pattern_type: Option<String>,
    pub severity: Option<Severity>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_hours: Option<f64>,
    pub pattern: Option<String>,
}

/// One live reading for a region, as produced by `GET /live/current`.
///
/// Immutable once received; the history buffer and views hold clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSnapshot {
    pub region: String,
    pub timestamp: DateTime<Utc>,
    /// Liters per day, never negative.
    pub consumption: f64,
    /// Clamped to [0, 100] at the parse boundary.
    pub risk_score: f64,
    pub risk_status: RiskStatus,
    pub risk_info: Option<RiskInfo>,
}

/// A region's row in an inspection-priority ranking.
///
/// Polled independently of `RegionSnapshot`, so the two may briefly
/// disagree about the same region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionRanking {
    pub region: String,
    pub current_risk: f64,
    pub recent_peak_risk: f64,
    pub risk_level: RiskLevel,
    pub persistence_days: u32,
    pub priority_score: f64,
    /// 1 = inspect first.
    pub inspection_priority: u32,
    pub risk_status: Option<RiskStatus>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// An active, time-bounded period of abnormal consumption.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevatedRiskEvent {
    pub region: String,
    pub pattern_type: String,
    pub start_time: DateTime<Utc>,
    pub estimated_end: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub pattern: String,
}

// ---------------------------------------------------------------------------
// Historical-dashboard records
// ---------------------------------------------------------------------------

/// One day of `GET /timeseries/{region}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: DateTime<Utc>,
    pub actual_usage: f64,
    pub predicted_usage: f64,
    pub risk_score: f64,
    pub is_anomaly: bool,
}

/// Single-region risk analysis from `GET /risk/{region}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAnalysis {
    pub region: String,
    pub current_risk_score: f64,
    pub recent_peak_risk: f64,
    pub average_risk_7d: f64,
    pub recent_anomalies_30d: u32,
    pub risk_trend: RiskTrend,
    pub last_updated: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Collaborator endpoints
// ---------------------------------------------------------------------------

/// Every read the service performs against the analytics collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    LiveCurrent,
    LiveRanking,
    LiveElevated,
    /// Historical-dashboard ranking (`/ranking`), polled at the summary cadence.
    Ranking,
    Risk(String),
    TimeSeries(String),
    Regions,
}

impl Endpoint {
    /// Request path relative to the collaborator base URL.
    pub fn path(&self) -> String {
        match self {
            Endpoint::LiveCurrent => "/live/current".to_string(),
            Endpoint::LiveRanking => "/live/ranking".to_string(),
            Endpoint::LiveElevated => "/live/elevated".to_string(),
            Endpoint::Ranking => "/ranking".to_string(),
            Endpoint::Risk(region) => format!("/risk/{}", urlencoding::encode(region)),
            Endpoint::TimeSeries(region) => format!("/timeseries/{}", urlencoding::encode(region)),
            Endpoint::Regions => "/regions".to_string(),
        }
    }

    /// The region a per-region endpoint is scoped to.
    pub fn region(&self) -> Option<&str> {
        match self {
            Endpoint::Risk(region) | Endpoint::TimeSeries(region) => Some(region),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::LiveCurrent => write!(f, "current"),
            Endpoint::LiveRanking => write!(f, "ranking"),
            Endpoint::LiveElevated => write!(f, "elevated"),
            Endpoint::Ranking => write!(f, "summary-ranking"),
            Endpoint::Risk(region) => write!(f, "risk[{}]", region),
            Endpoint::TimeSeries(region) => write!(f, "timeseries[{}]", region),
            Endpoint::Regions => write!(f, "regions"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single collaborator call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// Non-2xx HTTP response.
    Status(u16),
    /// Connection, DNS, or body-read failure.
    Transport(String),
    /// The body was not the expected JSON shape.
    Malformed(String),
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Status(code) => write!(f, "HTTP error: {}", code),
            FetchCause::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchCause::Malformed(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

/// One failed call within a poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub endpoint: Endpoint,
    pub cause: FetchCause,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.cause)
    }
}

/// Errors produced by the monitoring service.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A single collaborator call failed.
    #[error("fetch failed for {endpoint}: {cause}")]
    FetchFailed { endpoint: Endpoint, cause: FetchCause },

    /// One or more of a cycle's concurrent reads failed; the cycle is void.
    #[error("poll cycle failed ({})", describe_failures(.failures))]
    CycleFailed { failures: Vec<FetchFailure> },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    /// The individual failed calls behind this error, if it came from I/O
    /// against the collaborator.
    pub fn fetch_failures(&self) -> Vec<FetchFailure> {
        match self {
            MonitorError::FetchFailed { endpoint, cause } => vec![FetchFailure {
                endpoint: endpoint.clone(),
                cause: cause.clone(),
            }],
            MonitorError::CycleFailed { failures } => failures.clone(),
            _ => Vec::new(),
        }
    }
}

impl From<FetchFailure> for MonitorError {
    fn from(failure: FetchFailure) -> Self {
        MonitorError::FetchFailed {
            endpoint: failure.endpoint,
            cause: failure.cause,
        }
    }
}

fn describe_failures(failures: &[FetchFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for MonitorError
pub type Result<T> = std::result::Result<T, MonitorError>;
