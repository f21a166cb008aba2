//! Risk-score bucket thresholds.
//!
//! Two threshold schemes are in use and they are deliberately kept apart:
//! the live view buckets scores at 70/50/30, the historical dashboard and
//! ranking summary at 70/40/0. Both are named constants; nothing in this
//! crate maps one onto the other.
//!
//! Every classifier is a total function: scores outside [0, 100] (or NaN)
//! fall through to the lowest bucket. Bucket boundaries are closed at the
//! bottom, open at the top (70.0 is High under both schemes).

use crate::model::RiskLevel;
use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Live view (70 / 50 / 30)
// ---------------------------------------------------------------------------

/// Lower bounds of the live-view risk buckets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveThresholds {
    pub high: f64,
    pub medium: f64,
    pub elevated: f64,
}

pub const LIVE_VIEW_THRESHOLDS: LiveThresholds = LiveThresholds {
    high: 70.0,
    medium: 50.0,
    elevated: 30.0,
};

/// Live-view risk buckets, in ascending order of risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LiveRiskBucket {
    Normal,
    Elevated,
    Medium,
    High,
}

impl LiveRiskBucket {
    /// Operator-facing label shown next to a live score.
    pub fn label(&self) -> &'static str {
        match self {
            LiveRiskBucket::High => "High Risk",
            LiveRiskBucket::Medium => "Medium Risk",
            LiveRiskBucket::Elevated => "Elevated",
            LiveRiskBucket::Normal => "Normal",
        }
    }
}

impl fmt::Display for LiveRiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl LiveThresholds {
    pub fn classify(&self, score: f64) -> LiveRiskBucket {
        if score >= self.high {
            LiveRiskBucket::High
        } else if score >= self.medium {
            LiveRiskBucket::Medium
        } else if score >= self.elevated {
            LiveRiskBucket::Elevated
        } else {
            LiveRiskBucket::Normal
        }
    }
}

/// Classifies a live risk score with `LIVE_VIEW_THRESHOLDS`.
pub fn classify_live(score: f64) -> LiveRiskBucket {
    LIVE_VIEW_THRESHOLDS.classify(score)
}

// ---------------------------------------------------------------------------
// Historical dashboard (70 / 40 / 0)
// ---------------------------------------------------------------------------

/// Lower bounds of the historical-dashboard risk levels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoricalThresholds {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

pub const HISTORICAL_DASHBOARD_THRESHOLDS: HistoricalThresholds = HistoricalThresholds {
    high: 70.0,
    medium: 40.0,
    low: 0.0,
};

impl HistoricalThresholds {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            // Everything under `medium`, including scores below `low`.
            RiskLevel::Low
        }
    }
}

/// Classifies a dashboard or ranking risk score with
/// `HISTORICAL_DASHBOARD_THRESHOLDS`.
pub fn classify_historical(score: f64) -> RiskLevel {
    HISTORICAL_DASHBOARD_THRESHOLDS.classify(score)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
