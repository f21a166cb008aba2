//! Single-shot dashboard views.
//!
//! Unlike the live monitor these are fetched once per request: no scheduler,
//! no history buffer, no retained state. Risk levels here always use the
//! historical 70/40/0 thresholds.

use crate::alert::thresholds::classify_historical;
use crate::analysis::reconcile::{MIN_BAR_HEIGHT_PCT, bar_height_pct};
use crate::ingest::collaborator::Collaborator;
use crate::model::{Result, RiskAnalysis, RiskLevel, TimeSeriesPoint};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Daily points shown on a region dashboard.
pub const RECENT_DAYS: usize = 30;

/// More anomalies than this in 30 days suggests a systematic issue.
pub const PATTERN_ANOMALY_THRESHOLD: u32 = 3;

// ============================================================================
// Region listing
// ============================================================================

/// Regions known to the collaborator, in the order it returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionListing {
    pub regions: Vec<String>,
}

impl RegionListing {
    /// `GET /regions`. An empty list yields an empty listing, not an error.
    pub async fn load(collaborator: &Collaborator) -> Result<Self> {
        let regions = collaborator.fetch_regions().await?;
        debug!(count = regions.len(), "region listing loaded");
        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// ============================================================================
// Region dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyDay {
    pub date: DateTime<Utc>,
    pub actual_usage: f64,
    pub predicted_usage: f64,
    /// `(actual - predicted) / predicted * 100`; 0 when nothing was predicted.
    pub deviation_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBar {
    pub date: DateTime<Utc>,
    pub usage_height_pct: f64,
    pub risk_height_pct: f64,
    pub residual: f64,
    pub is_anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    ImmediateInspection,
    EnhancedMonitoring,
    PatternAnalysis,
    RoutineMonitoring,
}

impl Recommendation {
    pub fn title(&self) -> &'static str {
        match self {
            Recommendation::ImmediateInspection => "Immediate Inspection Required",
            Recommendation::EnhancedMonitoring => "Enhanced Monitoring",
            Recommendation::PatternAnalysis => "Pattern Analysis",
            Recommendation::RoutineMonitoring => "Normal Operation",
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            Recommendation::ImmediateInspection => {
                "High risk score detected. Schedule a field inspection to identify potential issues."
            }
            Recommendation::EnhancedMonitoring => {
                "Medium risk detected. Increase monitoring frequency and prepare for potential inspection."
            }
            Recommendation::PatternAnalysis => {
                "Multiple anomalies detected. Analyze consumption patterns for systematic issues."
            }
            Recommendation::RoutineMonitoring => {
                "Consumption patterns are within normal ranges. Continue routine monitoring."
            }
        }
    }
}

/// Recommendations for a region's current score and recent anomaly count.
pub fn recommendations(current_risk: f64, recent_anomalies: u32) -> Vec<Recommendation> {
    let mut out = Vec::new();
    match classify_historical(current_risk) {
        RiskLevel::High => out.push(Recommendation::ImmediateInspection),
        RiskLevel::Medium => out.push(Recommendation::EnhancedMonitoring),
        RiskLevel::Low => {}
    }
    if recent_anomalies > PATTERN_ANOMALY_THRESHOLD {
        out.push(Recommendation::PatternAnalysis);
    }
    if classify_historical(current_risk) == RiskLevel::Low && recent_anomalies <= 1 {
        out.push(Recommendation::RoutineMonitoring);
    }
    out
}

/// One region's historical dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionDashboard {
    pub region: String,
    pub analysis: RiskAnalysis,
    pub risk_level: RiskLevel,
    /// The last `RECENT_DAYS` days, oldest first.
    pub recent: Vec<TimeSeriesPoint>,
    pub bars: Vec<DayBar>,
    pub anomalies: Vec<AnomalyDay>,
    pub recommendations: Vec<Recommendation>,
}

impl RegionDashboard {
    /// Fetches `/timeseries/{region}` and `/risk/{region}` together; both
    /// must succeed.
    pub async fn load(collaborator: &Collaborator, region: &str) -> Result<Self> {
        let (series, analysis) = tokio::join!(
            collaborator.fetch_timeseries(region),
            collaborator.fetch_risk(region),
        );
        Ok(Self::build(region, series?, analysis?))
    }

    pub fn build(region: &str, series: Vec<TimeSeriesPoint>, analysis: RiskAnalysis) -> Self {
        let skip = series.len().saturating_sub(RECENT_DAYS);
        let recent: Vec<TimeSeriesPoint> = series.into_iter().skip(skip).collect();

        let max_usage = recent.iter().map(|p| p.actual_usage).fold(0.0, f64::max);
        let bars = recent
            .iter()
            .map(|p| DayBar {
                date: p.date,
                usage_height_pct: bar_height_pct(p.actual_usage, max_usage),
                risk_height_pct: p.risk_score.clamp(MIN_BAR_HEIGHT_PCT, 100.0),
                residual: p.actual_usage - p.predicted_usage,
                is_anomaly: p.is_anomaly,
            })
            .collect();

        let anomalies = recent
            .iter()
            .filter(|p| p.is_anomaly)
            .map(|p| AnomalyDay {
                date: p.date,
                actual_usage: p.actual_usage,
                predicted_usage: p.predicted_usage,
                deviation_pct: deviation_pct(p.actual_usage, p.predicted_usage),
            })
            .collect();

        Self {
            region: region.to_string(),
            risk_level: classify_historical(analysis.current_risk_score),
            recommendations: recommendations(analysis.current_risk_score, analysis.recent_anomalies_30d),
            analysis,
            recent,
            bars,
            anomalies,
        }
    }
}

fn deviation_pct(actual: f64, predicted: f64) -> f64 {
    if predicted == 0.0 {
        0.0
    } else {
        (actual - predicted) / predicted * 100.0
    }
}
