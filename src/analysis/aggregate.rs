//! System-wide statistics derived from one cycle's data.
//!
//! Nothing here is stored between cycles: an `AggregateView` is a pure
//! function of the latest snapshot list and is recomputed whenever a cycle
//! succeeds. The live view buckets with the 70/50/30 thresholds; the ranking
//! summary uses the historical 70/40/0 thresholds on peak risk.

use crate::alert::thresholds::{LiveRiskBucket, classify_historical, classify_live};
use crate::model::{ElevatedRiskEvent, RegionRanking, RegionSnapshot, RiskLevel, RiskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// Live-view headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateView {
    pub region_count: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub elevated_risk: usize,
    pub normal_risk: usize,
    /// Liters per day across all regions.
    pub total_consumption: f64,
    /// 0 when there are no regions.
    pub mean_risk_score: f64,
    pub status_normal: usize,
    pub status_elevated: usize,
    pub status_new_elevation: usize,
    pub active_elevations: usize,
    pub computed_at: Option<DateTime<Utc>>,
}

impl AggregateView {
    pub fn compute(current: &[RegionSnapshot], elevated: &[ElevatedRiskEvent], now: DateTime<Utc>) -> Self {
        let mut view = AggregateView {
            region_count: current.len(),
            active_elevations: elevated.len(),
            computed_at: Some(now),
            ..Default::default()
        };

        let mut risk_sum = 0.0;
        for snapshot in current {
            match classify_live(snapshot.risk_score) {
                LiveRiskBucket::High => view.high_risk += 1,
                LiveRiskBucket::Medium => view.medium_risk += 1,
                LiveRiskBucket::Elevated => view.elevated_risk += 1,
                LiveRiskBucket::Normal => view.normal_risk += 1,
            }
            match snapshot.risk_status {
                RiskStatus::Normal => view.status_normal += 1,
                RiskStatus::Elevated => view.status_elevated += 1,
                RiskStatus::NewElevation => view.status_new_elevation += 1,
            }
            view.total_consumption += snapshot.consumption;
            risk_sum += snapshot.risk_score;
        }
        view.mean_risk_score = mean(risk_sum, current.len());
        view
    }

    pub fn count(&self, bucket: LiveRiskBucket) -> usize {
        match bucket {
            LiveRiskBucket::High => self.high_risk,
            LiveRiskBucket::Medium => self.medium_risk,
            LiveRiskBucket::Elevated => self.elevated_risk,
            LiveRiskBucket::Normal => self.normal_risk,
        }
    }
}

/// Inspection-priority ranking with historical-threshold counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingSummary {
    /// Sorted by inspection priority, ties by descending priority score.
    pub rows: Vec<RegionRanking>,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// 0 when the ranking is empty.
    pub mean_current_risk: f64,
    pub computed_at: Option<DateTime<Utc>>,
}

impl RankingSummary {
    pub fn compute(mut rows: Vec<RegionRanking>, now: DateTime<Utc>) -> Self {
        rows.sort_by(|a, b| {
            a.inspection_priority.cmp(&b.inspection_priority).then_with(|| {
                b.priority_score
                    .partial_cmp(&a.priority_score)
                    .unwrap_or(Ordering::Equal)
            })
        });

        let mut summary = RankingSummary {
            computed_at: Some(now),
            ..Default::default()
        };
        let mut risk_sum = 0.0;
        for row in &rows {
            match classify_historical(row.recent_peak_risk) {
                RiskLevel::High => summary.high += 1,
                RiskLevel::Medium => summary.medium += 1,
                RiskLevel::Low => summary.low += 1,
            }
            risk_sum += row.current_risk;
        }
        summary.mean_current_risk = mean(risk_sum, rows.len());
        summary.rows = rows;
        summary
    }

    /// The `n` regions to inspect first.
    pub fn top(&self, n: usize) -> &[RegionRanking] {
        &self.rows[..n.min(self.rows.len())]
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { sum / count as f64 }
}
