//! Merges one live fetch into a per-region view and feeds the history buffer.
//!
//! Records are joined on the exact, case-sensitive region identifier:
//!
//! - a region in `/live/current` gets a `RegionView` with its snapshot, plus
//!   its ranking row and elevated events when those exist;
//! - a region only in the ranking list still gets a `RegionView`, with no
//!   live reading attached;
//! - a region only in the elevated list appears in `elevated_only` and
//!   nowhere else.
//!
//! Mismatches between the sources are expected (they are polled
//! independently) and are recorded as `MergeNote`s, never as errors.

use crate::alert::thresholds::{LiveRiskBucket, classify_live};
use crate::history::HistoryBuffer;
use crate::ingest::collaborator::LiveFetch;
use crate::model::{ElevatedRiskEvent, RegionRanking, RegionSnapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Denominator floor for chart scaling.
pub const SCALE_EPSILON: f64 = 1e-9;

/// Minimum rendered height of a chart bar, in percent of the track.
pub const MIN_BAR_HEIGHT_PCT: f64 = 5.0;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A non-fatal disagreement between the three live sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MergeNote {
    /// Region has a live reading but no ranking row this cycle.
    MissingRanking(String),
    /// Region is ranked but had no live reading this cycle.
    MissingLiveReading(String),
    /// Region only appears in the elevated-risk list.
    ElevatedOnly(String),
    /// Region appeared more than once in `/live/current`; the last entry won.
    DuplicateSnapshot(String),
}

/// Axis maxima for a region's charts. Only used for scaling; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartScale {
    pub max_consumption: f64,
    pub max_risk: f64,
}

impl ChartScale {
    /// Maxima over `history` and the just-arrived `latest` snapshot.
    pub fn over<'a>(history: impl IntoIterator<Item = &'a RegionSnapshot>, latest: &RegionSnapshot) -> Self {
        history.into_iter().fold(
            ChartScale {
                max_consumption: latest.consumption,
                max_risk: latest.risk_score,
            },
            |scale, s| ChartScale {
                max_consumption: scale.max_consumption.max(s.consumption),
                max_risk: scale.max_risk.max(s.risk_score),
            },
        )
    }
}

/// Bar height for `value` on a track scaled to `max`, in percent.
///
/// The denominator is floored at `SCALE_EPSILON` so an all-zero series never
/// divides by zero, and the result is floored at `MIN_BAR_HEIGHT_PCT` so
/// zero-valued points stay visible.
pub fn bar_height_pct(value: f64, max: f64) -> f64 {
    let pct = value / max.max(SCALE_EPSILON) * 100.0;
    pct.max(MIN_BAR_HEIGHT_PCT)
}

/// One bar of a region chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub height_pct: f64,
}

/// The two trend charts for a region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionCharts {
    pub scale: ChartScale,
    pub risk: Vec<ChartPoint>,
    /// Live bucket per risk bar, for colouring.
    pub risk_buckets: Vec<LiveRiskBucket>,
    pub consumption: Vec<ChartPoint>,
}

/// Everything known about one region after a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionView {
    pub region: String,
    pub snapshot: Option<RegionSnapshot>,
    pub ranking: Option<RegionRanking>,
    pub elevated: Vec<ElevatedRiskEvent>,
    /// Present only for regions with a live reading this cycle.
    pub charts: Option<RegionCharts>,
}

impl RegionView {
    pub fn live_bucket(&self) -> Option<LiveRiskBucket> {
        self.snapshot.as_ref().map(|s| classify_live(s.risk_score))
    }
}

/// The merged result of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledView {
    /// Live regions in `/live/current` order, then ranking-only regions in
    /// ranking order.
    pub regions: Vec<RegionView>,
    /// The deduplicated current-state list, in the same order as `regions`.
    pub current: Vec<RegionSnapshot>,
    pub ranking: Vec<RegionRanking>,
    /// Every active elevation, for the elevated summary.
    pub elevated: Vec<ElevatedRiskEvent>,
    /// Elevations for regions absent from both other sources.
    pub elevated_only: Vec<ElevatedRiskEvent>,
    pub notes: Vec<MergeNote>,
}

impl ReconciledView {
    pub fn region(&self, region: &str) -> Option<&RegionView> {
        self.regions.iter().find(|r| r.region == region)
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Owns a view's history buffer; the only thing that appends to it.
#[derive(Debug, Clone)]
pub struct ViewReconciler {
    history: HistoryBuffer,
    chart_points: usize,
}

impl ViewReconciler {
    pub fn new(history_capacity: usize, chart_points: usize) -> Self {
        Self {
            history: HistoryBuffer::new(history_capacity),
            chart_points: chart_points.max(1),
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Merges `fetch` and appends each live region's snapshot to the history,
    /// once per region, in list order.
    pub fn ingest(&mut self, fetch: LiveFetch) -> ReconciledView {
        let mut notes = Vec::new();
        let current = dedupe_last_wins(fetch.current, &mut notes);

        let ranking_by_region: HashMap<&str, &RegionRanking> =
            fetch.ranking.iter().map(|r| (r.region.as_str(), r)).collect();
        let mut elevated_by_region: HashMap<&str, Vec<ElevatedRiskEvent>> = HashMap::new();
        for event in &fetch.elevated {
            elevated_by_region
                .entry(event.region.as_str())
                .or_default()
                .push(event.clone());
        }

        let mut regions = Vec::with_capacity(current.len() + fetch.ranking.len());
        let mut seen: HashSet<&str> = HashSet::new();

        for snapshot in &current {
            seen.insert(snapshot.region.as_str());
            let ranking = ranking_by_region.get(snapshot.region.as_str()).map(|r| (*r).clone());
            if ranking.is_none() {
                notes.push(MergeNote::MissingRanking(snapshot.region.clone()));
            }

            // Scale over the pre-append history plus the new snapshot, then
            // chart the post-append tail.
            let scale = ChartScale::over(self.history.read(&snapshot.region), snapshot);
            self.history.append(snapshot.clone());
            let charts = self.charts_for(&snapshot.region, scale);

            regions.push(RegionView {
                region: snapshot.region.clone(),
                snapshot: Some(snapshot.clone()),
                ranking,
                elevated: elevated_by_region.remove(snapshot.region.as_str()).unwrap_or_default(),
                charts: Some(charts),
            });
        }

        for row in &fetch.ranking {
            if !seen.insert(row.region.as_str()) {
                continue;
            }
            notes.push(MergeNote::MissingLiveReading(row.region.clone()));
            regions.push(RegionView {
                region: row.region.clone(),
                snapshot: None,
                ranking: Some(row.clone()),
                elevated: elevated_by_region.remove(row.region.as_str()).unwrap_or_default(),
                charts: None,
            });
        }

        let elevated_only: Vec<ElevatedRiskEvent> = fetch
            .elevated
            .iter()
            .filter(|e| !seen.contains(e.region.as_str()))
            .cloned()
            .collect();
        let mut reported = HashSet::new();
        for event in &elevated_only {
            if reported.insert(event.region.as_str()) {
                notes.push(MergeNote::ElevatedOnly(event.region.clone()));
            }
        }

        for note in &notes {
            debug!(?note, "degraded merge");
        }

        ReconciledView {
            regions,
            current,
            ranking: fetch.ranking.clone(),
            elevated: fetch.elevated.clone(),
            elevated_only,
            notes,
        }
    }

    fn charts_for(&self, region: &str, scale: ChartScale) -> RegionCharts {
        let series = self.history.read(region);
        let skip = series.len().saturating_sub(self.chart_points);
        let tail: Vec<&RegionSnapshot> = series.iter().skip(skip).collect();

        RegionCharts {
            scale,
            risk: tail
                .iter()
                .map(|s| ChartPoint {
                    timestamp: s.timestamp,
                    value: s.risk_score,
                    height_pct: bar_height_pct(s.risk_score, scale.max_risk),
                })
                .collect(),
            risk_buckets: tail.iter().map(|s| classify_live(s.risk_score)).collect(),
            consumption: tail
                .iter()
                .map(|s| ChartPoint {
                    timestamp: s.timestamp,
                    value: s.consumption,
                    height_pct: bar_height_pct(s.consumption, scale.max_consumption),
                })
                .collect(),
        }
    }
}

/// Collapses repeated regions: each region keeps the position of its first
/// appearance and the value of its last.
fn dedupe_last_wins(snapshots: Vec<RegionSnapshot>, notes: &mut Vec<MergeNote>) -> Vec<RegionSnapshot> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<RegionSnapshot> = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        match index.get(&snapshot.region) {
            Some(&i) => {
                notes.push(MergeNote::DuplicateSnapshot(snapshot.region.clone()));
                out[i] = snapshot;
            }
            None => {
                index.insert(snapshot.region.clone(), out.len());
                out.push(snapshot);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RiskLevel, RiskStatus, Severity};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn snap(region: &str, seq: i64, consumption: f64, risk: f64) -> RegionSnapshot {
        RegionSnapshot {
            region: region.to_string(),
            timestamp: t0() + Duration::seconds(seq * 10),
            consumption,
            risk_score: risk,
            risk_status: RiskStatus::Normal,
            risk_info: None,
        }
    }

    fn rank(region: &str, priority: u32) -> RegionRanking {
        RegionRanking {
            region: region.to_string(),
            current_risk: 40.0,
            recent_peak_risk: 55.0,
            risk_level: RiskLevel::Medium,
            persistence_days: 2,
            priority_score: 48.0,
            inspection_priority: priority,
            risk_status: None,
            last_updated: None,
        }
    }

    fn event(region: &str) -> ElevatedRiskEvent {
        ElevatedRiskEvent {
            region: region.to_string(),
            pattern_type: "gradual".to_string(),
            start_time: t0(),
            estimated_end: None,
            severity: Severity::Medium,
            pattern: "increasing".to_string(),
        }
    }

    #[test]
    fn test_full_join_attaches_ranking_and_elevation() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 12_000.0, 75.0)],
            ranking: vec![rank("North", 1)],
            elevated: vec![event("North")],
        });
        let north = view.region("North").unwrap();
        assert!(north.snapshot.is_some());
        assert_eq!(north.ranking.as_ref().unwrap().inspection_priority, 1);
        assert_eq!(north.elevated.len(), 1);
        assert!(view.notes.is_empty());
        assert!(view.elevated_only.is_empty());
    }

    #[test]
    fn test_ranking_only_region_has_no_live_reading() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 12_000.0, 20.0)],
            ranking: vec![rank("South", 1), rank("North", 2)],
            elevated: vec![],
        });
        let names: Vec<&str> = view.regions.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(names, vec!["North", "South"]);
        let south = view.region("South").unwrap();
        assert!(south.snapshot.is_none());
        assert!(south.charts.is_none());
        assert!(view.notes.contains(&MergeNote::MissingLiveReading("South".into())));
        assert_eq!(reconciler.history().len("South"), 0);
    }

    #[test]
    fn test_elevated_only_region_is_kept_out_of_region_views() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 12_000.0, 20.0)],
            ranking: vec![rank("North", 1)],
            elevated: vec![event("West")],
        });
        assert!(view.region("West").is_none());
        assert_eq!(view.elevated_only.len(), 1);
        assert_eq!(view.elevated.len(), 1);
        assert_eq!(view.notes, vec![MergeNote::ElevatedOnly("West".into())]);
    }

    #[test]
    fn test_region_match_is_case_sensitive() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 12_000.0, 20.0)],
            ranking: vec![rank("north", 1)],
            elevated: vec![],
        });
        assert!(view.region("North").unwrap().ranking.is_none());
        assert!(view.region("north").unwrap().snapshot.is_none());
    }

    #[test]
    fn test_duplicate_region_appends_once_with_last_value() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![
                snap("North", 0, 1_000.0, 10.0),
                snap("South", 0, 2_000.0, 20.0),
                snap("North", 1, 3_000.0, 30.0),
            ],
            ranking: vec![],
            elevated: vec![],
        });
        assert_eq!(reconciler.history().len("North"), 1);
        assert_eq!(reconciler.history().newest("North").unwrap().consumption, 3_000.0);
        let order: Vec<&str> = view.current.iter().map(|s| s.region.as_str()).collect();
        assert_eq!(order, vec!["North", "South"]);
        assert!(view.notes.contains(&MergeNote::DuplicateSnapshot("North".into())));
    }

    #[test]
    fn test_history_grows_across_cycles_in_arrival_order() {
        let mut reconciler = ViewReconciler::new(20, 15);
        reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 1_000.0, 75.0)],
            ..Default::default()
        });
        reconciler.ingest(LiveFetch {
            current: vec![snap("North", 1, 1_100.0, 42.0)],
            ..Default::default()
        });
        let risks: Vec<f64> = reconciler.history().read("North").iter().map(|s| s.risk_score).collect();
        assert_eq!(risks, vec![75.0, 42.0]);
    }

    #[test]
    fn test_absent_region_keeps_its_history() {
        let mut reconciler = ViewReconciler::new(20, 15);
        reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 1_000.0, 10.0)],
            ..Default::default()
        });
        reconciler.ingest(LiveFetch::default());
        assert_eq!(reconciler.history().len("North"), 1);
    }

    #[test]
    fn test_chart_scale_includes_history_and_latest() {
        let history = vec![snap("North", 0, 500.0, 80.0), snap("North", 1, 900.0, 10.0)];
        let latest = snap("North", 2, 700.0, 20.0);
        let scale = ChartScale::over(&history, &latest);
        assert_eq!(scale.max_consumption, 900.0);
        assert_eq!(scale.max_risk, 80.0);
    }

    #[test]
    fn test_bar_height_guards_zero_and_floors_small_values() {
        assert_eq!(bar_height_pct(0.0, 0.0), MIN_BAR_HEIGHT_PCT);
        assert!(bar_height_pct(0.0, 0.0).is_finite());
        assert_eq!(bar_height_pct(1.0, 100.0), MIN_BAR_HEIGHT_PCT);
        assert_eq!(bar_height_pct(50.0, 100.0), 50.0);
        assert_eq!(bar_height_pct(100.0, 100.0), 100.0);
    }

    #[test]
    fn test_all_zero_series_charts_at_minimum_height() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let view = reconciler.ingest(LiveFetch {
            current: vec![snap("North", 0, 0.0, 0.0)],
            ..Default::default()
        });
        let charts = view.region("North").unwrap().charts.as_ref().unwrap();
        assert_eq!(charts.risk[0].height_pct, MIN_BAR_HEIGHT_PCT);
        assert_eq!(charts.consumption[0].height_pct, MIN_BAR_HEIGHT_PCT);
    }

    #[test]
    fn test_charts_use_last_points_of_history() {
        let mut reconciler = ViewReconciler::new(20, 15);
        let mut view = ReconciledView::default();
        for seq in 0..25 {
            view = reconciler.ingest(LiveFetch {
                current: vec![snap("North", seq, 100.0 + seq as f64, seq as f64)],
                ..Default::default()
            });
        }
        let charts = view.region("North").unwrap().charts.clone().unwrap();
        assert_eq!(charts.risk.len(), 15);
        assert_eq!(charts.risk.last().unwrap().value, 24.0);
        assert_eq!(charts.risk.first().unwrap().value, 10.0);
        assert_eq!(charts.risk.last().unwrap().height_pct, 100.0);
        assert_eq!(charts.risk_buckets.len(), 15);
    }
}
