//! Polled views: the live monitor and the ranking summary.
//!
//! A view owns its scheduler, its presentation state and (for the live
//! monitor) its history buffer. Nothing is shared between views, so two
//! mounted live monitors poll and chart independently.
//!
//! A cycle's outcome is applied in one step under the view's lock: either the
//! whole fetch is reconciled and the aggregate recomputed, or the failure is
//! recorded and everything on display stays as it was.

use crate::alert::stalenesses::stale_regions;
use crate::analysis::aggregate::{AggregateView, RankingSummary};
use crate::analysis::reconcile::{ReconciledView, ViewReconciler};
use crate::config::{LiveConfig, RankingConfig};
use crate::history::HistoryBuffer;
use crate::ingest::collaborator::{Collaborator, LiveFetch};
use crate::logging::{CycleSummary, log_cycle_failure, log_cycle_summary};
use crate::model::{RegionRanking, Result};
use crate::presentation::{PresentationState, ViewStatus};
use crate::scheduler::{PollCycle, RefreshOutcome, SchedulerHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const LIVE_VIEW_NAME: &str = "live";
pub const RANKING_VIEW_NAME: &str = "ranking";

fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    // Keep serving whatever a panicked apply left behind.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Live monitor
// ============================================================================

/// What the live monitor displays after a successful cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveFrame {
    pub reconciled: ReconciledView,
    pub aggregate: AggregateView,
    /// Buffered regions whose newest reading is older than the stale limit.
    pub stale_regions: Vec<String>,
}

/// Live monitor state: history, presentation, and the last good frame.
#[derive(Debug)]
pub struct LiveState {
    reconciler: ViewReconciler,
    presentation: PresentationState<LiveFrame>,
    stale_after_secs: u64,
    revision: u64,
}

impl LiveState {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            reconciler: ViewReconciler::new(config.history_capacity, config.chart_points),
            presentation: PresentationState::new(),
            stale_after_secs: config.stale_after_secs,
            revision: 0,
        }
    }

    /// Applies one cycle's outcome.
    ///
    /// On failure the history buffer and the frame on display are left
    /// untouched.
    pub fn apply(&mut self, outcome: Result<LiveFetch>, now: DateTime<Utc>) {
        self.revision += 1;
        match outcome {
            Ok(fetch) => {
                let summary = CycleSummary {
                    regions: fetch.current.len(),
                    ranking_rows: fetch.ranking.len(),
                    elevated_events: fetch.elevated.len(),
                };
                let reconciled = self.reconciler.ingest(fetch);
                let aggregate = AggregateView::compute(&reconciled.current, &reconciled.elevated, now);
                let stale = stale_regions(self.reconciler.history(), self.stale_after_secs, now);
                self.presentation.on_success(
                    LiveFrame {
                        reconciled,
                        aggregate,
                        stale_regions: stale,
                    },
                    now,
                );
                log_cycle_summary(LIVE_VIEW_NAME, summary);
            }
            Err(e) => {
                let reason = e.to_string();
                self.presentation.on_failure(reason.as_str());
                log_cycle_failure(
                    LIVE_VIEW_NAME,
                    self.presentation.consecutive_failures(),
                    self.presentation.view().is_some(),
                    &reason,
                );
            }
        }
    }

    pub fn status(&self) -> ViewStatus {
        self.presentation.status()
    }

    pub fn frame(&self) -> Option<&LiveFrame> {
        self.presentation.view()
    }

    pub fn presentation(&self) -> &PresentationState<LiveFrame> {
        &self.presentation
    }

    pub fn history(&self) -> &HistoryBuffer {
        self.reconciler.history()
    }

    /// Bumped on every applied cycle, successful or not.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

struct LiveCycle {
    collaborator: Collaborator,
    state: Arc<Mutex<LiveState>>,
}

#[async_trait]
impl PollCycle for LiveCycle {
    type Outcome = Result<LiveFetch>;

    async fn fetch(&self) -> Self::Outcome {
        self.collaborator.fetch_live().await
    }

    fn apply(&self, outcome: Self::Outcome) {
        lock(&self.state).apply(outcome, Utc::now());
    }
}

/// A mounted live monitor.
pub struct LiveView {
    state: Arc<Mutex<LiveState>>,
    scheduler: SchedulerHandle,
}

impl LiveView {
    /// Creates the view and starts polling; the first cycle runs at once.
    pub fn mount(collaborator: Collaborator, config: &LiveConfig) -> Self {
        let state = Arc::new(Mutex::new(LiveState::new(config)));
        let mut scheduler = SchedulerHandle::new(LIVE_VIEW_NAME, config.interval());
        scheduler.start(Arc::new(LiveCycle {
            collaborator,
            state: state.clone(),
        }));
        Self { state, scheduler }
    }

    /// Stops polling and discards the view, history included.
    pub async fn unmount(mut self) {
        self.scheduler.stop().await;
    }

    pub fn refresh(&self) -> RefreshOutcome {
        self.scheduler.refresh()
    }

    pub fn status(&self) -> ViewStatus {
        lock(&self.state).status()
    }

    /// Runs `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&LiveState) -> R) -> R {
        let guard = lock(&self.state);
        f(&*guard)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}

// ============================================================================
// Ranking summary
// ============================================================================

#[derive(Debug, Default)]
pub struct RankingState {
    presentation: PresentationState<RankingSummary>,
    revision: u64,
}

impl RankingState {
    pub fn apply(&mut self, outcome: Result<Vec<RegionRanking>>, now: DateTime<Utc>) {
        self.revision += 1;
        match outcome {
            Ok(rows) => {
                let summary = CycleSummary {
                    regions: 0,
                    ranking_rows: rows.len(),
                    elevated_events: 0,
                };
                self.presentation.on_success(RankingSummary::compute(rows, now), now);
                log_cycle_summary(RANKING_VIEW_NAME, summary);
            }
            Err(e) => {
                let reason = e.to_string();
                self.presentation.on_failure(reason.as_str());
                log_cycle_failure(
                    RANKING_VIEW_NAME,
                    self.presentation.consecutive_failures(),
                    self.presentation.view().is_some(),
                    &reason,
                );
            }
        }
    }

    pub fn status(&self) -> ViewStatus {
        self.presentation.status()
    }

    pub fn summary(&self) -> Option<&RankingSummary> {
        self.presentation.view()
    }

    pub fn presentation(&self) -> &PresentationState<RankingSummary> {
        &self.presentation
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

struct RankingCycle {
    collaborator: Collaborator,
    state: Arc<Mutex<RankingState>>,
}

#[async_trait]
impl PollCycle for RankingCycle {
    type Outcome = Result<Vec<RegionRanking>>;

    async fn fetch(&self) -> Self::Outcome {
        self.collaborator.fetch_ranking_summary().await
    }

    fn apply(&self, outcome: Self::Outcome) {
        lock(&self.state).apply(outcome, Utc::now());
    }
}

/// A mounted ranking summary, polled at its own cadence.
pub struct RankingView {
    state: Arc<Mutex<RankingState>>,
    scheduler: SchedulerHandle,
}

impl RankingView {
    pub fn mount(collaborator: Collaborator, config: &RankingConfig) -> Self {
        let state = Arc::new(Mutex::new(RankingState::default()));
        let mut scheduler = SchedulerHandle::new(RANKING_VIEW_NAME, config.interval());
        scheduler.start(Arc::new(RankingCycle {
            collaborator,
            state: state.clone(),
        }));
        Self { state, scheduler }
    }

    pub async fn unmount(mut self) {
        self.scheduler.stop().await;
    }

    pub fn refresh(&self) -> RefreshOutcome {
        self.scheduler.refresh()
    }

    pub fn status(&self) -> ViewStatus {
        lock(&self.state).status()
    }

    pub fn read<R>(&self, f: impl FnOnce(&RankingState) -> R) -> R {
        let guard = lock(&self.state);
        f(&*guard)
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}
