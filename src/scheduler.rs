//! Poll scheduler.
//!
//! Each mounted view owns one `SchedulerHandle`. Starting it spawns a single
//! task that runs one round immediately and then one round per cadence tick:
//!
//! ```text
//!   Idle --start()--> Polling --stop()--> Idle
//! ```
//!
//! Rounds never overlap. A tick that comes due while a round is still in
//! flight is skipped (counted, never queued), and the schedule resumes at the
//! next tick boundary after the round completes. A manual refresh may queue
//! at most one extra round while the scheduler is idle between ticks; a
//! refresh requested mid-round is skipped.
//!
//! Cancellation is cooperative: `stop()` cancels the task and waits for it
//! to exit. A fetch still in flight at that point is dropped, so its result
//! can never reach `PollCycle::apply`.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One view's unit of polling work.
///
/// `fetch` performs the network round and must not touch view state;
/// `apply` commits its outcome and must not await.
#[async_trait]
pub trait PollCycle: Send + Sync + 'static {
    type Outcome: Send + 'static;

    async fn fetch(&self) -> Self::Outcome;

    fn apply(&self, outcome: Self::Outcome);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// Result of asking for an out-of-schedule round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A round will start as soon as the scheduler task sees it.
    Queued,
    /// A refresh is already waiting; this one was folded into it.
    AlreadyPending,
    /// A round is in flight; refreshing now would overlap it.
    SkippedInFlight,
    /// The scheduler is stopped.
    NotRunning,
}

/// Point-in-time copy of a scheduler's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerCounters {
    pub rounds_started: u64,
    pub rounds_applied: u64,
    pub ticks_skipped: u64,
    pub refreshes_skipped: u64,
}

#[derive(Default)]
struct SchedulerStats {
    rounds_started: AtomicU64,
    rounds_applied: AtomicU64,
    ticks_skipped: AtomicU64,
    refreshes_skipped: AtomicU64,
    in_flight: AtomicBool,
}

impl SchedulerStats {
    fn snapshot(&self) -> SchedulerCounters {
        SchedulerCounters {
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            rounds_applied: self.rounds_applied.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
        }
    }
}

struct Running {
    cancel: CancellationToken,
    refresh_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// Shortest cadence a scheduler will run at. Shorter requests, including
/// zero, are raised to this.
pub const MIN_CADENCE: Duration = Duration::from_millis(1);

/// Owned polling lifecycle for one view.
///
/// Dropping a running handle cancels and aborts its task, so a view that is
/// torn down without an explicit `stop()` still leaves no timer behind.
pub struct SchedulerHandle {
    name: String,
    cadence: Duration,
    running: Option<Running>,
    stats: Arc<SchedulerStats>,
}

impl SchedulerHandle {
    pub fn new(name: impl Into<String>, cadence: Duration) -> Self {
        let name = name.into();
        if cadence < MIN_CADENCE {
            warn!(scheduler = %name, requested = ?cadence, "cadence below minimum, using {:?}", MIN_CADENCE);
        }
        Self {
            name,
            cadence: cadence.max(MIN_CADENCE),
            running: None,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.is_some() {
            SchedulerState::Polling
        } else {
            SchedulerState::Idle
        }
    }

    /// True while a round's fetch is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.stats.in_flight.load(Ordering::Acquire)
    }

    pub fn counters(&self) -> SchedulerCounters {
        self.stats.snapshot()
    }

    /// Spawns the polling task and runs the first round immediately.
    ///
    /// Returns `false` without doing anything if already polling. Must be
    /// called from within a tokio runtime.
    pub fn start<C: PollCycle>(&mut self, cycle: Arc<C>) -> bool {
        if self.running.is_some() {
            return false;
        }

        let cancel = CancellationToken::new();
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let task = tokio::spawn(run_loop(
            self.name.clone(),
            cycle,
            self.cadence,
            cancel.clone(),
            refresh_rx,
            self.stats.clone(),
        ));

        info!(
            scheduler = %self.name,
            cadence_secs = self.cadence.as_secs_f64(),
            "poll scheduler started"
        );
        self.running = Some(Running {
            cancel,
            refresh_tx,
            task,
        });
        true
    }

    /// Asks for a round outside the regular cadence.
    pub fn refresh(&self) -> RefreshOutcome {
        let Some(running) = &self.running else {
            return RefreshOutcome::NotRunning;
        };
        if self.is_in_flight() {
            self.stats.refreshes_skipped.fetch_add(1, Ordering::Relaxed);
            debug!(scheduler = %self.name, "refresh skipped, round in flight");
            return RefreshOutcome::SkippedInFlight;
        }
        match running.refresh_tx.try_send(()) {
            Ok(()) => RefreshOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(())) => RefreshOutcome::AlreadyPending,
            Err(mpsc::error::TrySendError::Closed(())) => RefreshOutcome::NotRunning,
        }
    }

    /// Cancels the polling task and waits for it to exit.
    ///
    /// Safe to call any number of times. Once this returns, no further
    /// `apply` will run for this handle.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            if e.is_panic() {
                warn!(scheduler = %self.name, "poll task panicked: {}", e);
            }
        }
        self.stats.in_flight.store(false, Ordering::Release);
        info!(scheduler = %self.name, "poll scheduler stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            running.task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Tick,
    Refresh,
}

async fn run_loop<C: PollCycle>(
    name: String,
    cycle: Arc<C>,
    cadence: Duration,
    cancel: CancellationToken,
    mut refresh_rx: mpsc::Receiver<()>,
    stats: Arc<SchedulerStats>,
) {
    // First round fires immediately.
    let mut next_tick = Instant::now();

    loop {
        let trigger = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep_until(next_tick) => Trigger::Tick,
            Some(()) = refresh_rx.recv() => Trigger::Refresh,
        };

        stats.in_flight.store(true, Ordering::Release);
        let round = stats.rounds_started.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(scheduler = %name, round, ?trigger, "round started");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(scheduler = %name, round, "round abandoned on stop");
                break;
            }
            outcome = cycle.fetch() => outcome,
        };
        stats.in_flight.store(false, Ordering::Release);

        if cancel.is_cancelled() {
            debug!(scheduler = %name, round, "discarding result that resolved after stop");
            break;
        }
        cycle.apply(outcome);
        stats.rounds_applied.fetch_add(1, Ordering::Relaxed);

        if trigger == Trigger::Tick {
            next_tick += cadence;
        }
        let now = Instant::now();
        let mut skipped = 0u64;
        while next_tick <= now {
            next_tick += cadence;
            skipped += 1;
        }
        if skipped > 0 {
            stats.ticks_skipped.fetch_add(skipped, Ordering::Relaxed);
            debug!(scheduler = %name, round, skipped, "ticks skipped while round was in flight");
        }
    }

    stats.in_flight.store(false, Ordering::Release);
}
