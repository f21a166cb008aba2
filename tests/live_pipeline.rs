/// Integration tests for the live monitoring pipeline
///
/// These tests drive a mounted `LiveView` against a scripted fake
/// collaborator, on tokio's paused clock, and verify:
/// 1. Successful cycles reconcile, chart and aggregate per region
/// 2. A failed endpoint voids the whole cycle and keeps the last good view
/// 3. Polling keeps its cadence through failures and stops on unmount
/// 4. Independently mounted views share nothing
///
/// No network access is needed.

mod common;

use aquaguard_monitor::Collaborator;
use aquaguard_monitor::config::{LiveConfig, RankingConfig};
use aquaguard_monitor::live::{LiveView, RankingView};
use aquaguard_monitor::model::FetchCause;
use aquaguard_monitor::presentation::ViewStatus;
use aquaguard_monitor::scheduler::SchedulerState;
use common::{FakeCollaborator, list, snapshot_json};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const RANKING: &str = r#"[
    {"region": "North", "current_risk": 75, "recent_peak_risk": 82, "risk_level": "High",
     "persistence_days": 4, "priority_score": 78.5, "inspection_priority": 1},
    {"region": "East", "current_risk": 20, "recent_peak_risk": 35, "risk_level": "Low",
     "persistence_days": 0, "priority_score": 22.0, "inspection_priority": 2}
]"#;

const ELEVATED: &str = r#"[
    {"region": "North", "type": "gradual", "start_time": "2024-05-01T09:00:00",
     "severity": "high", "pattern": "increasing"},
    {"region": "Lakeside", "type": "spike", "start_time": "2024-05-01T11:30:00",
     "severity": "Medium", "pattern": "sudden"}
]"#;

fn serve_north(fake: &FakeCollaborator, timestamp: &str, risk: f64) {
    fake.serve(
        "/live/current",
        &list(&[
            snapshot_json("North", timestamp, 12_000.0, risk),
            snapshot_json("South", timestamp, 8_000.0, 15.0),
        ]),
    );
}

fn healthy_collaborator() -> Arc<FakeCollaborator> {
    let fake = Arc::new(FakeCollaborator::default());
    serve_north(&fake, "2024-05-01T12:00:00Z", 75.0);
    fake.serve("/live/ranking", RANKING);
    fake.serve("/live/elevated", ELEVATED);
    fake
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ---------------------------------------------------------------------------
// Reconciliation through a mounted view
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_first_cycle_produces_merged_view() {
    let fake = healthy_collaborator();
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;

    assert_eq!(view.status(), ViewStatus::Ready);
    view.read(|state| {
        let frame = state.frame().expect("ready view has a frame");
        let names: Vec<&str> = frame.reconciled.regions.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(names, vec!["North", "South", "East"]);

        let north = frame.reconciled.region("North").unwrap();
        assert_eq!(north.ranking.as_ref().unwrap().inspection_priority, 1);
        assert_eq!(north.elevated.len(), 1);
        assert!(north.snapshot.as_ref().unwrap().risk_info.is_none(), "{{}} means no risk info");

        let east = frame.reconciled.region("East").unwrap();
        assert!(east.snapshot.is_none(), "ranking-only region has no live reading");

        assert_eq!(frame.reconciled.elevated_only.len(), 1);
        assert_eq!(frame.reconciled.elevated_only[0].region, "Lakeside");

        assert_eq!(frame.aggregate.region_count, 2);
        assert_eq!(frame.aggregate.high_risk, 1);
        assert_eq!(frame.aggregate.normal_risk, 1);
        assert_eq!(frame.aggregate.total_consumption, 20_000.0);
        assert_eq!(frame.aggregate.mean_risk_score, 45.0);
        assert_eq!(frame.aggregate.active_elevations, 2);
    });

    view.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_high_risk_region_cools_between_cycles() {
    let fake = healthy_collaborator();
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;
    let first = view.read(|s| s.frame().unwrap().aggregate.clone());

    serve_north(&fake, "2024-05-01T12:00:10Z", 42.0);
    tokio::time::sleep(Duration::from_secs(10)).await;
    let second = view.read(|s| s.frame().unwrap().aggregate.clone());

    assert_eq!((first.high_risk, second.high_risk), (1, 0));
    assert_eq!((first.medium_risk, second.medium_risk), (0, 0));
    assert_eq!(second.elevated_risk, 1);

    let north: Vec<f64> = view.read(|s| s.history().read("North").iter().map(|s| s.risk_score).collect());
    assert_eq!(north, vec![75.0, 42.0]);

    view.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_history_is_capped_at_capacity() {
    let fake = healthy_collaborator();
    let config = LiveConfig {
        history_capacity: 20,
        ..Default::default()
    };
    let view = LiveView::mount(Collaborator::new(fake.clone()), &config);

    // 26 cycles: t=0 .. t=250.
    tokio::time::sleep(Duration::from_secs(255)).await;
    assert_eq!(view.read(|s| s.revision()), 26);
    assert_eq!(view.read(|s| s.history().len("North")), 20);

    view.unmount().await;
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_ranking_failure_keeps_prior_view_and_history() {
    let fake = healthy_collaborator();
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;
    let before = view.read(|s| s.frame().cloned());

    fake.fail("/live/ranking", FetchCause::Status(503));
    serve_north(&fake, "2024-05-01T12:00:10Z", 42.0);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(view.status(), ViewStatus::Ready);
    view.read(|state| {
        assert_eq!(state.frame().cloned(), before, "last good view retained");
        assert_eq!(state.history().len("North"), 1, "no partial append");
        assert_eq!(state.history().len("South"), 1);
        assert!(state.presentation().is_degraded());
        let error = state.presentation().last_error().unwrap();
        assert!(error.contains("ranking: HTTP error: 503"), "got {}", error);
    });

    view.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_failure_then_recovery() {
    let fake = Arc::new(FakeCollaborator::default());
    fake.fail("/live/current", FetchCause::Transport("connection refused".into()));
    fake.serve("/live/ranking", "[]");
    fake.serve("/live/elevated", "[]");
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;

    assert_eq!(view.status(), ViewStatus::Error);
    assert!(view.read(|s| s.history().is_empty()));

    fake.serve("/live/current", &list(&[snapshot_json("North", "2024-05-01T12:00:10", 100.0, 5.0)]));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(view.status(), ViewStatus::Ready);
    assert_eq!(view.read(|s| s.presentation().consecutive_failures()), 0);

    view.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_lists_are_a_valid_cycle() {
    let fake = Arc::new(FakeCollaborator::default());
    fake.serve("/live/current", "[]");
    fake.serve("/live/ranking", "[]");
    fake.serve("/live/elevated", "[]");
    let view = LiveView::mount(Collaborator::new(fake), &LiveConfig::default());
    settle().await;

    assert_eq!(view.status(), ViewStatus::Ready);
    view.read(|s| {
        let aggregate = &s.frame().unwrap().aggregate;
        assert_eq!(aggregate.region_count, 0);
        assert_eq!(aggregate.mean_risk_score, 0.0);
    });
    view.unmount().await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_unmount_stops_all_requests() {
    let fake = healthy_collaborator();
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(view.scheduler().state(), SchedulerState::Polling);

    view.unmount().await;
    let calls = fake.call_count();
    assert_eq!(calls, 6, "two cycles of three reads");

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fake.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_each_cycle_reads_all_three_endpoints() {
    let fake = healthy_collaborator();
    fake.fail("/live/current", FetchCause::Status(500));
    let view = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;

    assert_eq!(fake.calls_to("/live/current"), 1);
    assert_eq!(fake.calls_to("/live/ranking"), 1);
    assert_eq!(fake.calls_to("/live/elevated"), 1);
    view.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_mounted_views_are_independent() {
    let fake = healthy_collaborator();
    let first = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    tokio::time::sleep(Duration::from_secs(25)).await;

    let second = LiveView::mount(Collaborator::new(fake.clone()), &LiveConfig::default());
    settle().await;

    assert_eq!(first.read(|s| s.history().len("North")), 3);
    assert_eq!(second.read(|s| s.history().len("North")), 1);

    first.unmount().await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(second.read(|s| s.history().len("North")), 2);
    second.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn test_ranking_summary_polls_slower_than_live() {
    let fake = healthy_collaborator();
    fake.serve("/ranking", RANKING);
    let collaborator = Collaborator::new(fake.clone());
    let live = LiveView::mount(collaborator.clone(), &LiveConfig::default());
    let ranking = RankingView::mount(collaborator, &RankingConfig::default());

    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(fake.calls_to("/live/current"), 7);
    assert_eq!(fake.calls_to("/ranking"), 3);

    ranking.read(|s| {
        let summary = s.summary().unwrap();
        assert_eq!(summary.rows[0].region, "North");
        assert_eq!((summary.high, summary.medium, summary.low), (1, 0, 1));
    });

    live.unmount().await;
    ranking.unmount().await;
}
