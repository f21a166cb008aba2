use anyhow::Context;
use aquaguard_monitor::analysis::aggregate::RankingSummary;
use aquaguard_monitor::config::{DEFAULT_CONFIG_PATH, MonitorConfig};
use aquaguard_monitor::dashboard::{RegionDashboard, RegionListing};
use aquaguard_monitor::live::{LiveFrame, LiveView, RankingView};
use aquaguard_monitor::presentation::{PresentationState, ViewStatus};
use aquaguard_monitor::{Collaborator, logging, verify};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::signal;
use tracing::info;

/// How often the terminal checks a view for a newly applied cycle.
const RENDER_POLL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "aquaguard-monitor", about = "Live water-risk monitoring over the AquaGuard analytics service")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, short, env = "AQUAGUARD_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the live endpoints and print each cycle until Ctrl+C
    Live,
    /// Poll the inspection-priority ranking until Ctrl+C
    Ranking {
        /// Rows to print per cycle
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// List the regions the collaborator knows
    Regions,
    /// Show one region's historical dashboard
    Region { name: String },
    /// Probe every collaborator endpoint once
    Verify {
        /// Region for the per-region endpoints (default: first listed)
        #[arg(long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = MonitorConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;
    let _log_guard = logging::init_logging(&config.logging);

    let collaborator = Collaborator::http(
        &config.collaborator.base_url,
        config.collaborator.request_timeout(),
    )?;
    info!(base_url = %config.collaborator.base_url, "collaborator configured");

    match cli.command {
        Command::Live => run_live(collaborator, &config).await,
        Command::Ranking { top } => run_ranking(collaborator, &config, top).await,
        Command::Regions => {
            let listing = RegionListing::load(&collaborator).await?;
            if listing.is_empty() {
                println!("No regions reported.");
            }
            for region in &listing.regions {
                println!("{}", region);
            }
            Ok(())
        }
        Command::Region { name } => {
            let dashboard = RegionDashboard::load(&collaborator, &name).await?;
            print_dashboard(&dashboard);
            Ok(())
        }
        Command::Verify { region } => {
            let report = verify::run_verification(&collaborator, region.as_deref()).await;
            verify::print_summary(&report);
            Ok(())
        }
    }
}

async fn run_live(collaborator: Collaborator, config: &MonitorConfig) -> anyhow::Result<()> {
    let view = LiveView::mount(collaborator, &config.live);
    info!("Live monitor running. Press Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(RENDER_POLL);
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let revision = view.read(|s| s.revision());
                if revision != seen {
                    seen = revision;
                    view.read(|s| print_live(s.presentation()));
                }
            }
        }
    }

    view.unmount().await;
    Ok(())
}

async fn run_ranking(collaborator: Collaborator, config: &MonitorConfig, top: usize) -> anyhow::Result<()> {
    let view = RankingView::mount(collaborator, &config.ranking);
    info!("Ranking summary running. Press Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(RENDER_POLL);
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                let revision = view.read(|s| s.revision());
                if revision != seen {
                    seen = revision;
                    view.read(|s| print_ranking(s.presentation(), top));
                }
            }
        }
    }

    view.unmount().await;
    Ok(())
}

fn print_status_line<V>(state: &PresentationState<V>) -> bool {
    match state.status() {
        ViewStatus::Loading => {
            println!("Loading...");
            false
        }
        ViewStatus::Error => {
            println!("Error: {}", state.last_error().unwrap_or("unknown"));
            false
        }
        ViewStatus::Ready => {
            if state.is_degraded() {
                println!(
                    "Showing last good data ({} failed cycle(s): {})",
                    state.consecutive_failures(),
                    state.last_error().unwrap_or("unknown")
                );
            }
            true
        }
    }
}

fn print_live(state: &PresentationState<LiveFrame>) {
    println!();
    if !print_status_line(state) {
        return;
    }
    let Some(frame) = state.view() else { return };
    let agg = &frame.aggregate;
    println!(
        "{} regions | high {} | medium {} | elevated {} | normal {} | mean risk {:.1} | total {:.0} L/day",
        agg.region_count,
        agg.high_risk,
        agg.medium_risk,
        agg.elevated_risk,
        agg.normal_risk,
        agg.mean_risk_score,
        agg.total_consumption
    );
    for region in &frame.reconciled.regions {
        match (&region.snapshot, region.live_bucket()) {
            (Some(s), Some(bucket)) => println!(
                "  {:<16} {:>5.1} {:<12} {:>10.0} L/day  {}",
                region.region, s.risk_score, bucket.label(), s.consumption, s.risk_status
            ),
            _ => println!("  {:<16} (no live reading)", region.region),
        }
    }
    if !frame.reconciled.elevated.is_empty() {
        println!("  {} active elevation(s)", frame.reconciled.elevated.len());
    }
    if !frame.stale_regions.is_empty() {
        println!("  stale: {}", frame.stale_regions.join(", "));
    }
}

fn print_ranking(state: &PresentationState<RankingSummary>, top: usize) {
    println!();
    if !print_status_line(state) {
        return;
    }
    let Some(summary) = state.view() else { return };
    println!(
        "high {} | medium {} | low {} | mean current risk {:.1}",
        summary.high, summary.medium, summary.low, summary.mean_current_risk
    );
    for row in summary.top(top) {
        println!(
            "  #{:<3} {:<16} priority {:>6.1}  peak {:>5.1}  {} ({} day(s))",
            row.inspection_priority,
            row.region,
            row.priority_score,
            row.recent_peak_risk,
            row.risk_level,
            row.persistence_days
        );
    }
}

fn print_dashboard(dashboard: &RegionDashboard) {
    let a = &dashboard.analysis;
    println!("{} ({} risk)", dashboard.region, dashboard.risk_level);
    println!(
        "current {:.1} | peak {:.1} | 7-day avg {:.1} | anomalies (30d) {} | trend {:?}",
        a.current_risk_score, a.recent_peak_risk, a.average_risk_7d, a.recent_anomalies_30d, a.risk_trend
    );
    println!("{} day(s) of history, {} anomaly day(s)", dashboard.recent.len(), dashboard.anomalies.len());
    for anomaly in &dashboard.anomalies {
        println!(
            "  {}  actual {:.0}  expected {:.0}  deviation {:+.1}%",
            anomaly.date.format("%Y-%m-%d"),
            anomaly.actual_usage,
            anomaly.predicted_usage,
            anomaly.deviation_pct
        );
    }
    for rec in &dashboard.recommendations {
        println!("* {}: {}", rec.title(), rec.detail());
    }
}
