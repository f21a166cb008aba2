//! Collaborator Endpoint Verification
//!
//! Probes every endpoint the service reads, once, to show which ones are
//! reachable and returning data. Use this before pointing the live view at a
//! new collaborator deployment.
//!
//! Read-only: nothing here mutates view state, and the report is printed,
//! never stored.

use crate::ingest::collaborator::Collaborator;
use crate::model::{Endpoint, MonitorError};
use chrono::Utc;
use serde::Serialize;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    /// Region used for the per-region endpoints, if one was available.
    pub sample_region: Option<String>,
    pub results: Vec<EndpointVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub empty: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointVerification {
    pub endpoint: String,
    pub path: String,
    pub status: VerificationStatus,
    pub item_count: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    /// Responded and parsed, but with no items.
    Empty,
    Failed,
}

impl EndpointVerification {
    fn from_outcome(endpoint: Endpoint, outcome: Result<usize, MonitorError>) -> Self {
        let (status, item_count, error_message) = match outcome {
            Ok(0) => (VerificationStatus::Empty, 0, None),
            Ok(n) => (VerificationStatus::Success, n, None),
            Err(e) => {
                // Report the cause only; the endpoint is already a column.
                let message = e
                    .fetch_failures()
                    .first()
                    .map(|f| f.cause.to_string())
                    .unwrap_or_else(|| e.to_string());
                (VerificationStatus::Failed, 0, Some(message))
            }
        };
        Self {
            endpoint: endpoint.to_string(),
            path: endpoint.path(),
            status,
            item_count,
            error_message,
        }
    }

    fn skipped(endpoint: Endpoint) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            path: endpoint.path(),
            status: VerificationStatus::Failed,
            item_count: 0,
            error_message: Some("no region available to probe".to_string()),
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Probes every collaborator endpoint once.
///
/// The per-region endpoints use `sample_region`, or the first region listed
/// by `/regions` when none is given.
pub async fn run_verification(collaborator: &Collaborator, sample_region: Option<&str>) -> VerificationReport {
    let mut results = Vec::new();

    let (current, ranking, elevated) = tokio::join!(
        probe_live(collaborator, Endpoint::LiveCurrent),
        probe_live(collaborator, Endpoint::LiveRanking),
        probe_live(collaborator, Endpoint::LiveElevated),
    );
    results.extend([current, ranking, elevated]);

    let summary_ranking = collaborator.fetch_ranking_summary().await.map(|rows| rows.len());
    results.push(EndpointVerification::from_outcome(Endpoint::Ranking, summary_ranking));

    let regions = collaborator.fetch_regions().await;
    let listed_region = regions.as_ref().ok().and_then(|r| r.first().cloned());
    results.push(EndpointVerification::from_outcome(
        Endpoint::Regions,
        regions.map(|r| r.len()),
    ));

    let sample = sample_region.map(str::to_string).or(listed_region);
    match &sample {
        Some(region) => {
            let risk = collaborator.fetch_risk(region).await.map(|_| 1);
            results.push(EndpointVerification::from_outcome(Endpoint::Risk(region.clone()), risk));
            let series = collaborator.fetch_timeseries(region).await.map(|s| s.len());
            results.push(EndpointVerification::from_outcome(
                Endpoint::TimeSeries(region.clone()),
                series,
            ));
        }
        None => {
            results.push(EndpointVerification::skipped(Endpoint::Risk(String::new())));
            results.push(EndpointVerification::skipped(Endpoint::TimeSeries(String::new())));
        }
    }

    let summary = summarize(&results);
    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        sample_region: sample,
        results,
        summary,
    }
}

/// One live endpoint on its own, so a failure in one doesn't hide the others.
async fn probe_live(collaborator: &Collaborator, endpoint: Endpoint) -> EndpointVerification {
    let outcome = match &endpoint {
        Endpoint::LiveCurrent => collaborator.fetch_live_current().await.map(|v| v.len()),
        Endpoint::LiveRanking => collaborator.fetch_live_ranking().await.map(|v| v.len()),
        _ => collaborator.fetch_live_elevated().await.map(|v| v.len()),
    };
    EndpointVerification::from_outcome(endpoint, outcome)
}

fn summarize(results: &[EndpointVerification]) -> VerificationSummary {
    let mut summary = VerificationSummary {
        total: results.len(),
        ..Default::default()
    };
    for result in results {
        match result.status {
            VerificationStatus::Success => summary.working += 1,
            VerificationStatus::Empty => {
                summary.working += 1;
                summary.empty += 1;
            }
            VerificationStatus::Failed => summary.failed += 1,
        }
    }
    summary
}

pub fn print_summary(report: &VerificationReport) {
    println!("Collaborator verification at {}", report.timestamp);
    if let Some(region) = &report.sample_region {
        println!("Sample region: {}", region);
    }
    println!();

    for result in &report.results {
        match result.status {
            VerificationStatus::Success => {
                println!("  {:<24} OK ({} items)", result.path, result.item_count)
            }
            VerificationStatus::Empty => println!("  {:<24} OK (empty)", result.path),
            VerificationStatus::Failed => println!(
                "  {:<24} FAILED: {}",
                result.path,
                result.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }

    let success_rate = if report.summary.total > 0 {
        (report.summary.working as f64 / report.summary.total as f64) * 100.0
    } else {
        0.0
    };
    println!();
    println!(
        "Endpoints: {}/{} working ({} empty, {} failed)",
        report.summary.working, report.summary.total, report.summary.empty, report.summary.failed
    );
    println!("Overall Success Rate: {:.1}%", success_rate);
}
