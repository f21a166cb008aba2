//! Analytics collaborator client.
//!
//! Reads precomputed risk data from the AquaGuard analytics service. The
//! live fetch issues its three reads concurrently and only reports success
//! when all three parsed; otherwise it returns one `CycleFailed` naming every
//! endpoint that failed. No local state is touched here: applying results is
//! the caller's job.
//!
//! HTTP goes through the `Transport` trait so tests can substitute canned
//! responses.

use crate::ingest::payloads;
use crate::logging;
use crate::model::{
    ElevatedRiskEvent, Endpoint, FetchCause, FetchFailure, MonitorError, RegionRanking,
    RegionSnapshot, Result, RiskAnalysis, TimeSeriesPoint,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

// ============================================================================
// Transport
// ============================================================================

/// Issues a GET for a collaborator path and returns the raw body of a 2xx
/// response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> std::result::Result<String, FetchCause>;
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `timeout` of `None` leaves the transport default in place.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| MonitorError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> std::result::Result<String, FetchCause> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchCause::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchCause::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchCause::Transport(e.to_string()))
    }
}

// ============================================================================
// Fetch results
// ============================================================================

/// Everything one live poll cycle read, all three lists parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveFetch {
    pub current: Vec<RegionSnapshot>,
    pub ranking: Vec<RegionRanking>,
    pub elevated: Vec<ElevatedRiskEvent>,
}

// ============================================================================
// Client
// ============================================================================

/// Read-only client for the collaborator's endpoints.
#[derive(Clone)]
pub struct Collaborator {
    transport: Arc<dyn Transport>,
}

impl Collaborator {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Convenience constructor for the HTTP transport.
    pub fn http(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url, timeout)?)))
    }

    /// Performs one live round: `/live/current`, `/live/ranking` and
    /// `/live/elevated`, concurrently. Waits for all three to settle; any
    /// failure voids the whole round.
    pub async fn fetch_live(&self) -> Result<LiveFetch> {
        let (current, ranking, elevated) = tokio::join!(
            self.read(Endpoint::LiveCurrent, payloads::parse_current),
            self.read(Endpoint::LiveRanking, payloads::parse_ranking),
            self.read(Endpoint::LiveElevated, payloads::parse_elevated),
        );

        let mut failures = Vec::new();
        let current = current.map_err(|f| failures.push(f)).ok();
        let ranking = ranking.map_err(|f| failures.push(f)).ok();
        let elevated = elevated.map_err(|f| failures.push(f)).ok();

        match (current, ranking, elevated) {
            (Some(current), Some(ranking), Some(elevated)) => Ok(LiveFetch {
                current,
                ranking,
                elevated,
            }),
            _ => Err(MonitorError::CycleFailed { failures }),
        }
    }

    /// `GET /live/current` on its own.
    pub async fn fetch_live_current(&self) -> Result<Vec<RegionSnapshot>> {
        Ok(self.read(Endpoint::LiveCurrent, payloads::parse_current).await?)
    }

    /// `GET /live/ranking` on its own.
    pub async fn fetch_live_ranking(&self) -> Result<Vec<RegionRanking>> {
        Ok(self.read(Endpoint::LiveRanking, payloads::parse_ranking).await?)
    }

    /// `GET /live/elevated` on its own.
    pub async fn fetch_live_elevated(&self) -> Result<Vec<ElevatedRiskEvent>> {
        Ok(self.read(Endpoint::LiveElevated, payloads::parse_elevated).await?)
    }

    /// `GET /ranking`, the historical-dashboard ranking.
    pub async fn fetch_ranking_summary(&self) -> Result<Vec<RegionRanking>> {
        Ok(self.read(Endpoint::Ranking, payloads::parse_ranking).await?)
    }

    /// `GET /regions`. An empty list is a valid answer.
    pub async fn fetch_regions(&self) -> Result<Vec<String>> {
        Ok(self.read(Endpoint::Regions, payloads::parse_regions).await?)
    }

    /// `GET /risk/{region}`.
    pub async fn fetch_risk(&self, region: &str) -> Result<RiskAnalysis> {
        let endpoint = Endpoint::Risk(region.to_string());
        Ok(self
            .read(endpoint, |body| payloads::parse_risk_analysis(body, region))
            .await?)
    }

    /// `GET /timeseries/{region}`.
    pub async fn fetch_timeseries(&self, region: &str) -> Result<Vec<TimeSeriesPoint>> {
        let endpoint = Endpoint::TimeSeries(region.to_string());
        Ok(self.read(endpoint, payloads::parse_timeseries).await?)
    }

    /// GET + parse for one endpoint. Failures are logged here, tagged with
    /// the endpoint, before being handed back to the caller.
    async fn read<T, F>(&self, endpoint: Endpoint, parse: F) -> std::result::Result<T, FetchFailure>
    where
        F: FnOnce(&str) -> std::result::Result<T, FetchCause>,
    {
        let path = endpoint.path();
        debug!(endpoint = %endpoint, path = %path, "collaborator GET");

        let outcome = match self.transport.get(&path).await {
            Ok(body) => parse(&body),
            Err(cause) => Err(cause),
        };

        outcome.map_err(|cause| {
            let failure = FetchFailure { endpoint, cause };
            logging::log_fetch_failure(&failure);
            failure
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
