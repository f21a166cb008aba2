//! Collaborator wire formats and the parse boundary.
//!
//! The analytics service emits snake_case JSON with loosely-typed fields
//! (severity casing varies, `risk_info` may be `{}`, timestamps may lack an
//! offset). Every payload is decoded into a `Wire*` struct here and then
//! validated and defaulted into the `model` types, so nothing downstream
//! has to second-guess a record. camelCase aliases are accepted for each
//! multi-word field.

use crate::alert::thresholds::classify_historical;
use crate::model::{
    ElevatedRiskEvent, FetchCause, RegionRanking, RegionSnapshot, RiskAnalysis, RiskInfo,
    RiskLevel, RiskStatus, RiskTrend, Severity, TimeSeriesPoint,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

// ============================================================================
// Wire structures
// ============================================================================

/// One entry of `GET /live/current`.
#[derive(Debug, Deserialize)]
pub struct WireSnapshot {
    pub region: String,
    pub timestamp: String,
    pub consumption: f64,
    #[serde(alias = "riskScore")]
    pub risk_score: f64,
    #[serde(alias = "riskStatus")]
    pub risk_status: String,
    #[serde(default, alias = "riskInfo")]
    pub risk_info: Option<WireRiskInfo>,
}

/// `risk_info` block. The simulator sends `{}` for regions with no active
/// elevation, so every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct WireRiskInfo {
    #[serde(default, rename = "type", alias = "patternType")]
    pub pattern_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, alias = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, alias = "durationHours")]
    pub duration_hours: Option<f64>,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// One row of `GET /live/ranking` or `GET /ranking`.
#[derive(Debug, Deserialize)]
pub struct WireRanking {
    pub region: String,
    #[serde(default, alias = "currentRisk")]
    pub current_risk: f64,
    #[serde(default, alias = "recentPeakRisk")]
    pub recent_peak_risk: f64,
    #[serde(default, alias = "riskLevel")]
    pub risk_level: Option<String>,
    #[serde(default, alias = "persistenceDays")]
    pub persistence_days: u32,
    #[serde(default, alias = "priorityScore")]
    pub priority_score: f64,
    #[serde(alias = "inspectionPriority")]
    pub inspection_priority: u32,
    #[serde(default, alias = "riskStatus")]
    pub risk_status: Option<String>,
    #[serde(default, alias = "lastUpdated")]
    pub last_updated: Option<String>,
}

/// One entry of `GET /live/elevated`.
#[derive(Debug, Deserialize)]
pub struct WireElevated {
    pub region: String,
    #[serde(default, rename = "type", alias = "patternType")]
    pub pattern_type: String,
    #[serde(alias = "startTime")]
    pub start_time: String,
    #[serde(default, alias = "estimatedEnd")]
    pub estimated_end: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub pattern: String,
}

/// One day of `GET /timeseries/{region}`.
#[derive(Debug, Deserialize)]
pub struct WireTimeSeriesPoint {
    pub date: String,
    #[serde(default, alias = "actualUsage")]
    pub actual_usage: f64,
    #[serde(default, alias = "predictedUsage")]
    pub predicted_usage: f64,
    #[serde(default, alias = "riskScore")]
    pub risk_score: f64,
    #[serde(default, alias = "isAnomaly")]
    pub is_anomaly: bool,
}

/// `GET /risk/{region}`.
#[derive(Debug, Deserialize)]
pub struct WireRiskAnalysis {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, alias = "currentRiskScore")]
    pub current_risk_score: f64,
    #[serde(default, alias = "recentPeakRisk")]
    pub recent_peak_risk: f64,
    #[serde(default, alias = "averageRisk7d")]
    pub average_risk_7d: f64,
    #[serde(default, alias = "recentAnomalies30d")]
    pub recent_anomalies_30d: u32,
    #[serde(default, alias = "riskTrend")]
    pub risk_trend: Option<String>,
    #[serde(default, alias = "lastUpdated")]
    pub last_updated: Option<String>,
}

// ============================================================================
// Payload parsers
// ============================================================================

pub fn parse_current(body: &str) -> Result<Vec<RegionSnapshot>, FetchCause> {
    let wire: Vec<WireSnapshot> = decode(body)?;
    wire.into_iter().map(snapshot_from_wire).collect()
}

pub fn parse_ranking(body: &str) -> Result<Vec<RegionRanking>, FetchCause> {
    let wire: Vec<WireRanking> = decode(body)?;
    wire.into_iter().map(ranking_from_wire).collect()
}

pub fn parse_elevated(body: &str) -> Result<Vec<ElevatedRiskEvent>, FetchCause> {
    let wire: Vec<WireElevated> = decode(body)?;
    wire.into_iter().map(elevated_from_wire).collect()
}

pub fn parse_regions(body: &str) -> Result<Vec<String>, FetchCause> {
    decode(body)
}

pub fn parse_timeseries(body: &str) -> Result<Vec<TimeSeriesPoint>, FetchCause> {
    let wire: Vec<WireTimeSeriesPoint> = decode(body)?;
    wire.into_iter()
        .map(|point| {
            let date = parse_timestamp(&point.date)
                .ok_or_else(|| malformed(format!("unparseable date '{}'", point.date)))?;
            Ok(TimeSeriesPoint {
                date,
                actual_usage: point.actual_usage,
                predicted_usage: point.predicted_usage,
                risk_score: clamp_score(point.risk_score, &format!("date {}", point.date))?,
                is_anomaly: point.is_anomaly,
            })
        })
        .collect()
}

/// Parses a risk analysis. `region` fills in a payload that omits its own
/// region field.
pub fn parse_risk_analysis(body: &str, region: &str) -> Result<RiskAnalysis, FetchCause> {
    let wire: WireRiskAnalysis = decode(body)?;
    let risk_trend = match wire.risk_trend.as_deref().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("increasing") => RiskTrend::Increasing,
        Some(t) if t.eq_ignore_ascii_case("decreasing") => RiskTrend::Decreasing,
        _ => RiskTrend::Unknown,
    };
    Ok(RiskAnalysis {
        region: wire
            .region
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| region.to_string()),
        current_risk_score: wire.current_risk_score,
        recent_peak_risk: wire.recent_peak_risk,
        average_risk_7d: wire.average_risk_7d,
        recent_anomalies_30d: wire.recent_anomalies_30d,
        risk_trend,
        last_updated: wire.last_updated.as_deref().and_then(parse_timestamp),
    })
}

// ============================================================================
// Record conversion
// ============================================================================

fn snapshot_from_wire(wire: WireSnapshot) -> Result<RegionSnapshot, FetchCause> {
    let region = require_region(wire.region)?;
    let timestamp = parse_timestamp(&wire.timestamp).ok_or_else(|| {
        malformed(format!("region {}: unparseable timestamp '{}'", region, wire.timestamp))
    })?;
    if !wire.consumption.is_finite() || wire.consumption < 0.0 {
        return Err(malformed(format!(
            "region {}: consumption must be non-negative, got {}",
            region, wire.consumption
        )));
    }
    let risk_status = parse_risk_status(&wire.risk_status).ok_or_else(|| {
        malformed(format!("region {}: unknown risk_status '{}'", region, wire.risk_status))
    })?;
    Ok(RegionSnapshot {
        timestamp,
        consumption: wire.consumption,
        risk_score: clamp_score(wire.risk_score, &format!("region {}", region))?,
        risk_status,
        risk_info: wire.risk_info.and_then(risk_info_from_wire),
        region,
    })
}

fn risk_info_from_wire(wire: WireRiskInfo) -> Option<RiskInfo> {
    let info = RiskInfo {
        pattern_type: wire.pattern_type.filter(|s| !s.is_empty()),
        severity: wire.severity.as_deref().and_then(parse_severity),
        start_time: wire.start_time.as_deref().and_then(parse_timestamp),
        duration_hours: wire.duration_hours.filter(|h| h.is_finite()),
        pattern: wire.pattern.filter(|s| !s.is_empty()),
    };
    let empty = info.pattern_type.is_none()
        && info.severity.is_none()
        && info.start_time.is_none()
        && info.duration_hours.is_none()
        && info.pattern.is_none();
    if empty { None } else { Some(info) }
}

fn ranking_from_wire(wire: WireRanking) -> Result<RegionRanking, FetchCause> {
    let region = require_region(wire.region)?;
    if wire.inspection_priority == 0 {
        return Err(malformed(format!(
            "region {}: inspection_priority must be a positive rank",
            region
        )));
    }
    let recent_peak_risk = clamp_score(wire.recent_peak_risk, &format!("region {}", region))?;
    // Upstream derives the level from the 14-day peak with the dashboard
    // thresholds; reproduce that when the field is missing.
    let risk_level = match wire.risk_level.as_deref() {
        Some(raw) => parse_risk_level(raw)
            .ok_or_else(|| malformed(format!("region {}: unknown risk_level '{}'", region, raw)))?,
        None => classify_historical(recent_peak_risk),
    };
    Ok(RegionRanking {
        current_risk: clamp_score(wire.current_risk, &format!("region {}", region))?,
        recent_peak_risk,
        risk_level,
        persistence_days: wire.persistence_days,
        priority_score: wire.priority_score,
        inspection_priority: wire.inspection_priority,
        risk_status: wire.risk_status.as_deref().and_then(parse_risk_status),
        last_updated: wire.last_updated.as_deref().and_then(parse_timestamp),
        region,
    })
}

fn elevated_from_wire(wire: WireElevated) -> Result<ElevatedRiskEvent, FetchCause> {
    let region = require_region(wire.region)?;
    let start_time = parse_timestamp(&wire.start_time).ok_or_else(|| {
        malformed(format!("region {}: unparseable start_time '{}'", region, wire.start_time))
    })?;
    let severity = parse_severity(&wire.severity).ok_or_else(|| {
        malformed(format!("region {}: unknown severity '{}'", region, wire.severity))
    })?;
    Ok(ElevatedRiskEvent {
        pattern_type: wire.pattern_type,
        start_time,
        estimated_end: wire.estimated_end.as_deref().and_then(parse_timestamp),
        severity,
        pattern: wire.pattern,
        region,
    })
}

// ============================================================================
// Field helpers
// ============================================================================

/// Parses an RFC 3339 timestamp, a naive ISO-8601 date-time (taken as UTC),
/// or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        _ => None,
    }
}

pub fn parse_risk_level(raw: &str) -> Option<RiskLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" => Some(RiskLevel::Low),
        "medium" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

pub fn parse_risk_status(raw: &str) -> Option<RiskStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(RiskStatus::Normal),
        "elevated" => Some(RiskStatus::Elevated),
        "new_elevation" => Some(RiskStatus::NewElevation),
        _ => None,
    }
}

fn clamp_score(score: f64, context: &str) -> Result<f64, FetchCause> {
    if !score.is_finite() {
        return Err(malformed(format!("{}: non-finite risk score", context)));
    }
    Ok(score.clamp(0.0, 100.0))
}

fn require_region(region: String) -> Result<String, FetchCause> {
    if region.trim().is_empty() {
        Err(malformed("empty region identifier".to_string()))
    } else {
        Ok(region)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, FetchCause> {
    serde_json::from_str(body).map_err(|e| malformed(e.to_string()))
}

fn malformed(msg: String) -> FetchCause {
    FetchCause::Malformed(msg)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_current_payload_from_simulator_shape() {
        let body = r#"[
            {"region": "East", "timestamp": "2024-05-01T12:00:00.123456",
             "consumption": 23456.78, "risk_status": "elevated", "risk_score": 74.2,
             "risk_info": {"multiplier": 1.6, "duration_hours": 120, "pattern": "persistent",
                           "severity": "high", "start_time": "2024-04-29T12:00:00",
                           "type": "persistent"}},
            {"region": "North", "timestamp": "2024-05-01T12:00:00+00:00",
             "consumption": 11000.0, "risk_status": "normal", "risk_score": 22.0,
             "risk_info": {}}
        ]"#;
        let snapshots = parse_current(body).expect("simulator payload should parse");
        assert_eq!(snapshots.len(), 2);

        let east = &snapshots[0];
        assert_eq!(east.region, "East");
        assert_eq!(east.risk_status, RiskStatus::Elevated);
        let info = east.risk_info.as_ref().expect("East has risk info");
        assert_eq!(info.pattern_type.as_deref(), Some("persistent"));
        assert_eq!(info.severity, Some(Severity::High));
        assert_eq!(info.duration_hours, Some(120.0));
        assert_eq!(
            info.start_time,
            Some(Utc.with_ymd_and_hms(2024, 4, 29, 12, 0, 0).unwrap())
        );

        // `{}` means no active elevation, not an error.
        assert!(snapshots[1].risk_info.is_none());
    }

    #[test]
    fn test_missing_risk_info_defaults_to_absent() {
        let body = r#"[{"region": "North", "timestamp": "2024-05-01T12:00:00Z",
                        "consumption": 0, "risk_status": "normal", "risk_score": 0}]"#;
        let snapshots = parse_current(body).unwrap();
        assert!(snapshots[0].risk_info.is_none());
        assert_eq!(snapshots[0].consumption, 0.0);
    }

    #[test]
    fn test_camel_case_aliases_are_accepted() {
        let body = r#"[{"region": "North", "timestamp": "2024-05-01T12:00:00Z",
                        "consumption": 10, "riskStatus": "new_elevation", "riskScore": 51.5,
                        "riskInfo": {"patternType": "sudden", "severity": "Medium"}}]"#;
        let snapshots = parse_current(body).unwrap();
        assert_eq!(snapshots[0].risk_status, RiskStatus::NewElevation);
        assert_eq!(snapshots[0].risk_score, 51.5);
        let info = snapshots[0].risk_info.as_ref().unwrap();
        assert_eq!(info.pattern_type.as_deref(), Some("sudden"));
        assert_eq!(info.severity, Some(Severity::Medium));
    }

    #[test]
    fn test_empty_lists_are_valid() {
        assert!(parse_current("[]").unwrap().is_empty());
        assert!(parse_ranking("[]").unwrap().is_empty());
        assert!(parse_elevated("[]").unwrap().is_empty());
        assert!(parse_regions("[]").unwrap().is_empty());
    }

    #[test]
    fn test_non_array_body_is_malformed() {
        let result = parse_current(r#"{"detail": "Not Found"}"#);
        assert!(matches!(result, Err(FetchCause::Malformed(_))), "got {:?}", result);
        assert!(matches!(parse_regions("<html>"), Err(FetchCause::Malformed(_))));
    }

    #[test]
    fn test_negative_consumption_is_malformed() {
        let body = r#"[{"region": "North", "timestamp": "2024-05-01T12:00:00Z",
                        "consumption": -5, "risk_status": "normal", "risk_score": 10}]"#;
        assert!(matches!(parse_current(body), Err(FetchCause::Malformed(_))));
    }

    #[test]
    fn test_risk_score_is_clamped_into_range() {
        let body = r#"[{"region": "North", "timestamp": "2024-05-01T12:00:00Z",
                        "consumption": 5, "risk_status": "normal", "risk_score": 104.5}]"#;
        assert_eq!(parse_current(body).unwrap()[0].risk_score, 100.0);
    }

    #[test]
    fn test_unknown_risk_status_is_malformed() {
        let body = r#"[{"region": "North", "timestamp": "2024-05-01T12:00:00Z",
                        "consumption": 5, "risk_status": "panic", "risk_score": 10}]"#;
        assert!(matches!(parse_current(body), Err(FetchCause::Malformed(_))));
    }

    #[test]
    fn test_ranking_row_from_summary_endpoint() {
        let body = r#"[{"region": "East", "current_risk": 64.1, "recent_peak_risk": 78.3,
                        "risk_level": "High", "persistence_days": 5, "priority_score": 67.5,
                        "inspection_priority": 1}]"#;
        let rows = parse_ranking(body).unwrap();
        assert_eq!(rows[0].risk_level, RiskLevel::High);
        assert_eq!(rows[0].inspection_priority, 1);
        assert!(rows[0].risk_status.is_none());
        assert!(rows[0].last_updated.is_none());
    }

    #[test]
    fn test_missing_risk_level_is_derived_from_peak() {
        let body = r#"[{"region": "West", "current_risk": 30, "recent_peak_risk": 45,
                        "priority_score": 40, "inspection_priority": 2}]"#;
        assert_eq!(parse_ranking(body).unwrap()[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_zero_inspection_priority_is_malformed() {
        let body = r#"[{"region": "West", "risk_level": "Low", "inspection_priority": 0}]"#;
        assert!(matches!(parse_ranking(body), Err(FetchCause::Malformed(_))));
    }

    #[test]
    fn test_elevated_event_with_lowercase_severity() {
        let body = r#"[{"region": "West", "type": "gradual", "start_time": "2024-04-30T12:00:00",
                        "estimated_end": "2024-05-03T12:00:00", "severity": "medium",
                        "pattern": "increasing"}]"#;
        let events = parse_elevated(body).unwrap();
        assert_eq!(events[0].severity, Severity::Medium);
        assert_eq!(events[0].pattern_type, "gradual");
        assert!(events[0].estimated_end.is_some());
    }

    #[test]
    fn test_timeseries_defaults_missing_numbers_to_zero() {
        let body = r#"[{"date": "2023-01-25T00:00:00", "actual_usage": 12000.5},
                       {"date": "2023-01-26", "is_anomaly": true}]"#;
        let points = parse_timeseries(body).unwrap();
        assert_eq!(points[0].predicted_usage, 0.0);
        assert!(!points[0].is_anomaly);
        assert!(points[1].is_anomaly);
        assert_eq!(points[1].date, Utc.with_ymd_and_hms(2023, 1, 26, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_timeseries_risk_scores_are_clamped() {
        let body = r#"[{"date": "2023-01-25", "risk_score": 130.0},
                       {"date": "2023-01-26", "risk_score": -4.0}]"#;
        let points = parse_timeseries(body).unwrap();
        assert_eq!(points[0].risk_score, 100.0);
        assert_eq!(points[1].risk_score, 0.0);
    }

    #[test]
    fn test_risk_analysis_fills_region_and_trend() {
        let body = r#"{"current_risk_score": 71.2, "recent_peak_risk": 80.0,
                       "average_risk_7d": 60.5, "recent_anomalies_30d": 4,
                       "risk_trend": "increasing", "last_updated": "2023-03-01T00:00:00"}"#;
        let analysis = parse_risk_analysis(body, "East").unwrap();
        assert_eq!(analysis.region, "East");
        assert_eq!(analysis.risk_trend, RiskTrend::Increasing);
        assert_eq!(analysis.recent_anomalies_30d, 4);
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T13:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T08:00:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T13:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 13:00:00"), Some(expected));
        assert!(parse_timestamp("not-a-datetime").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
