//! Live snapshot staleness detection.
//!
//! The live view polls every 10 seconds, but a region can silently drop out
//! of `/live/current` while its history buffer is kept for charting
//! continuity. This module lets the view flag those regions instead of
//! presenting their last reading as current.
//!
//! # Clock injection
//! All functions accept a `now: DateTime<Utc>` parameter rather than calling
//! `Utc::now()` internally, so staleness is deterministic in tests.

use crate::history::HistoryBuffer;
use crate::model::RegionSnapshot;
use chrono::{DateTime, Duration, Utc};

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if the snapshot is older than `max_age_secs` relative to
/// `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_secs  →  stale
///   age == max_age_secs →  not stale
///
/// Snapshots stamped in the future (collaborator clock skew) are not stale.
pub fn is_stale_at(snapshot: &RegionSnapshot, max_age_secs: u64, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(snapshot.timestamp);
    age > Duration::seconds(max_age_secs as i64)
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(snapshot: &RegionSnapshot, max_age_secs: u64) -> bool {
    is_stale_at(snapshot, max_age_secs, Utc::now())
}

/// Regions whose newest buffered snapshot is stale, in buffer order.
pub fn stale_regions(history: &HistoryBuffer, max_age_secs: u64, now: DateTime<Utc>) -> Vec<String> {
    history
        .regions()
        .filter(|region| {
            history
                .newest(region)
                .map(|s| is_stale_at(s, max_age_secs, now))
                .unwrap_or(false)
        })
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
