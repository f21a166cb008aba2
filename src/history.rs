//! Bounded per-region snapshot history for charting.
//!
//! Each region keeps at most `capacity` snapshots, oldest first. Appending to
//! a full series evicts from the front; nothing is ever re-sorted, so a
//! collaborator that delivers out-of-order timestamps gets them charted in
//! arrival order. There is no removal API: regions that stop reporting keep
//! their series until the owning view is torn down and the whole buffer is
//! dropped.

use crate::model::RegionSnapshot;
use std::collections::{HashMap, VecDeque};

/// Default number of snapshots kept per region.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Allowed range for the per-region capacity.
pub const MIN_HISTORY_CAPACITY: usize = 20;
pub const MAX_HISTORY_CAPACITY: usize = 30;

static EMPTY_SERIES: VecDeque<RegionSnapshot> = VecDeque::new();

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    series: HashMap<String, VecDeque<RegionSnapshot>>,
    /// Regions in first-seen order, so iteration is stable across cycles.
    order: Vec<String>,
}

impl HistoryBuffer {
    /// Creates an empty buffer. A capacity of zero is raised to one so every
    /// append leaves the newest snapshot readable.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `snapshot` as the newest entry of its region's series,
    /// evicting the oldest entry if the series is full.
    pub fn append(&mut self, snapshot: RegionSnapshot) {
        if !self.series.contains_key(&snapshot.region) {
            self.order.push(snapshot.region.clone());
        }
        let capacity = self.capacity;
        let series = self
            .series
            .entry(snapshot.region.clone())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        if series.len() >= capacity {
            series.pop_front();
        }
        series.push_back(snapshot);
    }

    /// The region's series, oldest first. Empty for regions never seen.
    pub fn read(&self, region: &str) -> &VecDeque<RegionSnapshot> {
        self.series.get(region).unwrap_or(&EMPTY_SERIES)
    }

    pub fn len(&self, region: &str) -> usize {
        self.read(region).len()
    }

    pub fn newest(&self, region: &str) -> Option<&RegionSnapshot> {
        self.read(region).back()
    }

    /// Regions with at least one snapshot, in first-seen order.
    pub fn regions(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn region_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
