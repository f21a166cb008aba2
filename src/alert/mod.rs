//! Risk classification and data-quality flags.
//!
//! Submodules:
//! - `thresholds`: the live-view and historical-dashboard risk buckets.
//! - `stalenesses`: detects regions whose latest live reading is out of date.

pub mod stalenesses;
pub mod thresholds;
