/// Cycle-level data shaping for the monitoring views.
///
/// Risk scores, anomaly flags and priority rankings all arrive precomputed
/// from the analytics collaborator; nothing here recomputes them.
///
/// Submodules:
/// - `reconcile`: merges one live fetch per region and feeds the history buffer.
/// - `aggregate`: headline counts, totals and averages for a cycle.

pub mod aggregate;
pub mod reconcile;
