//! AquaGuard monitor: polls the analytics collaborator for regional water
//! risk data, reconciles it per region, and keeps the live and ranking views
//! current.

pub mod alert;
pub mod analysis;
pub mod config;
pub mod dashboard;
pub mod history;
pub mod ingest;
pub mod live;
pub mod logging;
pub mod model;
pub mod presentation;
pub mod scheduler;
pub mod verify;

pub use ingest::collaborator::{Collaborator, LiveFetch, Transport};
pub use model::{MonitorError, Result};
