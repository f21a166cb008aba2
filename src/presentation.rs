//! Loading/ready/error state for a polled view.
//!
//! `Loading` is entered once, at mount. The first successful cycle moves the
//! view to `Ready`. A failed cycle moves it to `Error` only while nothing has
//! ever succeeded; once data exists, a failure keeps `Ready` and the last
//! good view, and is only recorded in `last_error` and
//! `consecutive_failures`.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewStatus {
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationState<V> {
    status: ViewStatus,
    view: Option<V>,
    last_error: Option<String>,
    consecutive_failures: u32,
    last_success_at: Option<DateTime<Utc>>,
}

impl<V> Default for PresentationState<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PresentationState<V> {
    pub fn new() -> Self {
        Self {
            status: ViewStatus::Loading,
            view: None,
            last_error: None,
            consecutive_failures: 0,
            last_success_at: None,
        }
    }

    pub fn status(&self) -> ViewStatus {
        self.status
    }

    /// The last good view, if any cycle has ever succeeded.
    pub fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    /// Ready, but the view on display is from before the latest failure.
    pub fn is_degraded(&self) -> bool {
        self.status == ViewStatus::Ready && self.consecutive_failures > 0
    }

    pub fn on_success(&mut self, view: V, at: DateTime<Utc>) {
        self.view = Some(view);
        self.status = ViewStatus::Ready;
        self.last_error = None;
        self.consecutive_failures = 0;
        self.last_success_at = Some(at);
    }

    pub fn on_failure(&mut self, reason: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(reason.into());
        if self.view.is_none() {
            self.status = ViewStatus::Error;
        }
    }
}
