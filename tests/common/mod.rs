//! Shared fake collaborator for the integration tests.

#![allow(dead_code)]

use aquaguard_monitor::Transport;
use aquaguard_monitor::model::FetchCause;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned bodies per path; unknown paths get a 404. Responses can be
/// swapped between cycles to script a sequence of collaborator states.
#[derive(Default)]
pub struct FakeCollaborator {
    responses: Mutex<HashMap<String, Result<String, FetchCause>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCollaborator {
    pub fn serve(&self, path: &str, body: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(path.to_string(), Ok(body.to_string()));
    }

    pub fn fail(&self, path: &str, cause: FetchCause) {
        self.responses.lock().unwrap().insert(path.to_string(), Err(cause));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl Transport for FakeCollaborator {
    async fn get(&self, path: &str) -> Result<String, FetchCause> {
        self.calls.lock().unwrap().push(path.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Err(FetchCause::Status(404)))
    }
}

pub fn snapshot_json(region: &str, timestamp: &str, consumption: f64, risk: f64) -> String {
    format!(
        r#"{{"region": "{}", "timestamp": "{}", "consumption": {}, "risk_score": {}, "risk_status": "normal", "risk_info": {{}}}}"#,
        region, timestamp, consumption, risk
    )
}

pub fn list(items: &[String]) -> String {
    format!("[{}]", items.join(","))
}
