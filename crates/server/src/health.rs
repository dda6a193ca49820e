use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pharmai_core::config::AgentMode;
use pharmai_core::dataset::Dataset;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    dataset: Arc<Dataset>,
    mode: AgentMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatasetHealth {
    pub status: &'static str,
    pub medications: usize,
    pub users: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub status: &'static str,
    pub service: HealthCheck,
    pub dataset: DatasetHealth,
    pub checked_at: String,
}

pub fn router(dataset: Arc<Dataset>, mode: AgentMode) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { dataset, mode })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let dataset = dataset_check(&state.dataset);
    let ready = dataset.status == "ready";
    let mode = match state.mode {
        AgentMode::Pipeline => "pipeline",
        AgentMode::ToolCalling => "tool_calling",
    };

    let payload = HealthResponse {
        ok: ready,
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("pharmai-server runtime initialized in {mode} mode"),
        },
        dataset,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn dataset_check(dataset: &Dataset) -> DatasetHealth {
    let medications = dataset.medications().len();
    let users = dataset.users().len();
    let consistent = medications > 0 && dataset.validate().is_empty();
    DatasetHealth { status: if consistent { "ready" } else { "degraded" }, medications, users }
}
