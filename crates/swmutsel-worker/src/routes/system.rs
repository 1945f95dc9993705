use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sites: usize,
}

pub async fn root() -> &'static str {
    "swmutsel worker"
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    // A busy worker holds the lock for the whole round; report 0 rather than wait.
    let sites = state
        .session
        .try_lock()
        .ok()
        .and_then(|s| s.runner.as_ref().map(|r| r.workload().sites().len()))
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sites,
    })
}
