use super::with_session;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use swmutsel_core::code::GeneticCode;
use swmutsel_core::runner::ThreadPoolRunner;
use swmutsel_core::tree::Tree;
use swmutsel_core::FitnessStore;
use swmutsel_protocol::protocol::{AckResponse, SetFitnessStoreRequest, SetSitesRequest, SetTreeRequest};
use tracing::info;

fn ack(sites: usize) -> Json<AckResponse> {
    Json(AckResponse {
        status: "ok".to_string(),
        sites,
    })
}

/// Replaces the site list. Fitness and globals from a previous list are dropped.
pub async fn set_sites(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetSitesRequest>,
) -> AppResult<Json<AckResponse>> {
    let threads = state.threads;
    with_session(state, move |session| {
        if !(0.0..=1.0).contains(&payload.settings.clade_split) {
            return Err(AppError::Validation(format!(
                "clade_split must lie in [0, 1], got {}",
                payload.settings.clade_split
            )));
        }
        let code = Arc::new(GeneticCode::from_name(&payload.settings.genetic_code)?);
        for site in &payload.sites {
            code.check_pattern(site).map_err(|e| AppError::Validation(e.to_string()))?;
        }
        let count = payload.sites.len();
        let runner = ThreadPoolRunner::new(payload.sites, code.clone(), Arc::new(payload.settings), threads)?;
        info!("📥 Received {} sites", count);

        session.runner = Some(runner);
        session.code = Some(code);
        session.store = FitnessStore::default();
        session.globals = None;
        Ok(ack(count))
    })
    .await
}

pub async fn set_tree(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetTreeRequest>,
) -> AppResult<Json<AckResponse>> {
    let tree = Tree::from_spec(&payload.tree)?;
    with_session(state, move |session| {
        session.tree = Some(tree);
        let sites = session.runner.as_ref().map_or(0, |r| r.workload().sites().len());
        Ok(ack(sites))
    })
    .await
}

pub async fn set_fitness_store(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetFitnessStoreRequest>,
) -> AppResult<Json<AckResponse>> {
    with_session(state, move |session| {
        let runner = session.runner()?;
        let indices = runner.workload().site_indices();
        let store = payload.store.subset(&indices);
        let sites = store.len();
        session.store = store;
        Ok(ack(sites))
    })
    .await
}

/// The worker's current fitness vectors, as left by the last optimisation.
pub async fn get_fitness_store(State(state): State<Arc<AppState>>) -> AppResult<Json<FitnessStore>> {
    with_session(state, |session| Ok(Json(session.store.clone()))).await
}
