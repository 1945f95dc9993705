use super::with_session;
use crate::error::AppResult;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use swmutsel_core::runner::Runner;
use swmutsel_protocol::protocol::{AckResponse, BranchRequest, FitnessResponse, GlobalsRequest, LikelihoodResponse};
use tracing::debug;

/// Summed likelihood of this worker's sites under new mutation parameters.
pub async fn mutation_model(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GlobalsRequest>,
) -> AppResult<Json<LikelihoodResponse>> {
    with_session(state, move |session| {
        let globals = session.globals_for(payload.params)?;
        let tree = session.tree()?.clone();
        let store = session.store.clone();
        let log_likelihood = session.runner()?.log_likelihood(&tree, &store, &globals)?;
        Ok(Json(LikelihoodResponse { log_likelihood }))
    })
    .await
}

pub async fn optimise_fitness(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GlobalsRequest>,
) -> AppResult<Json<FitnessResponse>> {
    with_session(state, move |session| {
        let globals = session.globals_for(payload.params)?;
        let tree = session.tree()?.clone();
        let mut store = session.store.clone();
        let log_likelihood = session.runner()?.optimise_fitness(&tree, &globals, &mut store)?;
        debug!("Optimised {} sites: {:.4}", store.len(), log_likelihood);
        session.store = store.clone();
        Ok(Json(FitnessResponse { log_likelihood, store }))
    })
    .await
}

pub async fn update_calculators(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GlobalsRequest>,
) -> AppResult<Json<LikelihoodResponse>> {
    with_session(state, move |session| {
        let globals = session.globals_for(payload.params)?;
        let tree = session.tree()?.clone();
        let store = session.store.clone();
        let log_likelihood = session
            .runner()?
            .update_likelihood_calculators(&tree, &store, &globals)?;
        Ok(Json(LikelihoodResponse { log_likelihood }))
    })
    .await
}

pub async fn node_likelihood(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BranchRequest>,
) -> AppResult<Json<LikelihoodResponse>> {
    with_session(state, move |session| {
        let log_likelihood = session
            .runner()?
            .branch_likelihood(payload.node, payload.branch_length)?;
        Ok(Json(LikelihoodResponse { log_likelihood }))
    })
    .await
}

/// Commits a branch length to both the branch-stage calculators and the stored tree.
pub async fn set_branch_length(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BranchRequest>,
) -> AppResult<Json<AckResponse>> {
    with_session(state, move |session| {
        let runner = session.runner()?;
        runner.set_branch_length(payload.node, payload.branch_length)?;
        let sites = runner.site_count();
        if let Some(tree) = session.tree.as_mut() {
            tree.set_branch_length(payload.node, payload.branch_length)?;
        }
        Ok(Json(AckResponse {
            status: "ok".to_string(),
            sites,
        }))
    })
    .await
}
