pub mod likelihood;
pub mod session;
pub mod system;

use crate::error::{AppError, AppResult};
use crate::state::{AppState, WorkerSession};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use swmutsel_protocol::protocol::routes;

pub fn system_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(system::root))
        .route(routes::HEALTH, get(system::health))
}

pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(routes::SITES, post(session::set_sites))
        .route(routes::TREE, post(session::set_tree))
        .route(
            routes::FITNESS_STORE,
            post(session::set_fitness_store).get(session::get_fitness_store),
        )
}

pub fn likelihood_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(routes::MUTATION_MODEL, post(likelihood::mutation_model))
        .route(routes::OPTIMISE_FITNESS, post(likelihood::optimise_fitness))
        .route(routes::CALCULATORS, post(likelihood::update_calculators))
        .route(routes::NODE_LIKELIHOOD, post(likelihood::node_likelihood))
        .route(routes::BRANCH_LENGTH, post(likelihood::set_branch_length))
}

/// Runs `f` on the blocking pool with the session locked. Site work is CPU
/// bound and must not stall the async runtime.
pub(crate) async fn with_session<T, F>(state: Arc<AppState>, f: F) -> AppResult<T>
where
    F: FnOnce(&mut WorkerSession) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut session = state.lock();
        f(&mut session)
    })
    .await
    .map_err(|e| AppError::Internal(format!("worker task failed: {}", e)))?
}
