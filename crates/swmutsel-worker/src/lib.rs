//! HTTP worker serving a share of the sites of a distributed estimation.

pub mod error;
pub mod routes;
pub mod state;

use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Site lists and fitness stores of large alignments exceed axum's default limit.
pub const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    routes::system_routes()
        .merge(routes::session_routes())
        .merge(routes::likelihood_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves on an already bound listener until the task is dropped.
pub async fn serve_listener(listener: TcpListener, threads: usize) -> std::io::Result<()> {
    let state = Arc::new(AppState::new(threads));
    info!("🚀 Worker listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

pub async fn serve(addr: SocketAddr, threads: usize) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(listener, threads).await
}
