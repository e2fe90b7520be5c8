//! HTTP surface
//!
//! Node endpoints live under `/api/v1`; health and scrape endpoints sit at
//! the root.

pub mod envelope;
pub mod error;
pub mod health;
pub mod nodes;

use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use torch_cluster::PeerCoordinator;

use crate::observability::{metrics, metrics_middleware};

pub use envelope::Envelope;
pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<PeerCoordinator>,
}

/// Create the HTTP router with all routes
pub fn create_router(coordinator: Arc<PeerCoordinator>) -> Router {
    let state = AppState { coordinator };

    let router = Router::new()
        .merge(health::create_health_router())
        .merge(metrics::create_metrics_router())
        .nest("/api/v1", nodes::create_node_router());

    // Apply layers before state
    let router = router
        .layer(middleware::from_fn(metrics_middleware::metrics_layer))
        .layer(TraceLayer::new_for_http());

    router.with_state(state)
}
