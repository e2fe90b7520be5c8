//! Node identity endpoints
//!
//! Request bodies name nodes through a `podName` field; a single name for
//! `/gen` and `/enqueue`, a list for `/genAll`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;

use torch_core::{MutualPeersConfig, ResolutionStatus};

use super::envelope::Envelope;
use super::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct GenRequest {
    #[serde(rename = "podName")]
    pub pod_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GenAllRequest {
    #[serde(rename = "podName")]
    pub pod_names: Vec<String>,
}

pub fn create_node_router() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/list", get(list_identities))
        .route("/noId/{node_name}", get(get_identity))
        .route("/status", get(get_statuses))
        .route("/gen", post(generate))
        .route("/genAll", post(generate_all))
        .route("/enqueue", post(enqueue))
}

/// Loaded mutual-peer groups
pub async fn get_config(State(state): State<AppState>) -> Envelope<MutualPeersConfig> {
    Envelope::ok(state.coordinator.peers().clone())
}

pub async fn list_identities(State(state): State<AppState>) -> Envelope<BTreeMap<String, String>> {
    Envelope::ok(state.coordinator.identities().await)
}

pub async fn get_identity(
    State(state): State<AppState>,
    Path(node_name): Path<String>,
) -> AppResult<Envelope<BTreeMap<String, String>>> {
    let address = state
        .coordinator
        .identity(&node_name)
        .await
        .map_err(|e| AppError::from(e).with_body(node_name.clone()))?;
    Ok(Envelope::ok(BTreeMap::from([(node_name, address)])))
}

pub async fn get_statuses(
    State(state): State<AppState>,
) -> Envelope<BTreeMap<String, ResolutionStatus>> {
    Envelope::ok(state.coordinator.statuses())
}

/// Resolve one node and push its address to opted-in peers when it leads a group
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenRequest>, JsonRejection>,
) -> AppResult<Envelope<BTreeMap<String, String>>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    tracing::info!(node = %request.pod_name, "Generating identity");

    let address = state
        .coordinator
        .generate(&request.pod_name)
        .await
        .map_err(|e| AppError::from(e).with_body(request.pod_name.clone()))?;

    Ok(Envelope::ok(BTreeMap::from([(request.pod_name, address)])))
}

/// Resolve a batch and mesh it within its groups
///
/// Nodes that could not be resolved are left out of the body.
pub async fn generate_all(
    State(state): State<AppState>,
    payload: Result<Json<GenAllRequest>, JsonRejection>,
) -> AppResult<Envelope<BTreeMap<String, String>>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;
    tracing::info!(nodes = ?request.pod_names, "Generating identities for batch");

    let outcome = state.coordinator.generate_all(&request.pod_names).await;
    if !outcome.unresolved.is_empty() {
        tracing::warn!(
            unresolved = outcome.unresolved.len(),
            failed_pushes = outcome.failed.len(),
            "Batch finished with unresolved nodes"
        );
    }

    let mut identities = outcome.identities;
    identities.retain(|_, address| !address.is_empty());
    Ok(Envelope::ok(identities))
}

/// Queue a node for background resolution with a fresh retry budget
///
/// The way back for a node that exhausted its retries.
pub async fn enqueue(
    State(state): State<AppState>,
    payload: Result<Json<GenRequest>, JsonRejection>,
) -> AppResult<Envelope<BTreeMap<String, ResolutionStatus>>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request(e.body_text()))?;

    state
        .coordinator
        .enqueue(&request.pod_name)
        .await
        .map_err(|e| AppError::from(e).with_body(request.pod_name.clone()))?;

    let status = state
        .coordinator
        .statuses()
        .remove(&request.pod_name)
        .unwrap_or(ResolutionStatus::Pending { attempt: 0 });
    Ok(Envelope::ok(BTreeMap::from([(request.pod_name, status)])))
}
