//! Router tests against an in-memory coordinator

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use torch_api::create_router;
use torch_cluster::{
    multiaddress, ExecTarget, PeerCoordinator, RemoteCommand, RemoteExecutor, RetryWorker,
};
use torch_core::cache::IdentityCache;
use torch_core::metrics::PrometheusSink;
use torch_core::{Config, Error, MutualPeersConfig, Result};

/// Every node resolves except `da-broken`
struct StaticExecutor;

#[async_trait]
impl RemoteExecutor for StaticExecutor {
    async fn exec(&self, target: &ExecTarget, command: &[String]) -> Result<String> {
        if target.node == "da-broken" {
            return Err(Error::Exec("container not ready".to_string()));
        }
        match RemoteCommand::from_argv(command) {
            Some(RemoteCommand::Identity { node_name, .. }) => {
                Ok(format!("{}\n", multiaddress(&node_name, &format!("ID-{node_name}"))))
            }
            Some(_) => Ok(String::new()),
            None => Err(Error::Exec("unexpected command".to_string())),
        }
    }
}

const PEERS: &str = r#"
mutualPeers:
  - consensusNode: "da-bridge-0"
    peers:
      - nodeName: "da-bridge-0"
        containerName: "da"
      - nodeName: "da-full-0"
        containerName: "da"
        exposeEnv: true
      - nodeName: "da-broken"
        containerName: "da"
"#;

fn app() -> Router {
    app_with_worker().0
}

/// Router plus the queue's worker, which must stay alive for enqueues
fn app_with_worker() -> (Router, RetryWorker) {
    let sink = PrometheusSink::with_gauge(prometheus_gauge());
    let (coordinator, worker) = PeerCoordinator::new(
        &Config::default(),
        Arc::new(MutualPeersConfig::from_yaml(PEERS).unwrap()),
        Arc::new(StaticExecutor),
        IdentityCache::in_memory("celestia"),
        Arc::new(sink),
    )
    .unwrap();
    (create_router(Arc::new(coordinator)), worker)
}

fn prometheus_gauge() -> prometheus::GaugeVec {
    prometheus::GaugeVec::new(
        prometheus::Opts::new("multiaddr", "api test gauge"),
        &["service_name", "node_name", "multiaddress", "namespace"],
    )
    .unwrap()
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_returns_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn config_returns_groups_in_envelope() {
    let (status, body) = send(&app(), Method::GET, "/api/v1/config", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], 200);
    assert!(body.get("errors").is_none());
    assert_eq!(
        body["body"]["mutualPeers"][0]["peers"][0]["nodeName"],
        "da-bridge-0"
    );
}

#[tokio::test]
async fn gen_resolves_single_node() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/gen",
        Some(json!({ "podName": "da-full-0" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["body"]["da-full-0"],
        "/dns/da-full-0/tcp/2121/p2p/ID-da-full-0"
    );

    let (status, body) = send(&app, Method::GET, "/api/v1/noId/da-full-0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["body"]["da-full-0"],
        "/dns/da-full-0/tcp/2121/p2p/ID-da-full-0"
    );

    let (_, body) = send(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(body["body"]["da-full-0"]["state"], "resolved");
}

#[tokio::test]
async fn gen_unknown_node_is_not_found() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/api/v1/gen",
        Some(json!({ "podName": "da-ghost" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert_eq!(body["body"], "da-ghost");
    assert!(body["errors"].is_string());
}

#[tokio::test]
async fn gen_resolution_failure_is_server_error() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/api/v1/gen",
        Some(json!({ "podName": "da-broken" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn gen_with_malformed_body_is_bad_request() {
    let (status, body) = send(
        &app(),
        Method::POST,
        "/api/v1/gen",
        Some(json!({ "name": "da-full-0" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn gen_all_leaves_out_unresolved_nodes() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/genAll",
        Some(json!({ "podName": ["da-bridge-0", "da-full-0", "da-broken"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let identities = body["body"].as_object().unwrap();
    assert_eq!(identities.len(), 2);
    assert!(identities.contains_key("da-bridge-0"));
    assert!(!identities.contains_key("da-broken"));

    let (_, body) = send(&app, Method::GET, "/api/v1/list", None).await;
    assert_eq!(body["body"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn enqueue_requeues_exhausted_node() {
    let (app, mut worker) = app_with_worker();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/enqueue",
        Some(json!({ "podName": "da-broken" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["da-broken"]["state"], "pending");

    for _ in 0..5 {
        worker.run_tick().await;
    }
    let (status, body) = send(&app, Method::GET, "/api/v1/noId/da-broken", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["errors"].as_str().unwrap().contains("exhausted"));

    let (_, body) = send(&app, Method::GET, "/api/v1/status", None).await;
    assert_eq!(body["body"]["da-broken"]["state"], "exhausted");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/enqueue",
        Some(json!({ "podName": "da-broken" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"]["da-broken"]["attempt"], 0);
}

#[tokio::test]
async fn enqueue_unknown_node_is_not_found() {
    let (app, _worker) = app_with_worker();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/enqueue",
        Some(json!({ "podName": "da-ghost" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["body"], "da-ghost");
}

#[tokio::test]
async fn unknown_identity_is_not_found() {
    let (status, body) = send(&app(), Method::GET, "/api/v1/noId/da-full-0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["body"], "da-full-0");
}

#[tokio::test]
async fn metrics_are_exposed_on_both_paths() {
    let app = app();
    // Touch the request counters so the registry is not empty
    send(&app, Method::GET, "/api/v1/config", None).await;

    for uri in ["/metrics", "/api/v1/metrics"] {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("http_requests_total"), "{uri}: {text}");
    }
}
