//! Prometheus scrape endpoint and path normalization for request labels

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::http::{AppError, AppState};

/// `/metrics` plus the `/api/v1/metrics` alias
pub fn create_metrics_router() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/metrics", get(metrics_handler))
}

pub async fn metrics_handler() -> Result<impl IntoResponse, AppError> {
    let body = torch_core::metrics::gather_metrics()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Collapse node names in paths so request labels stay bounded
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut result = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        let prev = if i > 0 { segments.get(i - 1) } else { None };
        if !segment.is_empty() && prev == Some(&"noId") {
            result.push(":node");
        } else {
            result.push(segment);
        }
    }

    result.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v1/noId/da-bridge-0"), "/api/v1/noId/:node");
        assert_eq!(normalize_path("/api/v1/genAll"), "/api/v1/genAll");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }
}
