//! Prometheus metrics
//!
//! Everything registers into [`REGISTRY`], which the HTTP layer encodes for
//! `/metrics`.

use prometheus::{
    register_gauge_vec_with_registry, register_histogram_vec_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, GaugeVec, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, Registry, TextEncoder,
};
use std::sync::LazyLock;

use crate::models::MultiAddrEntry;
use crate::Result;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Known multiaddresses, one sample per registered entry
pub static MULTIADDR: LazyLock<GaugeVec> = LazyLock::new(|| {
    register_gauge_vec_with_registry!(
        "multiaddr",
        "Multiaddress of each DA node",
        &["service_name", "node_name", "multiaddress", "namespace"],
        REGISTRY.clone()
    )
    .expect("Failed to register MULTIADDR")
});

pub mod resolution {
    use super::{
        register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
        register_int_gauge_with_registry, HistogramVec, IntCounterVec, IntGauge, LazyLock,
        REGISTRY,
    };

    /// Resolutions by source (`cache`, `remote`) and outcome
    pub static RESOLUTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "torch_resolutions_total",
            "Total number of node identity resolutions",
            &["source", "outcome"],
            REGISTRY.clone()
        )
        .expect("Failed to register RESOLUTIONS_TOTAL")
    });

    pub static RESOLUTION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "torch_resolution_duration_seconds",
            "Remote identity resolution duration in seconds",
            &["outcome"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            REGISTRY.clone()
        )
        .expect("Failed to register RESOLUTION_DURATION")
    });

    /// Tasks waiting for the next retry tick
    pub static QUEUE_DEPTH: LazyLock<IntGauge> = LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "torch_retry_queue_depth",
            "Number of resolution tasks waiting for the next tick",
            REGISTRY.clone()
        )
        .expect("Failed to register QUEUE_DEPTH")
    });

    pub static RETRIES_EXHAUSTED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "torch_retries_exhausted_total",
            "Nodes dropped after spending their retry budget",
            &["node_name"],
            REGISTRY.clone()
        )
        .expect("Failed to register RETRIES_EXHAUSTED_TOTAL")
    });
}

pub mod mesh {
    use super::{register_int_counter_vec_with_registry, IntCounterVec, LazyLock, REGISTRY};

    /// Pair pushes by outcome
    pub static PUSHES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "torch_mesh_pushes_total",
            "Trusted-peer pushes between node pairs",
            &["outcome"],
            REGISTRY.clone()
        )
        .expect("Failed to register PUSHES_TOTAL")
    });
}

pub mod watcher {
    use super::{register_int_counter_with_registry, IntCounter, LazyLock, REGISTRY};

    pub static RECONNECTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter_with_registry!(
            "torch_watch_reconnects_total",
            "StatefulSet watch stream reconnects",
            REGISTRY.clone()
        )
        .expect("Failed to register RECONNECTS_TOTAL")
    });
}

pub mod http {
    use super::{
        register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
        HistogramVec, IntCounterVec, LazyLock, REGISTRY,
    };

    pub static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            "http_requests_total",
            "Total number of HTTP requests",
            &["method", "path", "status"],
            REGISTRY.clone()
        )
        .expect("Failed to register HTTP_REQUESTS_TOTAL")
    });

    pub static HTTP_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
        register_histogram_vec_with_registry!(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            &["method", "path"],
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
            REGISTRY.clone()
        )
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS")
    });
}

/// Encode every registered metric in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Serialization(format!("metrics output is not UTF-8: {e}")))
}

/// Destination for the full set of multiaddress entries
pub trait MetricSink: Send + Sync {
    /// Replace whatever was emitted before with `entries`
    fn emit(&self, entries: &[MultiAddrEntry]);
}

/// Writes entries into a `multiaddr`-shaped gauge vector
#[derive(Clone)]
pub struct PrometheusSink {
    gauge: GaugeVec,
}

impl PrometheusSink {
    /// Sink backed by the global [`MULTIADDR`] gauge
    #[must_use]
    pub fn global() -> Self {
        Self {
            gauge: MULTIADDR.clone(),
        }
    }

    #[must_use]
    pub const fn with_gauge(gauge: GaugeVec) -> Self {
        Self { gauge }
    }
}

impl MetricSink for PrometheusSink {
    fn emit(&self, entries: &[MultiAddrEntry]) {
        self.gauge.reset();
        for entry in entries {
            self.gauge
                .with_label_values(&entry.label_values())
                .set(entry.value);
        }
    }
}
