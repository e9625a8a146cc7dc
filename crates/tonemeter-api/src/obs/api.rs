//! Metrics declared by the API surface.

use std::sync::Arc;

use tonemeter_core::error::{Result, TonemeterError};

use super::metrics::{CounterVec, GaugeVec, HistogramVec, Registry};
use super::process::{BuildInfoCollector, ProcessCollector};

pub const REQUESTS_TOTAL: &str = "api_requests_total";
pub const REQUEST_LATENCY_SECONDS: &str = "api_request_latency_seconds";
pub const INPROGRESS_REQUESTS: &str = "api_inprogress_requests";
pub const INFERENCE_LATENCY_SECONDS: &str = "model_inference_latency_seconds";

/// Handles to the declared API metrics plus the registry they live in.
pub struct ApiMetrics {
    registry: Arc<Registry>,
    /// Labels: `endpoint`, `method`, `http_status`.
    pub requests_total: Arc<CounterVec>,
    /// Labels: `endpoint`, `method`.
    pub request_latency: Arc<HistogramVec>,
    pub inprogress: Arc<GaugeVec>,
    pub inference_latency: Arc<HistogramVec>,
}

impl ApiMetrics {
    /// Register the API metrics and the default collectors into `registry`.
    pub fn register(registry: Arc<Registry>, buckets: &[f64]) -> Result<Self> {
        install_default_collectors(&registry);

        let requests_total = registry.counter(
            REQUESTS_TOTAL,
            "Total number of HTTP requests",
            &["endpoint", "method", "http_status"],
        )?;
        let request_latency = registry.histogram(
            REQUEST_LATENCY_SECONDS,
            "Request latency in seconds",
            &["endpoint", "method"],
            buckets,
        )?;
        let inprogress = registry.gauge(INPROGRESS_REQUESTS, "Number of in-progress HTTP requests", &[])?;
        let inference_latency = registry.histogram(
            INFERENCE_LATENCY_SECONDS,
            "Model inference latency in seconds",
            &[],
            buckets,
        )?;

        Ok(Self { registry, requests_total, request_latency, inprogress, inference_latency })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exposition text for `/metrics`.
    pub fn render(&self) -> String {
        self.registry.render()
    }
}

/// Register process and build-info collectors, tolerating ones already present.
pub fn install_default_collectors(registry: &Registry) {
    let collectors: [Arc<dyn super::Collector>; 2] =
        [Arc::new(ProcessCollector::new()), Arc::new(BuildInfoCollector::new())];
    for c in collectors {
        let name = c.name();
        match registry.register_collector(c) {
            Ok(()) => {}
            Err(TonemeterError::RegistrationConflict { .. }) => {
                tracing::info!(collector = name, "collector already registered; skipping");
            }
            Err(e) => tracing::warn!(collector = name, error = %e, "collector registration failed"),
        }
    }
}
