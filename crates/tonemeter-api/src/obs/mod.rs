//! Observability: the metrics registry, the declared API metrics, scrape-time
//! collectors, and the request instrumentation middleware.

pub mod api;
pub mod metrics;
pub mod middleware;
pub mod process;

pub use api::ApiMetrics;
pub use metrics::{Collector, MetricHandle, MetricKind, Registry};
