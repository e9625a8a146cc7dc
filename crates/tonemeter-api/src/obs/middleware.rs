//! Request instrumentation middleware.
//!
//! Every request holds an [`InFlight`] guard for the duration of the
//! downstream call. The guard increments `api_inprogress_requests` when it is
//! created and records latency, the final status, and the gauge decrement when
//! it is dropped, so a handler that panics or a request future that is
//! cancelled is still accounted for (with status 500).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::app_state::AppState;

use super::api::ApiMetrics;

/// Status recorded when the handler never produced a response.
pub const STATUS_UNFINISHED: u16 = 500;

/// One in-progress request.
pub struct InFlight {
    metrics: Arc<ApiMetrics>,
    endpoint: String,
    method: String,
    status: u16,
    started: Instant,
}

impl InFlight {
    pub fn begin(metrics: Arc<ApiMetrics>, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        metrics.inprogress.inc(&[]);
        Self {
            metrics,
            endpoint: endpoint.into(),
            method: method.into(),
            status: STATUS_UNFINISHED,
            started: Instant::now(),
        }
    }

    /// Record the status the handler actually returned.
    pub fn complete(&mut self, status: u16) {
        self.status = status;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let status = self.status.to_string();

        self.metrics.inprogress.dec(&[]);
        self.metrics
            .request_latency
            .observe(&[self.endpoint.as_str(), self.method.as_str()], elapsed);
        self.metrics
            .requests_total
            .inc(&[self.endpoint.as_str(), self.method.as_str(), status.as_str()]);

        tracing::debug!(
            endpoint = %self.endpoint,
            method = %self.method,
            status = self.status,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "request finished"
        );
    }
}

/// axum middleware: wrap the downstream handler in an [`InFlight`] guard.
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut guard = InFlight::begin(state.metrics(), req.uri().path(), req.method().as_str());
    let response = next.run(req).await;
    guard.complete(response.status().as_u16());
    response
}
