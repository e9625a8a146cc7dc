//! Axum router wiring.
//!
//! Every route, `/metrics` included, runs inside the request instrumentation
//! middleware, so scrapes are counted like any other request.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, obs, ops, services};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(ops::health))
        .route("/predict", post(services::predict::predict))
        .route("/metrics", get(ops::metrics))
        .layer(middleware::from_fn_with_state(state.clone(), obs::middleware::track_requests))
        .with_state(state)
}
