//! tonemeter API library entry.
//!
//! Wires the sentiment model, the metrics registry, and the request
//! instrumentation middleware into an axum router. Consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod obs;
pub mod ops;
pub mod router;
pub mod services;
