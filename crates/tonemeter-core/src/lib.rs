//! tonemeter core: the sentiment model and the shared error surface.
//!
//! This crate knows nothing about HTTP or metrics. It trains a tiny TF-IDF +
//! logistic regression classifier at construction time and exposes it through
//! the [`model::Classifier`] trait so the API crate can serve it (or any other
//! implementation) behind the same seam.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Fallible paths
//! surface as `TonemeterError`/`Result`.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod error;
pub mod model;

/// Shared result type.
pub use error::{Result, TonemeterError};
