//! Request handlers backed by the model.

pub mod predict;
