//! Top-level facade crate for tonemeter.
//!
//! Re-exports the model core and the API library so users can depend on a single crate.

pub mod core {
    pub use tonemeter_core::*;
}

pub mod api {
    pub use tonemeter_api::*;
}
