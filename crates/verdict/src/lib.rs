//! Top-level facade crate for verdict.
//!
//! Re-exports the contracts and the engine library so embedders can depend
//! on a single crate.

pub mod core {
    pub use verdict_core::*;
}

pub mod engine {
    pub use verdict_engine::*;
}
