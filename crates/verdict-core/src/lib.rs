//! verdict core: policy contracts, decision algebra, and error types.
//!
//! This crate defines the vocabulary shared by every layer of the engine —
//! contexts, results, decisions, compliance records — and the aggregation
//! algebra that turns a set of policy results into one verdict. It carries
//! no runtime or transport dependencies so backends, services, and tooling
//! can all depend on it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `VerdictError`/`Result` so an
//! enforcement process never crashes while rendering a decision.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod policy;

/// Shared result type.
pub use error::{Result, VerdictError};
pub use policy::{
    ComplianceRecord, Decision, OperationType, PolicyContext, PolicyDescriptor, PolicyResult,
};
