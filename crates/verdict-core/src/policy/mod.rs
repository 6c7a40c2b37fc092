//! Policy contracts shared by every layer of the engine.
//!
//! Contexts are built once per request and only borrowed downstream;
//! results are immutable once produced. The aggregation algebra lives on
//! [`Decision`] so composition stays a pure function of the result set.

pub mod compliance;
pub mod context;
pub mod decision;
pub mod health;
pub mod result;

pub use compliance::{ComplianceRecord, OperationType};
pub use context::PolicyContext;
pub use decision::Decision;
pub use health::{BackendHealth, HealthStatus};
pub use result::{PolicyDescriptor, PolicyResult};
