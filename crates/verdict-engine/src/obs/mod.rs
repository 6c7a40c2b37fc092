//! Lightweight in-process observability.
//!
//! Counters/gauges/histograms are stored as atomics keyed by sorted label
//! vectors and rendered in Prometheus text format by the `/metrics`
//! handler. The rolling decision window behind `get_metrics()` lives here
//! too; both are consumed by observability only and never feed back into
//! the decision path.

pub mod metrics;
pub mod window;

pub use metrics::EngineMetrics;
pub use window::{DecisionSnapshot, DecisionWindow};
