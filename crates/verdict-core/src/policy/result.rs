//! Per-policy evaluation outcomes and policy descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Decision, OperationType};

/// Metadata key under which the producing backend records its identity.
pub const META_BACKEND: &str = "backend";
/// Metadata key stamped by the abstraction layer for traceability.
pub const META_LAYER: &str = "layer";

/// Outcome of evaluating one policy against one context.
///
/// Immutable once produced. The reason is required for audit; the
/// constructor normalizes an empty reason rather than letting the
/// invariant silently break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    pub policy_id: String,
    pub policy_name: String,
    pub decision: Decision,
    pub reason: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl PolicyResult {
    pub fn new(
        policy_id: impl Into<String>,
        policy_name: impl Into<String>,
        decision: Decision,
        reason: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "no reason provided".to_string()
        } else {
            reason
        };
        Self {
            policy_id: policy_id.into(),
            policy_name: policy_name.into(),
            decision,
            reason,
            metadata: BTreeMap::new(),
        }
    }

    /// UNKNOWN result for conditions classified as a decision rather than
    /// an error (unknown id, unreachable backend, deadline).
    pub fn unknown(policy_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let policy_id = policy_id.into();
        Self::new(policy_id.clone(), policy_id, Decision::Unknown, reason)
    }

    /// Attach a metadata tag, consuming and returning self.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identity of the backend that produced this result, if stamped.
    pub fn backend(&self) -> Option<&str> {
        self.metadata.get(META_BACKEND).map(String::as_str)
    }
}

/// Descriptor advertised by a backend for one evaluable policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDescriptor {
    pub id: String,
    pub name: String,
    /// Operation category this policy governs, when the backend knows it.
    #[serde(default)]
    pub category: Option<OperationType>,
}
