//! Backend health reporting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Health report from one backend, decorated by each layer it passes
/// through on the way up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: HealthStatus,
    /// Identity of the reporting backend.
    pub backend: String,
    #[serde(default)]
    pub detail: BTreeMap<String, String>,
}

impl BackendHealth {
    pub fn healthy(backend: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            backend: backend.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn unhealthy(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut detail = BTreeMap::new();
        detail.insert("error".to_string(), reason.into());
        Self {
            status: HealthStatus::Unhealthy,
            backend: backend.into(),
            detail,
        }
    }

    /// Attach a detail entry, consuming and returning self.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}
