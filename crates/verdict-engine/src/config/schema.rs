use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use verdict_core::error::{Result, VerdictError};
use verdict_core::policy::{Decision, OperationType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub backend: BackendSection,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    /// Workflow name -> ordered policy ids.
    #[serde(default)]
    pub chains: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(VerdictError::UnsupportedVersion);
        }

        self.engine.validate()?;
        self.backend.validate()?;

        let mut ids = HashSet::new();
        for rule in &self.rules {
            if rule.id.is_empty() {
                return Err(VerdictError::InvalidConfig("rule id must not be empty".into()));
            }
            if !ids.insert(rule.id.as_str()) {
                return Err(VerdictError::InvalidConfig(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }
            rule.check.validate(&rule.id)?;
        }

        for agent in &self.agents {
            if agent.id.is_empty() {
                return Err(VerdictError::InvalidConfig("agent id must not be empty".into()));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Overall deadline for one chain evaluation.
    #[serde(default = "default_chain_deadline_ms")]
    pub chain_deadline_ms: u64,

    /// Stop launching evaluations once a DENY is observed. Latency
    /// optimization only: short-circuited policies are still reported.
    #[serde(default)]
    pub short_circuit_on_deny: bool,

    /// Rolling window for decision metrics.
    #[serde(default = "default_metrics_window_secs")]
    pub metrics_window_secs: u64,

    /// Bounded buffer between decision paths and the audit drain task.
    #[serde(default = "default_audit_buffer")]
    pub audit_buffer: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            chain_deadline_ms: default_chain_deadline_ms(),
            short_circuit_on_deny: false,
            metrics_window_secs: default_metrics_window_secs(),
            audit_buffer: default_audit_buffer(),
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60000).contains(&self.chain_deadline_ms) {
            return Err(VerdictError::InvalidConfig(
                "engine.chain_deadline_ms must be between 100 and 60000".into(),
            ));
        }
        if !(10..=3600).contains(&self.metrics_window_secs) {
            return Err(VerdictError::InvalidConfig(
                "engine.metrics_window_secs must be between 10 and 3600".into(),
            ));
        }
        if !(16..=65536).contains(&self.audit_buffer) {
            return Err(VerdictError::InvalidConfig(
                "engine.audit_buffer must be between 16 and 65536".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_chain_deadline_ms() -> u64 {
    2000
}
fn default_metrics_window_secs() -> u64 {
    300
}
fn default_audit_buffer() -> usize {
    1024
}
fn default_remote_timeout_ms() -> u64 {
    500
}

/// Which decision backends exist and which one is active at boot.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BackendSection {
    #[serde(default)]
    pub active: BackendKind,

    /// Remote decision point. Required when `active: remote`; optional
    /// otherwise (configuring it makes the remote backend a swap target).
    #[serde(default)]
    pub remote: Option<RemoteBackendConfig>,
}

impl BackendSection {
    pub fn validate(&self) -> Result<()> {
        if self.active == BackendKind::Remote && self.remote.is_none() {
            return Err(VerdictError::InvalidConfig(
                "backend.active is remote but backend.remote is not configured".into(),
            ));
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Remote,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteBackendConfig {
    pub url: String,

    /// Per-call timeout for decision queries.
    #[serde(default = "default_remote_timeout_ms")]
    pub timeout_ms: u64,
}

impl RemoteBackendConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(VerdictError::InvalidConfig(format!(
                "backend.remote.url must be http(s): {}",
                self.url
            )));
        }
        if !(50..=30000).contains(&self.timeout_ms) {
            return Err(VerdictError::InvalidConfig(
                "backend.remote.timeout_ms must be between 50 and 30000".into(),
            ));
        }
        Ok(())
    }
}

/// One named rule for the in-process backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub id: String,
    pub name: String,

    /// Operation category this rule governs (drives recommendations).
    #[serde(default)]
    pub category: Option<OperationType>,

    pub check: CheckConfig,

    #[serde(default)]
    pub on_violation: ViolationAction,
}

/// Pure predicate over context fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum CheckConfig {
    /// Tenant must be one of the listed ids.
    TenantAllowlist { tenants: Vec<String> },
    /// Action must be one of the listed names.
    ActionAllowlist { actions: Vec<String> },
    /// Environment tag must be one of the listed values.
    EnvironmentAllowlist { environments: Vec<String> },
    /// Resource identifier must start with the prefix.
    ResourcePrefix { prefix: String },
    /// Context must carry an agent identity.
    AgentRequired,
}

impl CheckConfig {
    pub fn validate(&self, rule_id: &str) -> Result<()> {
        let empty = match self {
            CheckConfig::TenantAllowlist { tenants } => tenants.is_empty(),
            CheckConfig::ActionAllowlist { actions } => actions.is_empty(),
            CheckConfig::EnvironmentAllowlist { environments } => environments.is_empty(),
            CheckConfig::ResourcePrefix { prefix } => prefix.is_empty(),
            CheckConfig::AgentRequired => false,
        };
        if empty {
            return Err(VerdictError::InvalidConfig(format!(
                "rule {rule_id}: check must not be empty"
            )));
        }
        Ok(())
    }
}

/// Decision taken when a rule's predicate is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ViolationAction {
    #[default]
    Deny,
    Warn,
}

impl ViolationAction {
    pub fn decision(self) -> Decision {
        match self {
            ViolationAction::Deny => Decision::Deny,
            ViolationAction::Warn => Decision::Warn,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub id: String,
    pub capabilities: Vec<OperationType>,
}
