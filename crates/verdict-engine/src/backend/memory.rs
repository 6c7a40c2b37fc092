//! In-process rule backend.
//!
//! Compiles the configured rule table into fast lookup structures at boot.
//! Every rule is a pure predicate over context fields; evaluation is
//! synchronous and never suspends.

use std::collections::HashMap;

use async_trait::async_trait;

use verdict_core::error::{Result, VerdictError};
use verdict_core::policy::{
    BackendHealth, Decision, OperationType, PolicyContext, PolicyDescriptor, PolicyResult,
};

use crate::config::{CheckConfig, RuleConfig};

use super::{PolicyBackend, REASON_POLICY_NOT_FOUND};

/// Compiled predicate over context fields.
#[derive(Debug, Clone)]
enum Check {
    TenantAllowlist(Vec<String>),
    ActionAllowlist(Vec<String>),
    EnvironmentAllowlist(Vec<String>),
    ResourcePrefix(String),
    AgentRequired,
}

impl Check {
    /// Ok(reason) on pass, Err(reason) on violation.
    fn evaluate(&self, ctx: &PolicyContext) -> std::result::Result<String, String> {
        match self {
            Check::TenantAllowlist(tenants) => {
                if tenants.iter().any(|t| t == &ctx.tenant_id) {
                    Ok(format!("tenant {} is allowed", ctx.tenant_id))
                } else {
                    Err(format!("tenant {} is not in the allowlist", ctx.tenant_id))
                }
            }
            Check::ActionAllowlist(actions) => {
                if actions.iter().any(|a| a == &ctx.action) {
                    Ok(format!("action {} is allowed", ctx.action))
                } else {
                    Err(format!("action {} is not in the allowlist", ctx.action))
                }
            }
            Check::EnvironmentAllowlist(environments) => {
                if environments.iter().any(|e| e == &ctx.environment) {
                    Ok(format!("environment {} is allowed", ctx.environment))
                } else {
                    Err(format!(
                        "environment {} is not in the allowlist",
                        ctx.environment
                    ))
                }
            }
            Check::ResourcePrefix(prefix) => {
                if ctx.resource.starts_with(prefix.as_str()) {
                    Ok(format!("resource is under {prefix}"))
                } else {
                    Err(format!("resource {} is outside {prefix}", ctx.resource))
                }
            }
            Check::AgentRequired => match ctx.agent_id() {
                Some(agent) => Ok(format!("agent identity {agent} present")),
                None => Err("agent identity is required for this action".into()),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    category: Option<OperationType>,
    check: Check,
    on_violation: Decision,
}

/// Rule-table backend. Construct once at startup, then share via Arc.
#[derive(Debug)]
pub struct MemoryBackend {
    rules: HashMap<String, CompiledRule>,
    /// Stable listing order (config order).
    order: Vec<String>,
}

impl MemoryBackend {
    pub fn from_config(rules: &[RuleConfig]) -> Result<Self> {
        let mut compiled = HashMap::with_capacity(rules.len());
        let mut order = Vec::with_capacity(rules.len());

        for rule in rules {
            let check = compile_check(&rule.check);
            if compiled
                .insert(
                    rule.id.clone(),
                    CompiledRule {
                        name: rule.name.clone(),
                        category: rule.category,
                        check,
                        on_violation: rule.on_violation.decision(),
                    },
                )
                .is_some()
            {
                return Err(VerdictError::InvalidConfig(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }
            order.push(rule.id.clone());
        }

        Ok(Self {
            rules: compiled,
            order,
        })
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn knows(&self, policy_id: &str) -> bool {
        self.rules.contains_key(policy_id)
    }
}

fn compile_check(cfg: &CheckConfig) -> Check {
    match cfg {
        CheckConfig::TenantAllowlist { tenants } => Check::TenantAllowlist(tenants.clone()),
        CheckConfig::ActionAllowlist { actions } => Check::ActionAllowlist(actions.clone()),
        CheckConfig::EnvironmentAllowlist { environments } => {
            Check::EnvironmentAllowlist(environments.clone())
        }
        CheckConfig::ResourcePrefix { prefix } => Check::ResourcePrefix(prefix.clone()),
        CheckConfig::AgentRequired => Check::AgentRequired,
    }
}

#[async_trait]
impl PolicyBackend for MemoryBackend {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn evaluate(&self, policy_id: &str, ctx: &PolicyContext) -> PolicyResult {
        let Some(rule) = self.rules.get(policy_id) else {
            tracing::debug!(policy_id, "rule table miss");
            return PolicyResult::unknown(policy_id, REASON_POLICY_NOT_FOUND);
        };

        match rule.check.evaluate(ctx) {
            Ok(reason) => PolicyResult::new(policy_id, &rule.name, Decision::Allow, reason),
            Err(reason) => PolicyResult::new(policy_id, &rule.name, rule.on_violation, reason),
        }
    }

    async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        self.order
            .iter()
            .filter_map(|id| {
                self.rules.get(id).map(|rule| PolicyDescriptor {
                    id: id.clone(),
                    name: rule.name.clone(),
                    category: rule.category,
                })
            })
            .collect()
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::healthy(self.id()).with_detail("rules", self.rules.len().to_string())
    }
}
