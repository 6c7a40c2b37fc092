//! Immutable request context handed to every policy evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Who is acting, on what, and where.
///
/// Built once per request via [`PolicyContext::builder`]; every downstream
/// layer borrows it read-only. Tenant identity is required — it scopes what
/// data a backend consults while evaluating, never which chain runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Acting user, when the actor is (or acts for) a human.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Tenant the action is scoped to.
    pub tenant_id: String,
    /// Acting agent, when the actor is autonomous.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Resource the action targets.
    pub resource: String,
    /// Action name (e.g. "invoke", "read", "deploy").
    pub action: String,
    /// Deployment environment tag.
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Open mapping for engine-specific hints.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_environment() -> String {
    "production".into()
}

impl PolicyContext {
    /// Start building a context from the required fields.
    pub fn builder(
        tenant_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> PolicyContextBuilder {
        PolicyContextBuilder {
            ctx: PolicyContext {
                user_id: None,
                tenant_id: tenant_id.into(),
                agent_id: None,
                resource: resource.into(),
                action: action.into(),
                environment: default_environment(),
                metadata: BTreeMap::new(),
            },
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }
}

/// Consuming builder for [`PolicyContext`].
#[derive(Debug)]
pub struct PolicyContextBuilder {
    ctx: PolicyContext,
}

impl PolicyContextBuilder {
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.ctx.user_id = Some(user_id.into());
        self
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.ctx.agent_id = Some(agent_id.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.ctx.environment = environment.into();
        self
    }

    pub fn hint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.metadata.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> PolicyContext {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_required_and_optional_fields() {
        let ctx = PolicyContext::builder("acme", "doc:42", "read")
            .user("u-1")
            .agent("agent-42")
            .environment("staging")
            .hint("origin", "sdk")
            .build();

        assert_eq!(ctx.tenant_id(), "acme");
        assert_eq!(ctx.agent_id(), Some("agent-42"));
        assert_eq!(ctx.environment, "staging");
        assert_eq!(ctx.metadata.get("origin").map(String::as_str), Some("sdk"));
    }

    #[test]
    fn environment_defaults_to_production() {
        let ctx = PolicyContext::builder("acme", "doc:42", "read").build();
        assert_eq!(ctx.environment, "production");
    }
}
