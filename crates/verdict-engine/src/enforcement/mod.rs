//! Agent/operation-facing enforcement API.
//!
//! Translates coarse operation categories into chain evaluations and
//! produces agent-governance semantics: enforce, compliance rollups, and
//! read-only policy recommendations.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use verdict_core::error::Result;
use verdict_core::policy::{
    ComplianceRecord, Decision, OperationType, PolicyContext, PolicyResult,
};

use crate::composition::CompositionService;

/// Verdict for one gated operation.
#[derive(Debug, Clone, Serialize)]
pub struct EnforcementOutcome {
    pub operation_type: OperationType,
    /// True only when the final decision permits: ALLOW, or WARN (which
    /// permits but flags for audit). DENY and UNKNOWN both block.
    pub operation_allowed: bool,
    pub final_decision: Decision,
    pub results: Vec<PolicyResult>,
}

/// Agent/operation-facing entry point over the composition service.
pub struct EnforcementService {
    composition: Arc<CompositionService>,
    /// Declared capabilities per agent. Replace-only.
    agents: DashMap<String, Arc<Vec<OperationType>>>,
}

impl EnforcementService {
    pub fn new(composition: Arc<CompositionService>) -> Self {
        Self {
            composition,
            agents: DashMap::new(),
        }
    }

    pub fn composition(&self) -> &Arc<CompositionService> {
        &self.composition
    }

    /// Declare an agent's operation capabilities (admin path).
    /// Duplicates are collapsed; order is preserved.
    pub fn register_agent(&self, agent_id: impl Into<String>, capabilities: Vec<OperationType>) {
        let mut seen = HashSet::new();
        let capabilities: Vec<OperationType> = capabilities
            .into_iter()
            .filter(|c| seen.insert(*c))
            .collect();
        let agent_id = agent_id.into();
        tracing::info!(agent_id = %agent_id, capabilities = capabilities.len(), "agent registered");
        self.agents.insert(agent_id, Arc::new(capabilities));
    }

    /// Declared capabilities, or every category for unknown agents —
    /// compliance fails closed rather than silently checking nothing.
    pub fn capabilities(&self, agent_id: &str) -> Vec<OperationType> {
        self.agents
            .get(agent_id)
            .map(|e| e.value().as_ref().clone())
            .unwrap_or_else(|| OperationType::ALL.to_vec())
    }

    /// Gate one operation: resolve the category's chain, evaluate it, and
    /// translate the verdict into allow/block.
    pub async fn enforce(
        &self,
        operation_type: OperationType,
        ctx: &PolicyContext,
    ) -> Result<EnforcementOutcome> {
        let eval = self.composition.orchestrate(operation_type.as_str(), ctx).await?;

        let outcome = EnforcementOutcome {
            operation_type,
            operation_allowed: eval.final_decision.permits(),
            final_decision: eval.final_decision,
            results: eval.results,
        };

        tracing::info!(
            operation = operation_type.as_str(),
            tenant = %ctx.tenant_id,
            agent = ctx.agent_id().unwrap_or("-"),
            decision = outcome.final_decision.as_str(),
            allowed = outcome.operation_allowed,
            "operation enforced"
        );
        Ok(outcome)
    }

    /// Evaluate the union of every chain applicable to the agent's
    /// capabilities and roll the results into a compliance record.
    pub async fn check_compliance(
        &self,
        agent_id: &str,
        ctx: &PolicyContext,
    ) -> Result<ComplianceRecord> {
        let capabilities = self.capabilities(agent_id);
        let enforced = self.enforced_union(&capabilities);

        let eval = self.composition.evaluate_chain(&enforced, ctx).await;

        let violated: Vec<String> = eval
            .results
            .iter()
            .filter(|r| matches!(r.decision, Decision::Deny | Decision::Warn))
            .map(|r| r.policy_id.clone())
            .collect();

        let recommended = self
            .recommend_internal(&capabilities, &enforced, &eval.results)
            .await;

        Ok(ComplianceRecord {
            agent_id: agent_id.to_string(),
            is_compliant: violated.is_empty(),
            violated_policies: violated,
            recommended_policies: recommended,
        })
    }

    /// Rank policies registered for the agent's operation categories but
    /// not currently enforced for it. Read-only advice; chain assignments
    /// are never mutated.
    pub async fn recommend_policies(
        &self,
        agent_id: &str,
        ctx: &PolicyContext,
    ) -> Vec<String> {
        let capabilities = self.capabilities(agent_id);
        let enforced = self.enforced_union(&capabilities);
        let eval = self.composition.evaluate_chain(&enforced, ctx).await;
        self.recommend_internal(&capabilities, &enforced, &eval.results)
            .await
    }

    /// Deduplicated union of the chains behind the given capabilities,
    /// in capability order. A capability without a registered chain
    /// contributes nothing (and is worth a warning — it means the
    /// deployment gates nothing for that category).
    fn enforced_union(&self, capabilities: &[OperationType]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut union = Vec::new();
        for capability in capabilities {
            match self.composition.resolve_chain(capability.as_str()) {
                Some(chain) => {
                    for policy_id in chain.iter() {
                        if seen.insert(policy_id.clone()) {
                            union.push(policy_id.clone());
                        }
                    }
                }
                None => {
                    tracing::warn!(
                        capability = capability.as_str(),
                        "capability has no registered chain"
                    );
                }
            }
        }
        union
    }

    async fn recommend_internal(
        &self,
        capabilities: &[OperationType],
        enforced: &[String],
        results: &[PolicyResult],
    ) -> Vec<String> {
        let descriptors = self.composition.list_policies().await;
        let enforced: HashSet<&str> = enforced.iter().map(String::as_str).collect();

        // Categories in which the agent currently violates rank first.
        let violated_ids: HashSet<&str> = results
            .iter()
            .filter(|r| matches!(r.decision, Decision::Deny | Decision::Warn))
            .map(|r| r.policy_id.as_str())
            .collect();
        let gap_categories: HashSet<OperationType> = descriptors
            .iter()
            .filter(|d| violated_ids.contains(d.id.as_str()))
            .filter_map(|d| d.category)
            .collect();

        let category_rank = |category: OperationType| -> usize {
            capabilities
                .iter()
                .position(|c| *c == category)
                .unwrap_or(capabilities.len())
        };

        let mut candidates: Vec<(usize, usize, String)> = descriptors
            .into_iter()
            .filter_map(|d| {
                let category = d.category?;
                if !capabilities.contains(&category) || enforced.contains(d.id.as_str()) {
                    return None;
                }
                let gap = usize::from(!gap_categories.contains(&category));
                Some((gap, category_rank(category), d.id))
            })
            .collect();

        candidates.sort();
        candidates.into_iter().map(|(_, _, id)| id).collect()
    }
}
