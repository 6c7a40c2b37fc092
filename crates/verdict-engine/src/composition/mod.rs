//! Policy composition: named chains, concurrent evaluation, and the
//! fail-closed aggregation of independent policy results into one verdict.

pub mod registry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use verdict_core::error::{Result, VerdictError};
use verdict_core::policy::result::META_LAYER;
use verdict_core::policy::{
    BackendHealth, Decision, PolicyContext, PolicyDescriptor, PolicyResult,
};

use crate::abstraction::PolicyAbstraction;
use crate::audit::{AuditEvent, AuditSink};
use crate::obs::{DecisionSnapshot, DecisionWindow, EngineMetrics};

pub use registry::ChainRegistry;

/// Workflow label used for chains evaluated by explicit policy id list.
const ADHOC_WORKFLOW: &str = "adhoc";

/// Tuning knobs for the composition service.
#[derive(Debug, Clone)]
pub struct CompositionOptions {
    /// Overall deadline for one chain evaluation.
    pub chain_deadline: Duration,
    /// Stop waiting for remaining policies once a DENY is observed.
    /// Latency optimization only; skipped policies are still reported.
    pub short_circuit_on_deny: bool,
    /// Rolling window for decision metrics.
    pub metrics_window: Duration,
}

impl Default for CompositionOptions {
    fn default() -> Self {
        Self {
            chain_deadline: Duration::from_millis(2000),
            short_circuit_on_deny: false,
            metrics_window: Duration::from_secs(300),
        }
    }
}

/// Outcome of one chain evaluation. Always carries exactly one result per
/// requested policy id, in chain order.
#[derive(Debug, Clone, Serialize)]
pub struct ChainEvaluation {
    /// Workflow name when resolved through the registry.
    pub workflow: Option<String>,
    pub final_decision: Decision,
    pub results: Vec<PolicyResult>,
    /// How many policies actually ran to completion (the rest were
    /// deadline-expired or short-circuited and reported as UNKNOWN).
    pub evaluated: usize,
}

/// Read-only metrics report for observability consumers.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyMetricsReport {
    pub active_backend: String,
    pub workflows: Vec<String>,
    pub decisions: DecisionSnapshot,
}

/// Evaluates named policy chains and aggregates verdicts.
pub struct CompositionService {
    abstraction: Arc<PolicyAbstraction>,
    registry: ChainRegistry,
    metrics: Arc<EngineMetrics>,
    window: DecisionWindow,
    audit: AuditSink,
    opts: CompositionOptions,
}

impl CompositionService {
    pub fn new(
        abstraction: Arc<PolicyAbstraction>,
        metrics: Arc<EngineMetrics>,
        audit: AuditSink,
        opts: CompositionOptions,
    ) -> Self {
        let window = DecisionWindow::new(opts.metrics_window);
        Self {
            abstraction,
            registry: ChainRegistry::new(),
            metrics,
            window,
            audit,
            opts,
        }
    }

    pub fn abstraction(&self) -> &Arc<PolicyAbstraction> {
        &self.abstraction
    }

    /// Register or replace a chain (admin path, never request-time).
    pub fn register_chain(&self, workflow: impl Into<String>, policy_ids: Vec<String>) {
        self.registry.register(workflow, policy_ids);
    }

    pub fn resolve_chain(&self, workflow: &str) -> Option<Arc<Vec<String>>> {
        self.registry.resolve(workflow)
    }

    pub fn chain_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Evaluate a single policy through the abstraction.
    pub async fn evaluate(&self, policy_id: &str, ctx: &PolicyContext) -> PolicyResult {
        let started = Instant::now();
        let result = self.abstraction.evaluate(policy_id, ctx).await;
        self.record(&result, ctx, started.elapsed());
        result
    }

    /// Evaluate an explicit list of policy ids as an ad-hoc chain.
    pub async fn evaluate_chain(
        &self,
        policy_ids: &[String],
        ctx: &PolicyContext,
    ) -> ChainEvaluation {
        self.evaluate_inner(ADHOC_WORKFLOW, policy_ids, ctx).await
    }

    /// Resolve a workflow name via the registry and evaluate it.
    /// Fails with ChainNotFound when unregistered — there is no safe
    /// default chain.
    pub async fn orchestrate(
        &self,
        workflow: &str,
        ctx: &PolicyContext,
    ) -> Result<ChainEvaluation> {
        let chain = self
            .registry
            .resolve(workflow)
            .ok_or_else(|| VerdictError::ChainNotFound(workflow.to_string()))?;

        let mut eval = self.evaluate_inner(workflow, chain.as_slice(), ctx).await;
        eval.workflow = Some(workflow.to_string());
        Ok(eval)
    }

    /// Descriptors advertised by the active backend.
    pub async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        self.abstraction.list_policies().await
    }

    pub async fn health_check(&self) -> BackendHealth {
        self.abstraction
            .health_check()
            .await
            .with_detail("workflows", self.registry.names().len().to_string())
    }

    /// Rolling-window decision counts. Observability only; never feeds
    /// back into the decision path.
    pub fn get_metrics(&self) -> PolicyMetricsReport {
        PolicyMetricsReport {
            active_backend: self.abstraction.backend_id().to_string(),
            workflows: self.registry.names(),
            decisions: self.window.snapshot(),
        }
    }

    async fn evaluate_inner(
        &self,
        workflow: &str,
        policy_ids: &[String],
        ctx: &PolicyContext,
    ) -> ChainEvaluation {
        let started = Instant::now();
        self.metrics.chains_inflight.inc(&[("workflow", workflow)]);

        // Fan out: evaluations are mutually independent, so launch them all
        // and join. No shared mutable state is touched until results land.
        let mut futs: FuturesUnordered<_> = policy_ids
            .iter()
            .enumerate()
            .map(|(idx, policy_id)| async move {
                let t0 = Instant::now();
                let result = self.abstraction.evaluate(policy_id, ctx).await;
                (idx, result, t0.elapsed())
            })
            .collect();

        let mut slots: Vec<Option<PolicyResult>> = vec![None; policy_ids.len()];
        let mut denied = false;
        let mut timed_out = false;

        let deadline = tokio::time::sleep(self.opts.chain_deadline);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = futs.next() => match next {
                    Some((idx, result, elapsed)) => {
                        self.record(&result, ctx, elapsed);
                        denied |= result.decision == Decision::Deny;
                        slots[idx] = Some(result);
                        if denied && self.opts.short_circuit_on_deny {
                            break;
                        }
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    timed_out = true;
                    break;
                }
            }
        }
        drop(futs);

        let evaluated = slots.iter().flatten().count();

        // Unresolved policies are reported, never omitted: the result set
        // stays fully explainable and the chain fails closed.
        for (idx, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let reason = if timed_out {
                    format!(
                        "deadline exceeded after {}ms",
                        self.opts.chain_deadline.as_millis()
                    )
                } else {
                    "not evaluated: chain short-circuited after deny".to_string()
                };
                let result = PolicyResult::unknown(&policy_ids[idx], reason)
                    .with_tag(META_LAYER, "composition");
                self.record(&result, ctx, started.elapsed());
                *slot = Some(result);
            }
        }

        let results: Vec<PolicyResult> = slots.into_iter().flatten().collect();
        let final_decision = Decision::aggregate(results.iter().map(|r| r.decision));

        let elapsed = started.elapsed();
        self.metrics.chains_inflight.dec(&[("workflow", workflow)]);
        self.metrics
            .chain_evaluations
            .inc(&[("workflow", workflow), ("decision", final_decision.as_str())]);
        self.metrics
            .chain_duration
            .observe(&[("workflow", workflow)], elapsed);

        tracing::debug!(
            workflow,
            decision = final_decision.as_str(),
            policies = policy_ids.len(),
            evaluated,
            "chain evaluated"
        );

        self.emit(AuditEvent::ChainEvaluated {
            workflow: workflow.to_string(),
            final_decision,
            tenant_id: ctx.tenant_id.clone(),
            policies: policy_ids.len(),
            evaluated,
            latency_us: elapsed.as_micros() as u64,
        });

        ChainEvaluation {
            workflow: None,
            final_decision,
            results,
            evaluated,
        }
    }

    fn record(&self, result: &PolicyResult, ctx: &PolicyContext, elapsed: Duration) {
        self.metrics.policy_decisions.inc(&[
            ("policy", result.policy_id.as_str()),
            ("decision", result.decision.as_str()),
            ("backend", result.backend().unwrap_or("none")),
        ]);
        self.window.record(&result.policy_id, result.decision);
        self.emit(AuditEvent::PolicyEvaluated {
            policy_id: result.policy_id.clone(),
            decision: result.decision,
            reason: result.reason.clone(),
            tenant_id: ctx.tenant_id.clone(),
            backend: result.backend().map(str::to_string),
            latency_us: elapsed.as_micros() as u64,
        });
    }

    fn emit(&self, event: AuditEvent) {
        let kind = event.kind();
        if !self.audit.emit(event) {
            self.metrics.audit_dropped.inc(&[("event", kind)]);
        }
    }
}
