//! Chain evaluation semantics over the composition service.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use verdict_core::policy::{
    BackendHealth, Decision, PolicyContext, PolicyDescriptor, PolicyResult,
};
use verdict_engine::abstraction::PolicyAbstraction;
use verdict_engine::audit::AuditSink;
use verdict_engine::backend::{MemoryBackend, PolicyBackend};
use verdict_engine::composition::{CompositionOptions, CompositionService};
use verdict_engine::config::{CheckConfig, RuleConfig, ViolationAction};
use verdict_engine::obs::EngineMetrics;

fn rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            id: "tenant_isolation".into(),
            name: "Tenant isolation".into(),
            category: None,
            check: CheckConfig::TenantAllowlist {
                tenants: vec!["acme".into()],
            },
            on_violation: ViolationAction::Deny,
        },
        RuleConfig {
            id: "rbac_check".into(),
            name: "Role-based access".into(),
            category: None,
            check: CheckConfig::ActionAllowlist {
                actions: vec!["read".into()],
            },
            on_violation: ViolationAction::Deny,
        },
        RuleConfig {
            id: "soft_quota".into(),
            name: "Soft quota".into(),
            category: None,
            check: CheckConfig::EnvironmentAllowlist {
                environments: vec!["staging".into()],
            },
            on_violation: ViolationAction::Warn,
        },
    ]
}

fn service_over(
    backend: Arc<dyn PolicyBackend>,
    opts: CompositionOptions,
) -> Arc<CompositionService> {
    let abstraction = Arc::new(PolicyAbstraction::new(backend));
    let (audit, _rx) = AuditSink::channel(256);
    Arc::new(CompositionService::new(
        abstraction,
        Arc::new(EngineMetrics::default()),
        audit,
        opts,
    ))
}

fn memory_service(opts: CompositionOptions) -> Arc<CompositionService> {
    service_over(
        Arc::new(MemoryBackend::from_config(&rules()).unwrap()),
        opts,
    )
}

fn ctx() -> PolicyContext {
    PolicyContext::builder("acme", "doc:reports/q3", "read").build()
}

fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn deny_dominates_chain() {
    let svc = memory_service(CompositionOptions::default());
    // tenant passes, rbac denies the write action.
    let ctx = PolicyContext::builder("acme", "doc:reports/q3", "write").build();

    let eval = svc
        .evaluate_chain(&ids(&["tenant_isolation", "rbac_check"]), &ctx)
        .await;

    assert_eq!(eval.final_decision, Decision::Deny);
    assert_eq!(eval.results.len(), 2);
    // Results keep chain order.
    assert_eq!(eval.results[0].policy_id, "tenant_isolation");
    assert_eq!(eval.results[0].decision, Decision::Allow);
    assert_eq!(eval.results[1].policy_id, "rbac_check");
    assert_eq!(eval.results[1].decision, Decision::Deny);
}

#[tokio::test]
async fn unknown_policy_yields_unknown_result_not_a_hole() {
    let svc = memory_service(CompositionOptions::default());

    let eval = svc.evaluate_chain(&ids(&["ghost_policy"]), &ctx()).await;

    assert_eq!(eval.results.len(), 1);
    assert_eq!(eval.results[0].decision, Decision::Unknown);
    assert_eq!(eval.results[0].reason, "policy not found");
    assert_eq!(eval.final_decision, Decision::Unknown);
}

#[tokio::test]
async fn unknown_outranks_warn() {
    let svc = memory_service(CompositionOptions::default());
    // production environment violates soft_quota -> WARN; ghost -> UNKNOWN.
    let eval = svc
        .evaluate_chain(&ids(&["soft_quota", "ghost_policy"]), &ctx())
        .await;

    assert_eq!(eval.final_decision, Decision::Unknown);
}

#[tokio::test]
async fn warn_permits_but_surfaces() {
    let svc = memory_service(CompositionOptions::default());
    let eval = svc.evaluate_chain(&ids(&["soft_quota"]), &ctx()).await;

    assert_eq!(eval.final_decision, Decision::Warn);
    assert!(eval.final_decision.permits());
}

#[tokio::test]
async fn empty_chain_is_allow() {
    let svc = memory_service(CompositionOptions::default());
    let eval = svc.evaluate_chain(&[], &ctx()).await;

    assert_eq!(eval.final_decision, Decision::Allow);
    assert!(eval.results.is_empty());
}

#[tokio::test]
async fn evaluation_is_idempotent_without_backend_change() {
    let svc = memory_service(CompositionOptions::default());

    let first = svc.evaluate("tenant_isolation", &ctx()).await;
    let second = svc.evaluate("tenant_isolation", &ctx()).await;

    assert_eq!(first.decision, second.decision);
    assert_eq!(first.reason, second.reason);
}

#[tokio::test]
async fn orchestrate_unregistered_workflow_fails() {
    let svc = memory_service(CompositionOptions::default());
    let err = svc.orchestrate("no_such_workflow", &ctx()).await.unwrap_err();
    assert_eq!(err.error_code().as_str(), "CHAIN_NOT_FOUND");
}

#[tokio::test]
async fn orchestrate_resolves_registered_chain() {
    let svc = memory_service(CompositionOptions::default());
    svc.register_chain("access_control", ids(&["tenant_isolation", "rbac_check"]));

    let eval = svc.orchestrate("access_control", &ctx()).await.unwrap();
    assert_eq!(eval.workflow.as_deref(), Some("access_control"));
    assert_eq!(eval.final_decision, Decision::Allow);
}

/// Backend whose evaluations never resolve.
struct HangingBackend;

#[async_trait]
impl PolicyBackend for HangingBackend {
    fn id(&self) -> &'static str {
        "hanging"
    }

    async fn evaluate(&self, _policy_id: &str, _ctx: &PolicyContext) -> PolicyResult {
        std::future::pending::<PolicyResult>().await
    }

    async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        Vec::new()
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::healthy(self.id())
    }
}

#[tokio::test]
async fn deadline_fails_closed_instead_of_hanging() {
    let svc = service_over(
        Arc::new(HangingBackend),
        CompositionOptions {
            chain_deadline: Duration::from_millis(50),
            ..CompositionOptions::default()
        },
    );

    let eval = tokio::time::timeout(
        Duration::from_secs(2),
        svc.evaluate_chain(&ids(&["stuck_policy"]), &ctx()),
    )
    .await
    .expect("chain must complete by its deadline");

    assert_eq!(eval.results.len(), 1);
    assert_eq!(eval.results[0].decision, Decision::Unknown);
    assert!(eval.results[0].reason.contains("deadline exceeded"));
    assert_eq!(eval.final_decision, Decision::Unknown);
    assert_eq!(eval.evaluated, 0);
}

/// Denies one well-known id instantly; everything else never resolves.
struct DenyOrHangBackend;

#[async_trait]
impl PolicyBackend for DenyOrHangBackend {
    fn id(&self) -> &'static str {
        "deny-or-hang"
    }

    async fn evaluate(&self, policy_id: &str, _ctx: &PolicyContext) -> PolicyResult {
        if policy_id == "deny_fast" {
            PolicyResult::new(policy_id, "Fast deny", Decision::Deny, "denied by rule")
        } else {
            std::future::pending::<PolicyResult>().await
        }
    }

    async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        Vec::new()
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::healthy(self.id())
    }
}

#[tokio::test]
async fn short_circuit_reports_skipped_policies() {
    let svc = service_over(
        Arc::new(DenyOrHangBackend),
        CompositionOptions {
            chain_deadline: Duration::from_secs(30),
            short_circuit_on_deny: true,
            ..CompositionOptions::default()
        },
    );

    let eval = tokio::time::timeout(
        Duration::from_secs(2),
        svc.evaluate_chain(&ids(&["deny_fast", "slow_policy"]), &ctx()),
    )
    .await
    .expect("short-circuit must not wait for the hung policy");

    assert_eq!(eval.final_decision, Decision::Deny);
    assert_eq!(eval.results.len(), 2);
    assert_eq!(eval.results[1].decision, Decision::Unknown);
    assert!(eval.results[1].reason.contains("not evaluated"));
}

/// Allows after a fixed delay, tagged with a fixed identity.
struct SlowAllowBackend {
    ident: &'static str,
    delay: Duration,
}

#[async_trait]
impl PolicyBackend for SlowAllowBackend {
    fn id(&self) -> &'static str {
        self.ident
    }

    async fn evaluate(&self, policy_id: &str, _ctx: &PolicyContext) -> PolicyResult {
        tokio::time::sleep(self.delay).await;
        PolicyResult::new(policy_id, policy_id, Decision::Allow, "allowed")
    }

    async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        Vec::new()
    }

    async fn health_check(&self) -> BackendHealth {
        BackendHealth::healthy(self.ident)
    }
}

#[tokio::test]
async fn inflight_evaluation_survives_backend_swap() {
    let svc = service_over(
        Arc::new(SlowAllowBackend {
            ident: "old",
            delay: Duration::from_millis(100),
        }),
        CompositionOptions::default(),
    );

    let inflight = {
        let svc = Arc::clone(&svc);
        let ctx = ctx();
        tokio::spawn(async move { svc.evaluate("p1", &ctx).await })
    };

    // Swap while the first evaluation is still sleeping on the old backend.
    tokio::time::sleep(Duration::from_millis(20)).await;
    svc.abstraction().switch_backend(Arc::new(SlowAllowBackend {
        ident: "new",
        delay: Duration::from_millis(1),
    }));

    let pinned = inflight.await.unwrap();
    assert_eq!(pinned.backend(), Some("old"));

    let fresh = svc.evaluate("p2", &ctx()).await;
    assert_eq!(fresh.backend(), Some("new"));
}
