//! Enforcement-layer semantics: operation gating, compliance rollups,
//! recommendations, and the admin backend swap.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use tokio::sync::mpsc;

use verdict_core::policy::{Decision, OperationType, PolicyContext};
use verdict_engine::abstraction::PolicyAbstraction;
use verdict_engine::app_state::AppState;
use verdict_engine::audit::{AuditEvent, AuditSink};
use verdict_engine::backend::MemoryBackend;
use verdict_engine::composition::{CompositionOptions, CompositionService};
use verdict_engine::config::{self, CheckConfig, RuleConfig, ViolationAction};
use verdict_engine::enforcement::EnforcementService;
use verdict_engine::obs::EngineMetrics;

fn rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig {
            id: "tenant_isolation".into(),
            name: "Tenant isolation".into(),
            category: Some(OperationType::ToolOperations),
            check: CheckConfig::TenantAllowlist {
                tenants: vec!["acme".into()],
            },
            on_violation: ViolationAction::Deny,
        },
        RuleConfig {
            id: "rbac_check".into(),
            name: "Role-based access".into(),
            category: Some(OperationType::ToolOperations),
            check: CheckConfig::ActionAllowlist {
                actions: vec!["read".into()],
            },
            on_violation: ViolationAction::Deny,
        },
        RuleConfig {
            id: "prod_change_freeze".into(),
            name: "Production change freeze".into(),
            category: Some(OperationType::ToolOperations),
            check: CheckConfig::EnvironmentAllowlist {
                environments: vec!["staging".into()],
            },
            on_violation: ViolationAction::Warn,
        },
        // Advertised but not attached to any chain: recommendation fodder.
        RuleConfig {
            id: "tool_rate_limit".into(),
            name: "Tool rate limit".into(),
            category: Some(OperationType::ToolOperations),
            check: CheckConfig::ActionAllowlist {
                actions: vec!["read".into(), "invoke".into()],
            },
            on_violation: ViolationAction::Warn,
        },
        RuleConfig {
            id: "model_scope".into(),
            name: "Model resource scope".into(),
            category: Some(OperationType::LlmOperations),
            check: CheckConfig::ResourcePrefix {
                prefix: "model:".into(),
            },
            on_violation: ViolationAction::Deny,
        },
    ]
}

fn harness() -> (Arc<EnforcementService>, mpsc::Receiver<AuditEvent>) {
    let backend = Arc::new(MemoryBackend::from_config(&rules()).unwrap());
    let abstraction = Arc::new(PolicyAbstraction::new(backend));
    let (audit, rx) = AuditSink::channel(256);
    let composition = Arc::new(CompositionService::new(
        abstraction,
        Arc::new(EngineMetrics::default()),
        audit,
        CompositionOptions::default(),
    ));
    composition.register_chain(
        "tool_operations",
        vec!["tenant_isolation".into(), "prod_change_freeze".into()],
    );
    composition.register_chain("agent_behavior", vec!["rbac_check".into()]);
    (Arc::new(EnforcementService::new(composition)), rx)
}

fn ctx() -> PolicyContext {
    PolicyContext::builder("acme", "doc:reports/q3", "read")
        .agent("agent-42")
        .build()
}

#[tokio::test]
async fn warn_permits_and_flags_for_audit() {
    let (svc, mut rx) = harness();

    // tenant passes; production environment trips the freeze -> WARN.
    let outcome = svc.enforce(OperationType::ToolOperations, &ctx()).await.unwrap();

    assert!(outcome.operation_allowed);
    assert_eq!(outcome.final_decision, Decision::Warn);
    assert_eq!(outcome.results.len(), 2);

    // One audit event per policy result plus one for the chain verdict.
    let mut policy_events = 0;
    let mut chain_events = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            AuditEvent::PolicyEvaluated { ref tenant_id, .. } => {
                assert_eq!(tenant_id, "acme");
                policy_events += 1;
            }
            AuditEvent::ChainEvaluated {
                ref workflow,
                final_decision,
                ..
            } => {
                assert_eq!(workflow, "tool_operations");
                assert_eq!(final_decision, Decision::Warn);
                chain_events += 1;
            }
            AuditEvent::BackendSwitched { .. } => {}
        }
    }
    assert_eq!(policy_events, 2);
    assert_eq!(chain_events, 1);
}

#[tokio::test]
async fn deny_blocks_operation() {
    let (svc, _rx) = harness();
    let foreign = PolicyContext::builder("umbrella", "doc:1", "read").build();

    let outcome = svc.enforce(OperationType::ToolOperations, &foreign).await.unwrap();

    assert!(!outcome.operation_allowed);
    assert_eq!(outcome.final_decision, Decision::Deny);
}

#[tokio::test]
async fn unmapped_operation_type_is_chain_not_found() {
    let (svc, _rx) = harness();
    let err = svc
        .enforce(OperationType::McpOperations, &ctx())
        .await
        .unwrap_err();
    assert_eq!(err.error_code().as_str(), "CHAIN_NOT_FOUND");
}

#[tokio::test]
async fn compliance_reports_violations_across_capability_chains() {
    let (svc, _rx) = harness();
    svc.register_agent("agent-42", vec![OperationType::ToolOperations]);

    // Write action violates nothing in tool_operations except the freeze
    // (warn); a denying write makes the rollup non-compliant.
    let writing = PolicyContext::builder("acme", "doc:1", "write")
        .agent("agent-42")
        .build();
    svc.composition()
        .register_chain("tool_operations", vec!["tenant_isolation".into(), "rbac_check".into()]);

    let record = svc.check_compliance("agent-42", &writing).await.unwrap();

    assert!(!record.is_compliant);
    assert_eq!(record.violated_policies, vec!["rbac_check".to_string()]);
}

#[tokio::test]
async fn compliant_agent_has_empty_violations() {
    let (svc, _rx) = harness();
    svc.register_agent("agent-7", vec![OperationType::AgentBehavior]);

    let record = svc.check_compliance("agent-7", &ctx()).await.unwrap();

    assert!(record.is_compliant);
    assert!(record.violated_policies.is_empty());
}

#[tokio::test]
async fn unknown_agent_defaults_to_every_capability() {
    let (svc, _rx) = harness();
    assert_eq!(svc.capabilities("stranger"), OperationType::ALL.to_vec());
}

#[tokio::test]
async fn recommendations_cover_gaps_without_mutating_chains() {
    let (svc, _rx) = harness();
    svc.register_agent("agent-42", vec![OperationType::ToolOperations]);

    let recommended = svc.recommend_policies("agent-42", &ctx()).await;

    // tool_rate_limit and rbac_check are advertised for tool_operations
    // but absent from the agent's enforced union; model_scope is outside
    // the agent's capabilities.
    assert!(recommended.contains(&"tool_rate_limit".to_string()));
    assert!(recommended.contains(&"rbac_check".to_string()));
    assert!(!recommended.contains(&"model_scope".to_string()));
    assert!(!recommended.contains(&"tenant_isolation".to_string()));

    // Advice is read-only: the registered chain is unchanged.
    let chain = svc.composition().resolve_chain("tool_operations").unwrap();
    assert_eq!(
        chain.as_slice(),
        ["tenant_isolation".to_string(), "prod_change_freeze".to_string()]
    );
}

#[tokio::test]
async fn app_state_switch_records_new_backend_identity() {
    let yaml = r#"
version: 1
backend:
  active: memory
rules:
  - id: tenant_isolation
    name: "Tenant isolation"
    check:
      tenant_allowlist:
        tenants: ["acme"]
chains:
  tool_operations: [tenant_isolation]
"#;
    let cfg = config::load_from_str(yaml).unwrap();
    let state = AppState::new(cfg).unwrap();

    // Only the memory backend is configured; swapping to it is a no-op
    // switch that still reports the previous identity.
    let previous = state.switch_backend("memory").unwrap();
    assert_eq!(previous, "memory");

    // An unconfigured target is a bad request, not a crash.
    let err = state.switch_backend("remote").unwrap_err();
    assert_eq!(err.error_code().as_str(), "BAD_REQUEST");

    let result = state
        .composition()
        .evaluate("tenant_isolation", &ctx())
        .await;
    assert_eq!(result.backend(), Some("memory"));
    assert_eq!(result.decision, Decision::Allow);
}
