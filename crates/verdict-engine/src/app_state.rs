//! Shared application state for the verdict engine.
//!
//! Builds the layer stack from config — backends, abstraction,
//! composition, enforcement — and owns the pieces that persist across
//! requests (chain registry, agent registry, metrics, audit pipeline).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use verdict_core::error::{Result, VerdictError};

use crate::abstraction::PolicyAbstraction;
use crate::audit::{AuditEvent, AuditSink};
use crate::backend::{MemoryBackend, PolicyBackend, RemoteBackend};
use crate::composition::{CompositionOptions, CompositionService};
use crate::config::EngineConfig;
use crate::enforcement::EnforcementService;
use crate::obs::EngineMetrics;

const FAIL_FAST_ON_MISMATCH: bool = false; // if changed to true, boot fails.

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: EngineConfig,
    /// Backends available as swap targets, by identity.
    backends: HashMap<&'static str, Arc<dyn PolicyBackend>>,
    abstraction: Arc<PolicyAbstraction>,
    enforcement: Arc<EnforcementService>,
    metrics: Arc<EngineMetrics>,
    audit: AuditSink,
    _audit_task: tokio::task::JoinHandle<()>,
}

impl AppState {
    /// Build application state. Must run inside a tokio runtime (spawns
    /// the audit drain task).
    pub fn new(cfg: EngineConfig) -> Result<Self> {
        // 1) Compile the in-process rule backend (always available as a
        //    swap target) and the remote backend when configured.
        let memory = Arc::new(MemoryBackend::from_config(&cfg.rules)?);

        let mut backends: HashMap<&'static str, Arc<dyn PolicyBackend>> = HashMap::new();
        backends.insert(memory.id(), Arc::clone(&memory) as Arc<dyn PolicyBackend>);

        if let Some(remote_cfg) = &cfg.backend.remote {
            let remote = Arc::new(RemoteBackend::new(remote_cfg)?);
            backends.insert(remote.id(), remote);
        }

        let active = cfg.backend.active.as_str();
        let active_backend = backends
            .get(active)
            .cloned()
            .ok_or_else(|| VerdictError::InvalidConfig(format!("backend {active} unavailable")))?;

        // 2) Chain <-> rule table sanity check. Ids a remote backend will
        //    serve are not knowable at boot, so this only warns.
        for (workflow, policy_ids) in &cfg.chains {
            for policy_id in policy_ids {
                if !memory.knows(policy_id) {
                    tracing::warn!(
                        workflow = %workflow,
                        policy_id = %policy_id,
                        "chain references policy unknown to the rule table"
                    );
                    if FAIL_FAST_ON_MISMATCH {
                        return Err(VerdictError::InvalidConfig(format!(
                            "chain {workflow} references unknown policy: {policy_id}"
                        )));
                    }
                }
            }
        }

        // 3) Assemble the layer stack.
        let metrics = Arc::new(EngineMetrics::default());
        let (audit, audit_task) = AuditSink::start(cfg.engine.audit_buffer);

        let abstraction = Arc::new(PolicyAbstraction::new(active_backend));
        let composition = Arc::new(CompositionService::new(
            Arc::clone(&abstraction),
            Arc::clone(&metrics),
            audit.clone(),
            CompositionOptions {
                chain_deadline: Duration::from_millis(cfg.engine.chain_deadline_ms),
                short_circuit_on_deny: cfg.engine.short_circuit_on_deny,
                metrics_window: Duration::from_secs(cfg.engine.metrics_window_secs),
            },
        ));
        let enforcement = Arc::new(EnforcementService::new(Arc::clone(&composition)));

        // 4) Seed registries from config.
        for (workflow, policy_ids) in &cfg.chains {
            composition.register_chain(workflow.clone(), policy_ids.clone());
        }
        for agent in &cfg.agents {
            enforcement.register_agent(agent.id.clone(), agent.capabilities.clone());
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                backends,
                abstraction,
                enforcement,
                metrics,
                audit,
                _audit_task: audit_task,
            }),
        })
    }

    pub fn cfg(&self) -> &EngineConfig {
        &self.inner.cfg
    }

    pub fn enforcement(&self) -> &Arc<EnforcementService> {
        &self.inner.enforcement
    }

    pub fn composition(&self) -> &Arc<CompositionService> {
        self.inner.enforcement.composition()
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.inner.metrics
    }

    /// Hot-swap the active backend by identity (admin path, outside the
    /// request-time decision path). Returns the previous identity.
    pub fn switch_backend(&self, target: &str) -> Result<&'static str> {
        let backend = self.inner.backends.get(target).cloned().ok_or_else(|| {
            VerdictError::BadRequest(format!("unknown or unconfigured backend: {target}"))
        })?;

        let previous = self.inner.abstraction.switch_backend(backend);
        self.inner
            .metrics
            .backend_switches
            .inc(&[("from", previous), ("to", target)]);
        self.inner.audit.emit(AuditEvent::BackendSwitched {
            from: previous.to_string(),
            to: target.to_string(),
        });
        Ok(previous)
    }
}
