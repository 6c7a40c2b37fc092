//! Backend-agnostic policy façade.
//!
//! Owns exactly one active backend reference and presents a stable surface
//! upward, so a remote decision point can be introduced, replaced, or
//! rolled back without touching any caller. The swap is an atomic pointer
//! replace: an evaluation clones the Arc at entry and keeps using that
//! backend for its whole duration, so an in-flight chain never sees a mix
//! of old and new.

use std::sync::{Arc, RwLock};

use verdict_core::policy::result::{META_BACKEND, META_LAYER};
use verdict_core::policy::{BackendHealth, PolicyContext, PolicyDescriptor, PolicyResult};

use crate::backend::PolicyBackend;

pub struct PolicyAbstraction {
    active: RwLock<Arc<dyn PolicyBackend>>,
}

impl PolicyAbstraction {
    pub fn new(backend: Arc<dyn PolicyBackend>) -> Self {
        Self {
            active: RwLock::new(backend),
        }
    }

    /// Pin the currently active backend.
    /// Poisoned lock means a writer panicked mid-swap; the slot itself is
    /// still a valid Arc, so degrade instead of propagating the panic.
    fn active(&self) -> Arc<dyn PolicyBackend> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Identity of the currently active backend.
    pub fn backend_id(&self) -> &'static str {
        self.active().id()
    }

    /// Evaluate via the active backend, stamping backend identity and an
    /// abstraction-layer marker into the result metadata.
    pub async fn evaluate(&self, policy_id: &str, ctx: &PolicyContext) -> PolicyResult {
        let backend = self.active();
        let result = backend.evaluate(policy_id, ctx).await;
        result
            .with_tag(META_BACKEND, backend.id())
            .with_tag(META_LAYER, "abstraction")
    }

    pub async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        self.active().list_policies().await
    }

    /// Atomically replace the active backend. In-flight evaluations keep
    /// the backend they pinned at entry. Returns the previous identity.
    pub fn switch_backend(&self, new: Arc<dyn PolicyBackend>) -> &'static str {
        let mut slot = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let previous = slot.id();
        tracing::info!(from = previous, to = new.id(), "switching policy backend");
        *slot = new;
        previous
    }

    pub async fn health_check(&self) -> BackendHealth {
        self.active()
            .health_check()
            .await
            .with_detail(META_LAYER, "abstraction")
    }
}
