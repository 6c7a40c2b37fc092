//! Fire-and-forget audit pipeline.
//!
//! Decision paths hand events to a bounded channel and never block; a
//! background task drains the channel and writes each event as a
//! structured JSON line on the `audit` tracing target. A full channel
//! drops the event (the caller counts drops) rather than stalling an
//! evaluation.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use verdict_core::policy::Decision;

/// One audit event per policy result, per aggregated decision, and per
/// backend swap.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    PolicyEvaluated {
        policy_id: String,
        decision: Decision,
        reason: String,
        tenant_id: String,
        backend: Option<String>,
        latency_us: u64,
    },
    ChainEvaluated {
        workflow: String,
        final_decision: Decision,
        tenant_id: String,
        policies: usize,
        evaluated: usize,
        latency_us: u64,
    },
    BackendSwitched {
        from: String,
        to: String,
    },
}

impl AuditEvent {
    /// Short label used for metrics on dropped events.
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEvent::PolicyEvaluated { .. } => "policy",
            AuditEvent::ChainEvaluated { .. } => "chain",
            AuditEvent::BackendSwitched { .. } => "backend_switch",
        }
    }
}

/// Cheap, cloneable handle used to submit events into the drain task.
#[derive(Clone)]
pub struct AuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSink {
    /// Spawn the background drain task and return a `(sink, handle)` pair.
    pub fn start(buffer: usize) -> (Self, JoinHandle<()>) {
        let (sink, rx) = Self::channel(buffer);
        let handle = tokio::spawn(run_drain_loop(rx));
        (sink, handle)
    }

    /// Build a sink without spawning the drain task. Tests use this to
    /// observe emitted events directly.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Submit an event without blocking. Returns false when the event was
    /// dropped (channel full or drain task gone).
    pub fn emit(&self, event: AuditEvent) -> bool {
        self.tx.try_send(event).is_ok()
    }
}

/// Core loop executed inside the background task.
async fn run_drain_loop(mut rx: mpsc::Receiver<AuditEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => tracing::info!(target: "audit", %line),
            Err(err) => tracing::error!(target: "audit", %err, "unserializable audit event"),
        }
    }
    tracing::debug!("audit drain task shutting down");
}
