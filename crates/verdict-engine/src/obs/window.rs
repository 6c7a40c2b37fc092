//! Rolling decision window behind `get_metrics()`.
//!
//! Append-only within the window; old entries are pruned on record and on
//! snapshot. Snapshots are read-only and never feed back into evaluation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use verdict_core::policy::Decision;

struct WindowEntry {
    at: Instant,
    policy_id: String,
    decision: Decision,
}

pub struct DecisionWindow {
    window: Duration,
    entries: Mutex<VecDeque<WindowEntry>>,
}

/// Decision counts over the rolling window, grouped by policy and value.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionSnapshot {
    pub window_secs: u64,
    pub total: u64,
    pub by_decision: BTreeMap<String, u64>,
    pub by_policy: BTreeMap<String, BTreeMap<String, u64>>,
}

impl DecisionWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, policy_id: &str, decision: Decision) {
        let now = Instant::now();
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::prune(&mut entries, now, self.window);
        entries.push_back(WindowEntry {
            at: now,
            policy_id: policy_id.to_string(),
            decision,
        });
    }

    pub fn snapshot(&self) -> DecisionSnapshot {
        let now = Instant::now();
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::prune(&mut entries, now, self.window);

        let mut by_decision: BTreeMap<String, u64> = BTreeMap::new();
        let mut by_policy: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for entry in entries.iter() {
            let d = entry.decision.as_str().to_string();
            *by_decision.entry(d.clone()).or_default() += 1;
            *by_policy
                .entry(entry.policy_id.clone())
                .or_default()
                .entry(d)
                .or_default() += 1;
        }

        DecisionSnapshot {
            window_secs: self.window.as_secs(),
            total: entries.len() as u64,
            by_decision,
            by_policy,
        }
    }

    fn prune(entries: &mut VecDeque<WindowEntry>, now: Instant, window: Duration) {
        while let Some(front) = entries.front() {
            if now.duration_since(front.at) > window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_groups_by_policy_and_decision() {
        let w = DecisionWindow::new(Duration::from_secs(60));
        w.record("rbac_check", Decision::Deny);
        w.record("rbac_check", Decision::Deny);
        w.record("tenant_isolation", Decision::Allow);

        let snap = w.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.by_decision.get("deny"), Some(&2));
        assert_eq!(
            snap.by_policy.get("rbac_check").and_then(|m| m.get("deny")),
            Some(&2)
        );
    }

    #[test]
    fn entries_outside_window_are_pruned() {
        let w = DecisionWindow::new(Duration::from_millis(0));
        w.record("p", Decision::Allow);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(w.snapshot().total, 0);
    }
}
