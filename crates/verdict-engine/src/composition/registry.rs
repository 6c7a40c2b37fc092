//! Named chain registry.
//!
//! Workflow name -> ordered policy ids. Updates replace the whole chain
//! atomically (Arc swap in the map); readers holding a resolved chain keep
//! the version they resolved.

use std::sync::Arc;

use dashmap::DashMap;

#[derive(Default)]
pub struct ChainRegistry {
    chains: DashMap<String, Arc<Vec<String>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self {
            chains: DashMap::new(),
        }
    }

    /// Register or replace a chain.
    pub fn register(&self, workflow: impl Into<String>, policy_ids: Vec<String>) {
        let workflow = workflow.into();
        tracing::info!(workflow = %workflow, policies = policy_ids.len(), "chain registered");
        self.chains.insert(workflow, Arc::new(policy_ids));
    }

    pub fn resolve(&self, workflow: &str) -> Option<Arc<Vec<String>>> {
        self.chains.get(workflow).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, workflow: &str) -> bool {
        self.chains.contains_key(workflow)
    }

    /// Registered workflow names, sorted for deterministic output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.chains.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn register_replaces_whole_chain() {
        let reg = ChainRegistry::new();
        reg.register("access_control", vec!["a".into(), "b".into()]);

        let held = reg.resolve("access_control").unwrap();
        reg.register("access_control", vec!["c".into()]);

        // Old resolution is unchanged; new resolution sees the replacement.
        assert_eq!(held.as_slice(), ["a".to_string(), "b".to_string()]);
        assert_eq!(reg.resolve("access_control").unwrap().as_slice(), ["c".to_string()]);
    }

    #[test]
    fn names_are_sorted() {
        let reg = ChainRegistry::new();
        reg.register("tool_operations", vec![]);
        reg.register("access_control", vec![]);
        assert_eq!(reg.names(), vec!["access_control", "tool_operations"]);
    }
}
