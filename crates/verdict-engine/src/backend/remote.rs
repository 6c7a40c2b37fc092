//! Remote decision-point backend.
//!
//! Translates the context into the external engine's input document, issues
//! the query under a per-call timeout, and maps the engine's verdict
//! vocabulary onto the four-value decision type. The vocabulary mapping is
//! centralized in [`map_verdict`] — the only coupling point to the remote
//! engine's response shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use verdict_core::error::{Result, VerdictError};
use verdict_core::policy::{
    BackendHealth, Decision, PolicyContext, PolicyDescriptor, PolicyResult,
};

use crate::config::RemoteBackendConfig;

use super::PolicyBackend;

/// Input document sent to the decision point.
#[derive(Debug, Serialize)]
struct DecisionQuery<'a> {
    input: DecisionInput<'a>,
}

#[derive(Debug, Serialize)]
struct DecisionInput<'a> {
    policy_id: &'a str,
    #[serde(flatten)]
    context: &'a PolicyContext,
}

/// Response document from the decision point.
#[derive(Debug, Default, Deserialize)]
struct DecisionDocument {
    #[serde(default)]
    result: Option<VerdictDocument>,
}

#[derive(Debug, Default, Deserialize)]
struct VerdictDocument {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    allow: Option<bool>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Map the remote vocabulary onto [`Decision`] plus a reason.
///
/// Anything unrecognized resolves to UNKNOWN — never silently ALLOW.
fn map_verdict(doc: DecisionDocument) -> (Decision, String, Option<String>) {
    let Some(verdict) = doc.result else {
        return (
            Decision::Unknown,
            "decision point returned no verdict".into(),
            None,
        );
    };

    let reason = verdict.reason;
    let name = verdict.name;

    if let Some(word) = verdict.decision.as_deref() {
        let decision = match word.to_ascii_lowercase().as_str() {
            "allow" | "permit" | "grant" => Decision::Allow,
            "deny" | "block" | "reject" => Decision::Deny,
            "warn" | "flag" | "caution" => Decision::Warn,
            _ => {
                return (
                    Decision::Unknown,
                    format!("decision point returned unrecognized verdict: {word}"),
                    name,
                )
            }
        };
        let reason = reason.unwrap_or_else(|| format!("decision point verdict: {word}"));
        return (decision, reason, name);
    }

    match verdict.allow {
        Some(true) => (
            Decision::Allow,
            reason.unwrap_or_else(|| "decision point allowed".into()),
            name,
        ),
        Some(false) => (
            Decision::Deny,
            reason.unwrap_or_else(|| "decision point denied".into()),
            name,
        ),
        None => (
            Decision::Unknown,
            "decision point returned no verdict".into(),
            name,
        ),
    }
}

/// HTTP client for an external decision point (OPA-style data API).
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl RemoteBackend {
    pub fn new(cfg: &RemoteBackendConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VerdictError::Internal(format!("http client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn classify_transport_error(&self, policy_id: &str, err: &reqwest::Error) -> PolicyResult {
        let reason = if err.is_timeout() {
            format!(
                "decision point timed out after {}ms",
                self.timeout.as_millis()
            )
        } else {
            format!("decision point unreachable: {err}")
        };
        tracing::warn!(policy_id, error = %err, "remote evaluation degraded to unknown");
        PolicyResult::unknown(policy_id, reason)
    }
}

#[async_trait]
impl PolicyBackend for RemoteBackend {
    fn id(&self) -> &'static str {
        "remote"
    }

    async fn evaluate(&self, policy_id: &str, ctx: &PolicyContext) -> PolicyResult {
        let url = format!("{}/v1/data/{policy_id}", self.base_url);
        let query = DecisionQuery {
            input: DecisionInput {
                policy_id,
                context: ctx,
            },
        };

        let response = match self.client.post(&url).json(&query).send().await {
            Ok(r) => r,
            Err(e) => return self.classify_transport_error(policy_id, &e),
        };

        let status = response.status();
        if !status.is_success() {
            return PolicyResult::unknown(
                policy_id,
                format!("decision point returned status {status}"),
            );
        }

        let doc: DecisionDocument = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                return PolicyResult::unknown(
                    policy_id,
                    format!("decision point response undecodable: {e}"),
                )
            }
        };

        let (decision, reason, name) = map_verdict(doc);
        let name = name.unwrap_or_else(|| policy_id.to_string());
        PolicyResult::new(policy_id, name, decision, reason)
    }

    async fn list_policies(&self) -> Vec<PolicyDescriptor> {
        let url = format!("{}/v1/policies", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => r.json::<Vec<PolicyDescriptor>>().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "policy listing undecodable");
                Vec::new()
            }),
            Ok(r) => {
                tracing::warn!(status = %r.status(), "policy listing unavailable");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "policy listing unreachable");
                Vec::new()
            }
        }
    }

    async fn health_check(&self) -> BackendHealth {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) if r.status().is_success() => {
                BackendHealth::healthy(self.id()).with_detail("url", &self.base_url)
            }
            Ok(r) => BackendHealth::unhealthy(self.id(), format!("health status {}", r.status())),
            Err(e) => BackendHealth::unhealthy(self.id(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn doc(json: &str) -> DecisionDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn verdict_words_map_onto_decisions() {
        let cases = [
            ("allow", Decision::Allow),
            ("permit", Decision::Allow),
            ("grant", Decision::Allow),
            ("deny", Decision::Deny),
            ("block", Decision::Deny),
            ("reject", Decision::Deny),
            ("warn", Decision::Warn),
            ("flag", Decision::Warn),
            ("CAUTION", Decision::Warn),
        ];
        for (word, expected) in cases {
            let (decision, _, _) =
                map_verdict(doc(&format!("{{\"result\":{{\"decision\":\"{word}\"}}}}")));
            assert_eq!(decision, expected, "{word}");
        }
    }

    #[test]
    fn unrecognized_verdict_is_unknown() {
        let (decision, reason, _) =
            map_verdict(doc("{\"result\":{\"decision\":\"shrug\"}}"));
        assert_eq!(decision, Decision::Unknown);
        assert!(reason.contains("shrug"));
    }

    #[test]
    fn boolean_allow_fallback() {
        let (decision, _, _) = map_verdict(doc("{\"result\":{\"allow\":true}}"));
        assert_eq!(decision, Decision::Allow);
        let (decision, _, _) = map_verdict(doc("{\"result\":{\"allow\":false}}"));
        assert_eq!(decision, Decision::Deny);
    }

    #[test]
    fn empty_body_is_unknown_never_allow() {
        let (decision, _, _) = map_verdict(doc("{}"));
        assert_eq!(decision, Decision::Unknown);
        let (decision, _, _) = map_verdict(doc("{\"result\":{}}"));
        assert_eq!(decision, Decision::Unknown);
    }

    #[test]
    fn remote_reason_is_preserved() {
        let (_, reason, name) = map_verdict(doc(
            "{\"result\":{\"decision\":\"deny\",\"reason\":\"quota exhausted\",\"name\":\"Rate limit\"}}",
        ));
        assert_eq!(reason, "quota exhausted");
        assert_eq!(name.as_deref(), Some("Rate limit"));
    }
}
