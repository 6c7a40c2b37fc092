//! Operation categories and per-agent compliance rollups.

use serde::{Deserialize, Serialize};

use crate::error::VerdictError;

/// Coarse operation categories an enforcement caller may gate on.
///
/// The stable string form doubles as the chain name the category maps to,
/// so `enforce("tool_operations", ..)` and the registry stay in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    LlmOperations,
    McpOperations,
    ToolOperations,
    AgentBehavior,
}

impl OperationType {
    /// Every category, in declaration order. Used as the fail-closed
    /// default capability set for unregistered agents.
    pub const ALL: [OperationType; 4] = [
        OperationType::LlmOperations,
        OperationType::McpOperations,
        OperationType::ToolOperations,
        OperationType::AgentBehavior,
    ];

    /// Chain name this category resolves to.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationType::LlmOperations => "llm_operations",
            OperationType::McpOperations => "mcp_operations",
            OperationType::ToolOperations => "tool_operations",
            OperationType::AgentBehavior => "agent_behavior",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm_operations" => Ok(OperationType::LlmOperations),
            "mcp_operations" => Ok(OperationType::McpOperations),
            "tool_operations" => Ok(OperationType::ToolOperations),
            "agent_behavior" => Ok(OperationType::AgentBehavior),
            other => Err(VerdictError::BadRequest(format!(
                "unknown operation type: {other}"
            ))),
        }
    }
}

/// Per-agent compliance rollup across the chains its capabilities map to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub agent_id: String,
    /// True only when no evaluated policy produced DENY or WARN.
    pub is_compliant: bool,
    /// Policy ids that produced DENY or WARN.
    pub violated_policies: Vec<String>,
    /// Additional policy ids recommended for this agent.
    pub recommended_policies: Vec<String>,
}
