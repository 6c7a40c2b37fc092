//! The four-valued decision type and its fail-closed aggregation algebra.

use serde::{Deserialize, Serialize};

/// Atomic outcome of evaluating one policy against a context.
///
/// `Unknown` means "this backend could not render a verdict" and is never
/// coerced to `Allow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
    Warn,
    Unknown,
}

impl Decision {
    /// String representation used in wire responses and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Deny => "deny",
            Decision::Warn => "warn",
            Decision::Unknown => "unknown",
        }
    }

    /// Restrictiveness rank: `Deny > Unknown > Warn > Allow`.
    ///
    /// "No answer" is a stronger risk signal than "answer, with caveats",
    /// so Unknown sits above Warn.
    pub fn severity(self) -> u8 {
        match self {
            Decision::Allow => 0,
            Decision::Warn => 1,
            Decision::Unknown => 2,
            Decision::Deny => 3,
        }
    }

    /// Whether an operation gated on this decision may proceed.
    /// Warn permits but flags for audit; Deny and Unknown both block.
    pub fn permits(self) -> bool {
        matches!(self, Decision::Allow | Decision::Warn)
    }

    /// Fold a set of decisions into the most restrictive one.
    ///
    /// Pure function of its input: an empty set yields `Allow` by
    /// definition (chains decide *what* to check, not *whether* to check).
    pub fn aggregate<I>(decisions: I) -> Decision
    where
        I: IntoIterator<Item = Decision>,
    {
        decisions
            .into_iter()
            .max_by_key(|d| d.severity())
            .unwrap_or(Decision::Allow)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
