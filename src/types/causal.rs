//! Symbolic causal graph types for refusal decisions.

use serde::{Deserialize, Serialize};

/// Fixed, non-numeric category explaining a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SymbolicRefusalReason {
    /// A governance invariant would be violated.
    InvariantViolated,
    /// Required evidence is missing.
    EvidenceMissing,
    /// Evidence exists but did not verify.
    EvidenceUnverified,
    /// The acting party lacks authority.
    AuthorityAbsent,
    /// Policy prohibits the action.
    PolicyProhibited,
    /// A detected threat is unresolved.
    ThreatUnresolved,
    /// An acknowledgment obligation is pending.
    AcknowledgmentPending,
}

impl SymbolicRefusalReason {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvariantViolated => "INVARIANT_VIOLATED",
            Self::EvidenceMissing => "EVIDENCE_MISSING",
            Self::EvidenceUnverified => "EVIDENCE_UNVERIFIED",
            Self::AuthorityAbsent => "AUTHORITY_ABSENT",
            Self::PolicyProhibited => "POLICY_PROHIBITED",
            Self::ThreatUnresolved => "THREAT_UNRESOLVED",
            Self::AcknowledgmentPending => "ACKNOWLEDGMENT_PENDING",
        }
    }
}

impl std::fmt::Display for SymbolicRefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evidence reference as handed to the causal builder.
///
/// Only [`EvidenceRef::Symbol`] is legal inside a causal graph. The numeric
/// variants exist so that numbers arriving from untyped input are
/// representable, and therefore rejectable, instead of being stringified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceRef {
    /// Symbolic reference (legal).
    Symbol(String),
    /// Integer value (illegal in causality).
    Integer(i64),
    /// Float value (illegal in causality).
    Float(f64),
}

impl EvidenceRef {
    /// True for numeric references.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// The symbol, if this is a symbolic reference.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for EvidenceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symbol(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for EvidenceRef {
    fn from(s: &str) -> Self {
        Self::Symbol(s.to_string())
    }
}

impl From<String> for EvidenceRef {
    fn from(s: String) -> Self {
        Self::Symbol(s)
    }
}

impl From<i64> for EvidenceRef {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for EvidenceRef {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for EvidenceRef {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

/// One cause in a refusal's causal graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalNode {
    /// Node identifier, referenced by edges.
    pub node_id: String,
    /// Symbolic category of the cause.
    pub symbolic_reason: SymbolicRefusalReason,
    /// Supporting evidence references. Numeric entries are illegal.
    pub evidence_refs: Vec<EvidenceRef>,
}

impl CausalNode {
    /// First numeric reference, if any.
    pub fn numeric_leak(&self) -> Option<&EvidenceRef> {
        self.evidence_refs.iter().find(|r| r.is_numeric())
    }
}

/// Directed edge `(from_node, to_node)`.
pub type CausalEdge = (String, String);

/// Frozen causal graph of one refusal decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalDag {
    /// Causes in insertion order.
    pub nodes: Vec<CausalNode>,
    /// Edges in insertion order.
    pub edges: Vec<CausalEdge>,
    /// Hash of `{nodes, edges}` under the `CausalDAG` domain.
    pub dag_hash: String,
}
