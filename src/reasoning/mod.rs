//! Symbolic-only causal reasoning for refusal decisions.
//!
//! Numeric authority is prohibited: a refusal's causal graph may cite only
//! symbolic evidence references. The prohibition is enforced at two
//! independent points, when a cause is added and again when the graph is
//! frozen, so a cause that slipped past the first check still cannot reach a
//! hashed [`CausalDag`](crate::types::CausalDag).

pub mod refusal_builder;

pub use refusal_builder::{RefusalDecisionBuilder, RefusalDraft};

use crate::canonical::CanonicalizationError;

/// Numeric authority violation.
///
/// Fatal: the offending cause or build is aborted with no partial result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NumericAuthorityViolation {
    /// Numeric reference offered to `add_symbolic_cause`.
    #[error("Numeric values prohibited in refusal causality; use symbolic refs only (node {node_id}, ref {reference})")]
    AtInsertion {
        /// Node that was being added.
        node_id: String,
        /// First numeric reference found.
        reference: String,
    },
    /// Numeric reference found while freezing the graph.
    #[error("HARD FAIL: Numeric value detected in causal DAG (node {node_id}, ref {reference})")]
    AtBuild {
        /// Node carrying the leak.
        node_id: String,
        /// First numeric reference found.
        reference: String,
    },
    /// The graph body could not be canonicalized for hashing.
    #[error("Causal graph canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl NumericAuthorityViolation {
    /// Node the violation points at.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::AtInsertion { node_id, .. } | Self::AtBuild { node_id, .. } => Some(node_id),
            Self::Canonicalization(_) => None,
        }
    }
}
