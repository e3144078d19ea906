//! Builder for the causal graph of one refusal decision.

use serde::{Deserialize, Serialize};

use crate::hashing::{domain, hash_serializable};
use crate::types::{CausalDag, CausalEdge, CausalNode, EvidenceRef, SymbolicRefusalReason};

use super::NumericAuthorityViolation;

/// A partially built causal graph handed between owners.
///
/// Drafts come from outside the builder (another process, a file, a queue),
/// so nothing about their content is trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefusalDraft {
    /// Accumulated causes.
    pub nodes: Vec<CausalNode>,
    /// Accumulated edges.
    pub edges: Vec<CausalEdge>,
}

#[derive(Serialize)]
struct DagBody<'a> {
    nodes: &'a [CausalNode],
    edges: &'a [CausalEdge],
}

/// Builds a symbolic causal DAG for a refusal decision.
///
/// Single writer: one owner mutates a builder at a time. No cycle check is
/// performed; callers are responsible for producing a DAG.
#[derive(Debug, Default)]
pub struct RefusalDecisionBuilder {
    nodes: Vec<CausalNode>,
    edges: Vec<CausalEdge>,
}

impl RefusalDecisionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building from a draft.
    ///
    /// The draft is adopted as is, without the insertion check. [`build`]
    /// still rejects any numeric reference it carries.
    ///
    /// [`build`]: Self::build
    pub fn resume(draft: RefusalDraft) -> Self {
        Self {
            nodes: draft.nodes,
            edges: draft.edges,
        }
    }

    /// Add one cause.
    ///
    /// Rejects the whole cause if any reference is numeric; the builder is
    /// left unchanged.
    pub fn add_symbolic_cause(
        &mut self,
        node_id: impl Into<String>,
        reason: SymbolicRefusalReason,
        evidence_refs: Vec<EvidenceRef>,
    ) -> Result<&mut Self, NumericAuthorityViolation> {
        let node = CausalNode {
            node_id: node_id.into(),
            symbolic_reason: reason,
            evidence_refs,
        };

        if let Some(leak) = node.numeric_leak() {
            tracing::warn!(node_id = %node.node_id, reference = %leak, "numeric cause rejected");
            return Err(NumericAuthorityViolation::AtInsertion {
                reference: leak.to_string(),
                node_id: node.node_id,
            });
        }

        self.nodes.push(node);
        Ok(self)
    }

    /// Add an edge `from_node -> to_node`.
    pub fn add_causal_edge(
        &mut self,
        from_node: impl Into<String>,
        to_node: impl Into<String>,
    ) -> &mut Self {
        self.edges.push((from_node.into(), to_node.into()));
        self
    }

    /// Causes accumulated so far.
    pub fn nodes(&self) -> &[CausalNode] {
        &self.nodes
    }

    /// Edges accumulated so far.
    pub fn edges(&self) -> &[CausalEdge] {
        &self.edges
    }

    /// Snapshot the current state as a transferable draft.
    pub fn to_draft(&self) -> RefusalDraft {
        RefusalDraft {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    /// Freeze the graph.
    ///
    /// Every reference is scanned again before hashing. On failure no DAG is
    /// returned and the builder keeps its content.
    pub fn build(&self) -> Result<CausalDag, NumericAuthorityViolation> {
        for node in &self.nodes {
            if let Some(leak) = node.numeric_leak() {
                tracing::warn!(node_id = %node.node_id, reference = %leak, "numeric leak at build");
                return Err(NumericAuthorityViolation::AtBuild {
                    node_id: node.node_id.clone(),
                    reference: leak.to_string(),
                });
            }
        }

        let body = DagBody {
            nodes: &self.nodes,
            edges: &self.edges,
        };
        let dag_hash = hash_serializable(&body, domain::CAUSAL_DAG)?;

        tracing::info!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            dag_hash = %dag_hash,
            "causal graph frozen"
        );

        Ok(CausalDag {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            dag_hash,
        })
    }
}
