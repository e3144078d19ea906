//! Proof bundle: the portable audit artifact.

use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalValue;

use super::evidence::NegativeAuthorityProof;
use super::governance::GovernanceEvent;

/// Minimal admissibility view derived from the event chain.
///
/// A derived view, not canonical truth: events are the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissibilityReport {
    /// Always true: the view is computed from events only.
    pub derived_from_events: bool,
    /// Number of events the view was derived from.
    pub event_count: usize,
}

impl AdmissibilityReport {
    /// Derive the view from an event count.
    pub fn from_event_count(event_count: usize) -> Self {
        Self {
            derived_from_events: true,
            event_count,
        }
    }
}

/// Aggregated, hashed audit artifact.
///
/// The exporter trusts its inputs; this bundle asserts nothing that an
/// independent verifier has not re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Governance specification in canonical form.
    pub governance_spec: CanonicalValue,
    /// Hash of the specification under `GovernanceSpec`.
    pub governance_spec_hash: String,
    /// Derived admissibility view.
    pub admissibility_report: AdmissibilityReport,
    /// Hash of the admissibility view under `AdmissibilityReport`.
    pub admissibility_hash: String,
    /// Normalized authority claims.
    pub authority_claims: Vec<CanonicalValue>,
    /// Identifier of each claim, in the same order.
    pub authority_claim_ids: Vec<String>,
    /// Negative-authority proof.
    pub negative_authority_proof: NegativeAuthorityProof,
    /// Last N events of the chain.
    pub event_chain_slice: Vec<GovernanceEvent>,
    /// Optional invariant proofs carried along.
    pub invariant_proof_subset: Option<Vec<CanonicalValue>>,
    /// Top-level hash under `MinimalProofBundle`.
    pub bundle_hash: String,
}
