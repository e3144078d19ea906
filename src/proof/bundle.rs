//! Proof bundle exporter.
//!
//! Pure aggregation: the exporter trusts its inputs and performs no
//! verification of its own.

use serde::Serialize;

use crate::canonical::{canonicalize, CanonicalValue, CanonicalizationError, Value};
use crate::hashing::{domain, domain_hash, hash_canonical, hash_serializable, reference_prefix};
use crate::types::{AdmissibilityReport, GovernanceEvent, NegativeAuthorityProof, ProofBundle};

use super::AuthorityClaim;

/// Number of trailing events exported by default.
pub const DEFAULT_EVENT_SLICE_SIZE: usize = 5;

#[derive(Serialize)]
struct BundleBody<'a> {
    governance_spec_hash: &'a str,
    admissibility_hash: &'a str,
    authority_claim_ids: &'a [String],
    negative_authority_proof_hash: &'a str,
    event_chain_count: usize,
}

/// Exports proof bundles with a fixed audit slice size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleExporter {
    event_slice_size: usize,
}

impl Default for BundleExporter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_SLICE_SIZE)
    }
}

impl BundleExporter {
    /// Exporter keeping the last `event_slice_size` events. Zero exports no events.
    pub fn new(event_slice_size: usize) -> Self {
        Self { event_slice_size }
    }

    /// Audit slice size.
    pub fn event_slice_size(&self) -> usize {
        self.event_slice_size
    }

    /// Aggregate the inputs into one hashed bundle.
    pub fn export(
        &self,
        governance_spec: &Value,
        events: &[GovernanceEvent],
        authority_claims: &[&dyn AuthorityClaim],
        negative_authority_proof: &NegativeAuthorityProof,
        invariant_proofs: Option<Vec<CanonicalValue>>,
    ) -> Result<ProofBundle, CanonicalizationError> {
        let governance_spec = canonicalize(governance_spec)?;
        let governance_spec_hash = hash_canonical(&governance_spec, Some(domain::GOVERNANCE_SPEC));

        let admissibility_report = AdmissibilityReport::from_event_count(events.len());
        let admissibility_hash =
            hash_serializable(&admissibility_report, domain::ADMISSIBILITY_REPORT)?;

        let start = events.len().saturating_sub(self.event_slice_size);
        let event_chain_slice = events[start..].to_vec();

        let mut claims = Vec::with_capacity(authority_claims.len());
        let mut claim_ids = Vec::with_capacity(authority_claims.len());
        for claim in authority_claims {
            let (canonical, id) = normalize_claim(*claim)?;
            claims.push(canonical);
            claim_ids.push(id);
        }

        let body = BundleBody {
            governance_spec_hash: &governance_spec_hash,
            admissibility_hash: &admissibility_hash,
            authority_claim_ids: &claim_ids,
            negative_authority_proof_hash: &negative_authority_proof.proof_hash,
            event_chain_count: event_chain_slice.len(),
        };
        let bundle_hash = hash_serializable(&body, domain::PROOF_BUNDLE)?;

        tracing::info!(
            bundle_hash = %bundle_hash,
            events = events.len(),
            exported = event_chain_slice.len(),
            claims = claim_ids.len(),
            "proof bundle exported"
        );

        Ok(ProofBundle {
            governance_spec,
            governance_spec_hash,
            admissibility_report,
            admissibility_hash,
            authority_claims: claims,
            authority_claim_ids: claim_ids,
            negative_authority_proof: negative_authority_proof.clone(),
            event_chain_slice,
            invariant_proof_subset: invariant_proofs,
            bundle_hash,
        })
    }

    /// Recompute a bundle's top-level hash from its own fields.
    pub fn recompute_bundle_hash(bundle: &ProofBundle) -> Result<String, CanonicalizationError> {
        let body = BundleBody {
            governance_spec_hash: &bundle.governance_spec_hash,
            admissibility_hash: &bundle.admissibility_hash,
            authority_claim_ids: &bundle.authority_claim_ids,
            negative_authority_proof_hash: &bundle.negative_authority_proof.proof_hash,
            event_chain_count: bundle.event_chain_slice.len(),
        };
        hash_serializable(&body, domain::PROOF_BUNDLE)
    }
}

/// Export with the default slice size.
pub fn export_bundle(
    governance_spec: &Value,
    events: &[GovernanceEvent],
    authority_claims: &[&dyn AuthorityClaim],
    negative_authority_proof: &NegativeAuthorityProof,
    invariant_proofs: Option<Vec<CanonicalValue>>,
) -> Result<ProofBundle, CanonicalizationError> {
    BundleExporter::default().export(
        governance_spec,
        events,
        authority_claims,
        negative_authority_proof,
        invariant_proofs,
    )
}

fn normalize_claim(claim: &dyn AuthorityClaim) -> Result<(CanonicalValue, String), CanonicalizationError> {
    let view = claim.to_canonical()?;
    let canonical = canonicalize(&view)?;
    let id = match claim.claim_id() {
        Some(id) => id,
        None => {
            let hash = domain_hash(&view, domain::AUTHORITY_CLAIM)?;
            format!("claim_{}", reference_prefix(&hash))
        }
    };
    Ok((canonical, id))
}
