//! Proof bundles and independent capsule verification.
//!
//! ```text
//! governance spec ─┐
//! event chain ─────┤
//! authority claims ┼─► BundleExporter::export ─► ProofBundle ─┐
//! negative proof ──┘                                          ├─► AuditCapsule ─► CapsuleVerifier
//!                                          evidence Capsule ──┘
//! ```
//!
//! The exporter aggregates and hashes; it verifies nothing. The capsule
//! verifier re-derives what it can and reports anything it cannot prove as
//! incomplete, which is always a failure.

pub mod bundle;
pub mod capsule_verifier;

pub use bundle::{export_bundle, BundleExporter, DEFAULT_EVENT_SLICE_SIZE};
pub use capsule_verifier::{
    AuditCapsule, CapsuleCheck, CapsuleCheckFailure, CapsuleReport, CapsuleVerifier,
    GovernanceSection, NegativeAuthoritySection,
};

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalValue, CanonicalizationError, ToCanonical, Value};

/// Optional capability of authority claim records.
///
/// A claim that carries its own identifier returns it from [`claim_id`];
/// otherwise the exporter derives one from the claim's canonical hash.
///
/// [`claim_id`]: AuthorityClaim::claim_id
pub trait AuthorityClaim: ToCanonical {
    /// Caller-assigned identifier, if any.
    fn claim_id(&self) -> Option<String> {
        None
    }
}

/// Plain canonical maps carry no identifier capability, even when they
/// contain a `claim_id` field.
impl AuthorityClaim for CanonicalValue {}

impl AuthorityClaim for Value {}

/// A recorded grant of authority to an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityGrant {
    /// Identifier of the grant.
    pub claim_id: String,
    /// Actor holding the authority.
    pub holder: String,
    /// What the authority covers.
    pub scope: String,
    /// Whether automated scoring may decide refusals under this grant.
    pub ml_authorize: bool,
}

impl ToCanonical for AuthorityGrant {
    fn to_canonical(&self) -> Result<Value, CanonicalizationError> {
        Value::from_serialize(self)
    }
}

impl AuthorityClaim for AuthorityGrant {
    fn claim_id(&self) -> Option<String> {
        Some(self.claim_id.clone())
    }
}
