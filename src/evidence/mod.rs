//! Verifiable evidence with a hard trust boundary.
//!
//! Canonical artifacts live in a [`Capsule`] under deterministic references.
//! Verification re-derives each artifact's hash from capsule content and
//! compares it with the hash the evidence record committed to.
//!
//! ## Failure Policy
//!
//! Verification runs against potentially adversarial input, so it is
//! fail-soft: every failure becomes an invalid [`VerificationResult`]
//! instead of an error the caller has to handle.
//!
//! [`VerificationResult`]: crate::types::VerificationResult

pub mod capsule;
pub mod verifier;
pub mod cached;
pub mod negative_authority;

pub use capsule::{Capsule, CapsuleError};
pub use verifier::ProofVerifier;
pub use cached::{CacheConfig, CacheStats, CachedProofVerifier, CachedVerification};
pub use negative_authority::{generate, scan_reference, NegativeAuthorityError};

/// Generation method of authority scan evidence.
pub const SCAN_METHOD: &str = "ml_authority_scan";

/// Generation method of the numeric-gate static proof.
pub const STATIC_PROOF_METHOD: &str = "ast_numeric_gate_verification";

/// Recoverable evidence verification error.
///
/// Never escapes [`ProofVerifier`]; it is converted into an invalid result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvidenceVerificationError {
    /// The capsule has no artifact under the reference.
    #[error("Evidence ref not found in capsule: {0}")]
    ReferenceNotFound(String),
    /// Scan evidence produced by an unrecognized method.
    #[error("Unknown scan method: {0}")]
    UnknownScanMethod(String),
    /// The evidence kind is not one the kernel knows.
    #[error("Unknown evidence kind: {0}")]
    UnknownKind(String),
    /// The evidence record could not be parsed.
    #[error("Malformed evidence: {0}")]
    Malformed(String),
}
