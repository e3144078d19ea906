//! # governance-kernel
//!
//! Deterministic, replayable decision governance.
//!
//! The kernel answers one question:
//!
//! > Can every decision, and every claim made in support of it, be re-derived
//! > from canonical bytes alone?
//!
//! ## Core Contract
//!
//! 1. Every state change is a hash-linked [`GovernanceEvent`]
//! 2. Evidence is verified against capsule-resident artifacts, never against
//!    the convenience copy carried on the record
//! 3. A refusal's causal graph cites symbolic references only
//! 4. Proof bundles aggregate the above into one hashed audit artifact
//!
//! ## Architecture
//!
//! ```text
//! Clock ─┐
//! Canonicalizer → Hasher ─┬─► GovernanceStateMachine ──► replay_chain
//!                         ├─► ProofVerifier ◄── Capsule ◄── negative_authority::generate
//!                         ├─► RefusalDecisionBuilder ──► CausalDag
//!                         └─► BundleExporter ──► ProofBundle ──► AuditCapsule ──► CapsuleVerifier
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same inputs + same clock session → identical event ids and hashes
//! - Mapping keys and set members are canonically ordered before hashing
//! - Domain tags keep identical payloads in different roles from colliding
//! - The kernel never reads the wall clock

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod hashing;
pub mod clock;
pub mod config;
pub mod types;
pub mod governance;
pub mod evidence;
pub mod reasoning;
pub mod proof;

// Re-exports
pub use canonical::{canonicalize, CanonicalValue, CanonicalizationError, ToCanonical, Value};
pub use hashing::{deterministic_hash, domain_hash, hash_canonical, HASH_REFERENCE_LENGTH};
pub use clock::{Clock, DeterministicClock};
pub use config::{KernelConfig, LogFormat};
pub use types::{
    GovernanceState, GovernanceEventType, GovernanceEvent, GENESIS_HASH,
    EvidenceKind, EvidenceScope, Evidence, VerificationResult,
    AssertedAbsence, NegativeAuthorityProof,
    SymbolicRefusalReason, EvidenceRef, CausalNode, CausalDag,
    AdmissibilityReport, ProofBundle,
};
pub use governance::{
    GovernanceError, GovernanceStateMachine, assert_governance_invariants, replay_chain,
    ChainSummary,
};
pub use evidence::{
    Capsule, CapsuleError, ProofVerifier, CachedProofVerifier, NegativeAuthorityError,
};
pub use reasoning::{NumericAuthorityViolation, RefusalDecisionBuilder, RefusalDraft};
pub use proof::{
    AuthorityClaim, AuthorityGrant, BundleExporter, export_bundle,
    AuditCapsule, CapsuleVerifier, CapsuleReport, CapsuleCheckFailure,
};

/// Version of the kernel's behaviour. Replays are only guaranteed within one version.
pub const KERNEL_VERSION: &str = concat!("governance-kernel ", env!("CARGO_PKG_VERSION"));

/// Schema version for all wire records.
/// Increment on breaking changes to any schema type.
pub const GOVERNANCE_SCHEMA_VERSION: &str = "1.0.0";
