//! Core types for the governance kernel.

pub mod governance;
pub mod evidence;
pub mod causal;
pub mod bundle;

pub use governance::{
    GovernanceState, GovernanceEventType, GovernanceEvent, EventDraft,
    create_governance_event, GENESIS_HASH,
};
pub use evidence::{
    EvidenceKind, EvidenceScope, Evidence, VerificationResult,
    AssertedAbsence, NegativeAuthorityProof,
};
pub use causal::{SymbolicRefusalReason, EvidenceRef, CausalNode, CausalEdge, CausalDag};
pub use bundle::{AdmissibilityReport, ProofBundle};
