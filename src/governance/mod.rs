//! Event-sourced governance: the state machine and chain replay.
//!
//! ## Core Contract
//!
//! 1. State changes only through [`GovernanceStateMachine::transition`]
//! 2. Each accepted transition appends exactly one hash-linked event
//! 3. Any rejection leaves state, events and hash pointer untouched
//! 4. [`assert_governance_invariants`] re-derives every link from event bodies
//!
//! ```text
//! transition() → guards → create_governance_event() → append + advance pointers
//!                                                           ↓
//!                                       assert_governance_invariants(events)
//! ```

pub mod state_machine;
pub mod invariants;

pub use state_machine::GovernanceStateMachine;
pub use invariants::{assert_governance_invariants, replay_chain, ChainSummary};

use crate::canonical::CanonicalizationError;
use crate::types::{GovernanceEventType, GovernanceState};

/// Governance invariant violation.
///
/// Fatal: governance progression halts and no partial mutation occurs.
/// There is no retry path; callers fix the request and call again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GovernanceError {
    /// CLOSED requested while workflows are still blocking closure.
    #[error("CLOSED blocked by workflows: {workflows:?}")]
    ClosureBlocked {
        /// Outstanding workflow ids, sorted.
        workflows: Vec<String>,
    },
    /// A refusal decision outside the ASSESSED state.
    #[error("Refusal requires ASSESSED state (current: {current})")]
    RefusalRequiresAssessed {
        /// State the machine was in.
        current: GovernanceState,
    },
    /// Pair not present in the transition table.
    #[error("Invalid transition {from} -> {to} ({event_type})")]
    IllegalTransition {
        /// Current state.
        from: GovernanceState,
        /// Requested state.
        to: GovernanceState,
        /// Event that requested it.
        event_type: GovernanceEventType,
    },
    /// `prev_event_hash` does not match the running chain pointer.
    #[error("Event chain broken at {event_id}")]
    ChainBroken {
        /// Offending event.
        event_id: String,
    },
    /// Stored hash differs from the hash of the event body.
    #[error("Event hash mismatch at {event_id}")]
    HashMismatch {
        /// Offending event.
        event_id: String,
    },
    /// `state_before` differs from the previous event's `state_after`.
    #[error("State continuity violated at {event_id}")]
    StateDiscontinuity {
        /// Offending event.
        event_id: String,
    },
    /// Payload or event body could not be canonicalized.
    #[error("Canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

impl GovernanceError {
    /// The event a replay failure points at.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::ChainBroken { event_id }
            | Self::HashMismatch { event_id }
            | Self::StateDiscontinuity { event_id } => Some(event_id),
            _ => None,
        }
    }
}
