//! Governance states, event types and hash-linked governance events.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalizationError, Value};
use crate::clock::Clock;
use crate::hashing::{domain, domain_hash, hash_serializable, reference_prefix};

/// Previous-hash sentinel of the first event in a chain.
pub const GENESIS_HASH: &str = "genesis";

/// State of a governance cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceState {
    /// Inputs observed, nothing assessed yet.
    Observed,
    /// Observation assessed.
    Assessed,
    /// Decision taken.
    Decided,
    /// Decision committed.
    Committed,
    /// Commitment acknowledged.
    Acked,
    /// Cycle closed. Terminal.
    Closed,
}

impl GovernanceState {
    /// States reachable in one transition.
    pub fn allowed_targets(&self) -> &'static [GovernanceState] {
        match self {
            Self::Observed => &[Self::Assessed],
            Self::Assessed => &[Self::Decided],
            Self::Decided => &[Self::Committed],
            Self::Committed => &[Self::Acked, Self::Closed],
            Self::Acked => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Check the transition table.
    pub fn can_transition_to(&self, target: GovernanceState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observed => "OBSERVED",
            Self::Assessed => "ASSESSED",
            Self::Decided => "DECIDED",
            Self::Committed => "COMMITTED",
            Self::Acked => "ACKED",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for GovernanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GovernanceState> for Value {
    fn from(state: GovernanceState) -> Self {
        Value::tagged(state.as_str())
    }
}

/// Kind of governance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GovernanceEventType {
    /// An observation entered the cycle.
    ObservationRecorded,
    /// The observation was assessed.
    AssessmentCompleted,
    /// A decision was made (`payload.decision` carries it).
    DecisionMade,
    /// The decision was committed.
    DecisionCommitted,
    /// A commitment was acknowledged.
    AcknowledgmentReceived,
    /// The cycle was closed.
    CycleClosed,
    /// A threat was detected by an external harness.
    ThreatDetected,
}

impl GovernanceEventType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObservationRecorded => "OBSERVATION_RECORDED",
            Self::AssessmentCompleted => "ASSESSMENT_COMPLETED",
            Self::DecisionMade => "DECISION_MADE",
            Self::DecisionCommitted => "DECISION_COMMITTED",
            Self::AcknowledgmentReceived => "ACKNOWLEDGMENT_RECEIVED",
            Self::CycleClosed => "CYCLE_CLOSED",
            Self::ThreatDetected => "THREAT_DETECTED",
        }
    }
}

impl std::fmt::Display for GovernanceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable, hash-linked record of one state transition.
///
/// Invariant: `event_hash == hash(body without event_hash, "GovernanceEvent")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceEvent {
    /// `gov_{tick}_{EVENT_TYPE}_{payload hash prefix}`.
    pub event_id: String,
    /// Kind of event.
    pub event_type: GovernanceEventType,
    /// Logical tick.
    pub tick: u64,
    /// Hash of the previous event, or [`GENESIS_HASH`].
    pub prev_event_hash: String,
    /// Domain-separated hash of the payload.
    pub payload_hash: String,
    /// Who requested the transition.
    pub actor: String,
    /// Logical timestamp token.
    pub timestamp: String,
    /// State before the transition.
    pub state_before: GovernanceState,
    /// State after the transition.
    pub state_after: GovernanceState,
    /// Hash of every other field.
    pub event_hash: String,
}

/// The hashed portion of an event.
#[derive(Serialize)]
struct EventBody<'a> {
    event_id: &'a str,
    event_type: GovernanceEventType,
    tick: u64,
    prev_event_hash: &'a str,
    payload_hash: &'a str,
    actor: &'a str,
    timestamp: &'a str,
    state_before: GovernanceState,
    state_after: GovernanceState,
}

impl GovernanceEvent {
    /// Recompute the event hash from the body, ignoring the stored hash.
    pub fn compute_hash(&self) -> Result<String, CanonicalizationError> {
        let body = EventBody {
            event_id: &self.event_id,
            event_type: self.event_type,
            tick: self.tick,
            prev_event_hash: &self.prev_event_hash,
            payload_hash: &self.payload_hash,
            actor: &self.actor,
            timestamp: &self.timestamp,
            state_before: self.state_before,
            state_after: self.state_after,
        };
        hash_serializable(&body, domain::GOVERNANCE_EVENT)
    }
}

/// Inputs for a new governance event.
#[derive(Debug, Clone, Copy)]
pub struct EventDraft<'a> {
    /// Kind of event.
    pub event_type: GovernanceEventType,
    /// Logical tick.
    pub tick: u64,
    /// Hash of the previous event.
    pub prev_event_hash: &'a str,
    /// Event payload (hashed, not stored).
    pub payload: &'a Value,
    /// Requesting actor.
    pub actor: &'a str,
    /// State before.
    pub state_before: GovernanceState,
    /// State after.
    pub state_after: GovernanceState,
}

/// Build an event from a draft.
///
/// Deterministic: identical drafts and clocks yield identical ids and hashes.
pub fn create_governance_event(
    draft: EventDraft<'_>,
    clock: &dyn Clock,
) -> Result<GovernanceEvent, CanonicalizationError> {
    let payload_hash = domain_hash(draft.payload, domain::EVENT_PAYLOAD)?;
    let event_id = format!(
        "gov_{}_{}_{}",
        draft.tick,
        draft.event_type.as_str(),
        reference_prefix(&payload_hash)
    );
    let timestamp = clock.ts(draft.tick, 0);

    let mut event = GovernanceEvent {
        event_id,
        event_type: draft.event_type,
        tick: draft.tick,
        prev_event_hash: draft.prev_event_hash.to_string(),
        payload_hash,
        actor: draft.actor.to_string(),
        timestamp,
        state_before: draft.state_before,
        state_after: draft.state_after,
        event_hash: String::new(),
    };
    event.event_hash = event.compute_hash()?;
    Ok(event)
}
