//! Canonical governance state machine.

use std::collections::BTreeSet;
use std::fmt;

use crate::canonical::Value;
use crate::clock::Clock;
use crate::types::{
    create_governance_event, EventDraft, GovernanceEvent, GovernanceEventType, GovernanceState,
    GENESIS_HASH,
};

use super::invariants::assert_governance_invariants;
use super::GovernanceError;

/// Decision value that marks a refusal.
pub const REFUSE_DECISION: &str = "refuse";

/// Governance state machine. All truth derives from its events.
///
/// Single writer: `transition` performs a multi-field update that must appear
/// atomic, so one owner mutates an instance at a time. Share it behind a
/// lock if several tasks need to drive it.
pub struct GovernanceStateMachine {
    clock: Box<dyn Clock>,
    current_state: GovernanceState,
    events: Vec<GovernanceEvent>,
    last_event_hash: String,
    blocked_workflows: BTreeSet<String>,
}

impl GovernanceStateMachine {
    /// Create a machine in OBSERVED with an empty chain.
    pub fn new(clock: impl Clock + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            current_state: GovernanceState::Observed,
            events: Vec::new(),
            last_event_hash: GENESIS_HASH.to_string(),
            blocked_workflows: BTreeSet::new(),
        }
    }

    /// Current state.
    pub fn current_state(&self) -> GovernanceState {
        self.current_state
    }

    /// Accepted events, oldest first.
    pub fn events(&self) -> &[GovernanceEvent] {
        &self.events
    }

    /// Hash of the last accepted event, or the genesis sentinel.
    pub fn last_event_hash(&self) -> &str {
        &self.last_event_hash
    }

    /// Workflows currently blocking closure.
    pub fn blocked_workflows(&self) -> &BTreeSet<String> {
        &self.blocked_workflows
    }

    /// Register an obligation that blocks CLOSED. Returns false if already present.
    pub fn block_workflow(&mut self, workflow_id: impl Into<String>) -> bool {
        let workflow_id = workflow_id.into();
        tracing::debug!(workflow_id = %workflow_id, "workflow blocks closure");
        self.blocked_workflows.insert(workflow_id)
    }

    /// Resolve an obligation. Returns false if it was not registered.
    pub fn release_workflow(&mut self, workflow_id: &str) -> bool {
        tracing::debug!(workflow_id = %workflow_id, "workflow released");
        self.blocked_workflows.remove(workflow_id)
    }

    /// Apply a transition.
    ///
    /// Guards, in order:
    /// 1. CLOSED is refused while any workflow is blocked
    /// 2. A `DECISION_MADE` with `decision == "refuse"` requires ASSESSED
    /// 3. The pair must be in the transition table
    ///
    /// On success the new event is appended and both pointers advance. On any
    /// error nothing changes.
    pub fn transition(
        &mut self,
        event_type: GovernanceEventType,
        tick: u64,
        payload: &Value,
        actor: &str,
        target_state: GovernanceState,
    ) -> Result<GovernanceEvent, GovernanceError> {
        if let Err(err) = self.check_guards(event_type, payload, target_state) {
            tracing::warn!(
                event_type = %event_type,
                current = %self.current_state,
                target = %target_state,
                error = %err,
                "governance transition rejected"
            );
            return Err(err);
        }

        let event = create_governance_event(
            EventDraft {
                event_type,
                tick,
                prev_event_hash: &self.last_event_hash,
                payload,
                actor,
                state_before: self.current_state,
                state_after: target_state,
            },
            self.clock.as_ref(),
        )?;

        // Commit point: nothing above mutated self.
        self.last_event_hash = event.event_hash.clone();
        self.current_state = target_state;
        self.events.push(event.clone());

        tracing::debug!(
            event_id = %event.event_id,
            state_before = %event.state_before,
            state_after = %event.state_after,
            "governance transition accepted"
        );

        Ok(event)
    }

    fn check_guards(
        &self,
        event_type: GovernanceEventType,
        payload: &Value,
        target_state: GovernanceState,
    ) -> Result<(), GovernanceError> {
        if target_state == GovernanceState::Closed && !self.blocked_workflows.is_empty() {
            return Err(GovernanceError::ClosureBlocked {
                workflows: self.blocked_workflows.iter().cloned().collect(),
            });
        }

        let is_refusal = payload.get("decision").and_then(Value::as_str) == Some(REFUSE_DECISION);
        if event_type == GovernanceEventType::DecisionMade
            && is_refusal
            && self.current_state != GovernanceState::Assessed
        {
            return Err(GovernanceError::RefusalRequiresAssessed {
                current: self.current_state,
            });
        }

        if !self.current_state.can_transition_to(target_state) {
            return Err(GovernanceError::IllegalTransition {
                from: self.current_state,
                to: target_state,
                event_type,
            });
        }

        Ok(())
    }

    /// Replay this machine's own chain.
    pub fn verify_chain(&self) -> Result<(), GovernanceError> {
        assert_governance_invariants(&self.events)
    }
}

impl fmt::Debug for GovernanceStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GovernanceStateMachine")
            .field("current_state", &self.current_state)
            .field("events", &self.events.len())
            .field("last_event_hash", &self.last_event_hash)
            .field("blocked_workflows", &self.blocked_workflows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::DeterministicClock;
    use GovernanceEventType::*;
    use GovernanceState::*;

    fn machine() -> GovernanceStateMachine {
        GovernanceStateMachine::new(DeterministicClock::new("test_session"))
    }

    fn empty() -> Value {
        Value::empty_map()
    }

    fn advance_to_committed(sm: &mut GovernanceStateMachine) {
        sm.transition(ObservationRecorded, 1, &empty(), "test", Assessed).unwrap();
        sm.transition(AssessmentCompleted, 2, &empty(), "test", Decided).unwrap();
        let proceed = Value::map([("decision", Value::from("proceed"))]);
        sm.transition(DecisionMade, 3, &proceed, "test", Committed).unwrap();
    }

    #[test]
    fn test_event_chain_integrity() {
        let mut sm = machine();
        sm.transition(ObservationRecorded, 1, &empty(), "test", Assessed).unwrap();
        sm.transition(AssessmentCompleted, 2, &empty(), "test", Decided).unwrap();

        assert_eq!(sm.events().len(), 2);
        assert_eq!(sm.events()[0].prev_event_hash, GENESIS_HASH);
        assert_eq!(sm.events()[1].prev_event_hash, sm.events()[0].event_hash);
        assert_eq!(sm.last_event_hash(), sm.events()[1].event_hash);
        assert_eq!(sm.current_state(), Decided);
        sm.verify_chain().unwrap();
    }

    #[test]
    fn test_ticks_above_signed_range() {
        let mut sm = machine();
        let tick = 1u64 << 63;
        sm.transition(ObservationRecorded, tick, &empty(), "test", Assessed).unwrap();
        sm.transition(AssessmentCompleted, u64::MAX, &empty(), "test", Decided).unwrap();

        assert_eq!(sm.events()[0].tick, tick);
        assert!(sm.events()[0].event_id.starts_with("gov_9223372036854775808_"));
        sm.verify_chain().unwrap();
    }

    #[test]
    fn test_closure_blocked_by_workflow() {
        let mut sm = machine();
        sm.block_workflow("blocking_workflow");
        advance_to_committed(&mut sm);

        let before_hash = sm.last_event_hash().to_string();
        let err = sm.transition(CycleClosed, 4, &empty(), "test", Closed).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::ClosureBlocked {
                workflows: vec!["blocking_workflow".to_string()]
            }
        );
        assert_eq!(sm.current_state(), Committed);
        assert_eq!(sm.events().len(), 3);
        assert_eq!(sm.last_event_hash(), before_hash);

        assert!(sm.release_workflow("blocking_workflow"));
        sm.transition(CycleClosed, 4, &empty(), "test", Closed).unwrap();
        assert_eq!(sm.current_state(), Closed);
    }

    #[test]
    fn test_closure_blocked_regardless_of_state() {
        // The blocked guard fires before the table check.
        let mut sm = machine();
        sm.block_workflow("w");
        let err = sm.transition(CycleClosed, 1, &empty(), "test", Closed).unwrap_err();
        assert!(matches!(err, GovernanceError::ClosureBlocked { .. }));
    }

    #[test]
    fn test_refusal_requires_assessed() {
        let refuse = Value::map([("decision", Value::from("refuse"))]);

        let mut sm = machine();
        let err = sm.transition(DecisionMade, 1, &refuse, "test", Assessed).unwrap_err();
        assert_eq!(err, GovernanceError::RefusalRequiresAssessed { current: Observed });
        assert!(sm.events().is_empty());

        sm.transition(ObservationRecorded, 1, &empty(), "test", Assessed).unwrap();
        let event = sm.transition(DecisionMade, 2, &refuse, "test", Decided).unwrap();
        assert_eq!(event.state_before, Assessed);
        assert_eq!(event.state_after, Decided);
    }

    #[test]
    fn test_illegal_transition_rejected_atomically() {
        let mut sm = machine();
        let err = sm.transition(AssessmentCompleted, 1, &empty(), "test", Decided).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::IllegalTransition { from: Observed, to: Decided, .. }
        ));
        assert_eq!(sm.current_state(), Observed);
        assert!(sm.events().is_empty());
        assert_eq!(sm.last_event_hash(), GENESIS_HASH);
    }

    #[test]
    fn test_ack_path_to_closed() {
        let mut sm = machine();
        advance_to_committed(&mut sm);
        sm.transition(AcknowledgmentReceived, 4, &empty(), "fleet", Acked).unwrap();
        sm.transition(CycleClosed, 5, &empty(), "test", Closed).unwrap();
        assert!(sm.transition(ObservationRecorded, 6, &empty(), "test", Observed).is_err());
        sm.verify_chain().unwrap();
    }

    #[test]
    fn test_canonicalization_failure_leaves_state() {
        let mut sm = machine();
        let bad = Value::map([("x", Value::from(f64::NAN))]);
        let err = sm.transition(ObservationRecorded, 1, &bad, "test", Assessed).unwrap_err();
        assert!(matches!(err, GovernanceError::Canonicalization(_)));
        assert!(sm.events().is_empty());
        assert_eq!(sm.current_state(), Observed);
    }
}
