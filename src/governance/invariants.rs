//! Chain replay: re-derive every link of an event chain.

use crate::types::{GovernanceEvent, GovernanceState, GENESIS_HASH};

use super::GovernanceError;

/// What a successful replay established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    /// Number of events replayed.
    pub event_count: usize,
    /// `state_after` of the last event, if any.
    pub final_state: Option<GovernanceState>,
    /// Hash of the last event, or the genesis sentinel.
    pub head_hash: String,
}

/// Replay an ordered event list from the genesis sentinel.
///
/// For each event, in order:
/// - `prev_event_hash` must equal the running pointer
/// - `event_hash` must equal the hash recomputed from the body
/// - `state_before` must equal the previous event's `state_after`
///
/// The first violation ends replay and names the offending event. There is
/// no partial success.
pub fn replay_chain(events: &[GovernanceEvent]) -> Result<ChainSummary, GovernanceError> {
    let mut prev_hash = GENESIS_HASH;
    let mut prev_state: Option<GovernanceState> = None;

    for event in events {
        if event.prev_event_hash != prev_hash {
            return Err(fail(GovernanceError::ChainBroken {
                event_id: event.event_id.clone(),
            }));
        }

        if event.compute_hash()? != event.event_hash {
            return Err(fail(GovernanceError::HashMismatch {
                event_id: event.event_id.clone(),
            }));
        }

        if let Some(state) = prev_state {
            if event.state_before != state {
                return Err(fail(GovernanceError::StateDiscontinuity {
                    event_id: event.event_id.clone(),
                }));
            }
        }

        prev_hash = &event.event_hash;
        prev_state = Some(event.state_after);
    }

    Ok(ChainSummary {
        event_count: events.len(),
        final_state: prev_state,
        head_hash: prev_hash.to_string(),
    })
}

/// Replay a chain, discarding the summary.
pub fn assert_governance_invariants(events: &[GovernanceEvent]) -> Result<(), GovernanceError> {
    replay_chain(events).map(|_| ())
}

fn fail(err: GovernanceError) -> GovernanceError {
    tracing::warn!(error = %err, "governance chain replay failed");
    err
}
