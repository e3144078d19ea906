//! Property tests: canonicalization idempotence, domain separation, and
//! single-field tamper detection on generated chains.

use governance_kernel::{
    canonicalize, deterministic_hash, domain_hash, replay_chain, CanonicalValue,
    DeterministicClock, GovernanceEventType, GovernanceState, GovernanceStateMachine, Value,
};
use proptest::prelude::*;

/// Scalar leaves. Floats are finite so every generated value canonicalizes.
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::UInt),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[a-z0-9 é😀]{0,8}".prop_map(Value::Str),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Map(m.into_iter().collect())),
        ]
    })
}

/// Build a valid chain of `len` events (1..=5) along the happy path.
fn chain(len: usize, session: &str) -> Vec<governance_kernel::GovernanceEvent> {
    use GovernanceEventType::*;
    use GovernanceState::*;
    let steps = [
        (ObservationRecorded, Assessed),
        (AssessmentCompleted, Decided),
        (DecisionCommitted, Committed),
        (AcknowledgmentReceived, Acked),
        (CycleClosed, Closed),
    ];
    let mut sm = GovernanceStateMachine::new(DeterministicClock::new(session));
    for (tick, (event_type, target)) in steps.iter().take(len).enumerate() {
        let payload = Value::map([("tick", Value::Int(tick as i64))]);
        sm.transition(*event_type, tick as u64 + 1, &payload, "prop", *target)
            .expect("happy path is legal");
    }
    sm.events().to_vec()
}

proptest! {
    #[test]
    fn canonicalization_is_idempotent(v in value()) {
        let once = canonicalize(&v).unwrap();
        let twice = CanonicalValue::from_json(once.as_json().clone()).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(
            deterministic_hash(&v, None).unwrap(),
            governance_kernel::hash_canonical(&twice, None)
        );
    }

    #[test]
    fn domain_tags_separate(v in value(), a in "[A-Za-z]{1,12}", b in "[A-Za-z]{1,12}") {
        prop_assume!(a != b);
        prop_assert_ne!(domain_hash(&v, &a).unwrap(), domain_hash(&v, &b).unwrap());
    }

    #[test]
    fn map_order_does_not_matter(
        entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 1..6)
    ) {
        let forward: Vec<(String, Value)> =
            entries.iter().map(|(k, v)| (k.clone(), Value::Int(*v))).collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        prop_assert_eq!(
            deterministic_hash(&Value::Map(forward), None).unwrap(),
            deterministic_hash(&Value::Map(reversed), None).unwrap()
        );
    }

    #[test]
    fn built_chains_replay(len in 0usize..=5) {
        let events = chain(len, "prop_session");
        let summary = replay_chain(&events).unwrap();
        prop_assert_eq!(summary.event_count, len);
    }

    #[test]
    fn single_field_tamper_is_rejected(len in 1usize..=5, pick in any::<prop::sample::Index>(), field in 0u8..4) {
        let events = chain(len, "prop_session");
        let index = pick.index(events.len());
        let mut tampered = events.clone();
        let target = &mut tampered[index];
        match field {
            0 => target.event_hash = "0".repeat(64),
            1 => target.prev_event_hash = "f".repeat(64),
            2 => target.state_before = GovernanceState::Closed,
            _ => target.state_after = GovernanceState::Observed,
        }

        let err = replay_chain(&tampered).unwrap_err();
        prop_assert_eq!(err.event_id(), Some(events[index].event_id.as_str()));
    }
}
