//! Ordering properties of version stamps and the acceptance rule.

use intent_store_core::prelude::*;
use proptest::prelude::*;

fn wall_stamp() -> impl Strategy<Value = WallClockTimestamp> {
    (0u64..4, 0u32..3, 0u8..3)
        .prop_map(|(millis, counter, node)| {
            WallClockTimestamp::new(millis, counter, NodeId::new(format!("node-{}", node)))
        })
}

fn multi_stamp() -> impl Strategy<Value = MultiValuedTimestamp> {
    (proptest::option::of(wall_stamp()), 0u64..3, 0u8..3).prop_map(|(version, counter, writer)| {
        MultiValuedTimestamp::new(version, counter, NodeId::new(format!("node-{}", writer)))
    })
}

fn state() -> impl Strategy<Value = IntentState> {
    proptest::sample::select(IntentState::ALL.to_vec())
}

fn record(state: IntentState, version: WallClockTimestamp) -> IntentRecord {
    IntentRecord::new(
        Intent::new(IntentKey::new("key"), "org.test", Vec::new()),
        state,
        Some(version),
    )
}

proptest! {
    #[test]
    fn wall_stamps_are_totally_ordered(a in wall_stamp(), b in wall_stamp()) {
        let outcomes = [a < b, a > b, a == b];
        prop_assert_eq!(outcomes.iter().filter(|o| **o).count(), 1);
    }

    #[test]
    fn wall_stamps_order_transitively(a in wall_stamp(), b in wall_stamp(), c in wall_stamp()) {
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
    }

    #[test]
    fn multi_stamps_are_totally_ordered(a in multi_stamp(), b in multi_stamp()) {
        let outcomes = [a < b, a > b, a == b];
        prop_assert_eq!(outcomes.iter().filter(|o| **o).count(), 1);
    }

    #[test]
    fn multi_stamps_order_transitively(a in multi_stamp(), b in multi_stamp(), c in multi_stamp()) {
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
    }

    #[test]
    fn accepted_updates_never_regress_version(
        updates in proptest::collection::vec((state(), wall_stamp()), 1..24)
    ) {
        let mut stored: Option<IntentRecord> = None;
        for (state, version) in updates {
            let incoming = record(state, version);
            if is_update_acceptable(stored.as_ref(), &incoming).is_accepted() {
                if let Some(previous) = &stored {
                    prop_assert!(previous.version() <= incoming.version());
                }
                stored = Some(incoming);
            }
        }
    }

    #[test]
    fn repeating_an_accepted_write_is_rejected(state in state(), version in wall_stamp()) {
        let data = record(state, version);
        prop_assert!(!is_update_acceptable(Some(&data), &data).is_accepted());
    }
}
