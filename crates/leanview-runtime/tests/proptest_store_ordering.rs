#![forbid(unsafe_code)]

//! Property tests for store fan-out.
//!
//! 1. Every subscriber sees every effective change, in version order.
//! 2. No subscriber observes a state newer than the change it is handling
//!    (updates issued during a fan-out are queued).
//! 3. The final state equals the sequential fold of all patches.

use std::cell::RefCell;
use std::rc::Rc;

use leanview_core::LeanLevel;
use leanview_runtime::{AppState, StatePatch, Store};
use proptest::prelude::*;

fn patch_strategy() -> impl Strategy<Value = StatePatch> {
    (
        proptest::option::of(-3i64..=3),
        proptest::option::of(prop_oneof![Just("Markets"), Just("Climate"), Just("Sports")]),
        proptest::option::of(prop_oneof![Just("#111111"), Just("#222222")]),
    )
        .prop_map(|(level, topic, brand)| {
            let mut patch = StatePatch::new();
            if let Some(level) = level {
                patch = patch.raw_lean_level(level);
            }
            if let Some(topic) = topic {
                patch = patch.topic(topic);
            }
            if let Some(brand) = brand {
                patch = patch.brand_primary(brand);
            }
            patch
        })
}

proptest! {
    #[test]
    fn subscribers_see_versions_in_order(patches in proptest::collection::vec(patch_strategy(), 0..24)) {
        let store = Store::default();
        let logs: Vec<Rc<RefCell<Vec<u64>>>> = (0..3).map(|_| Rc::new(RefCell::new(Vec::new()))).collect();
        let _subs: Vec<_> = logs
            .iter()
            .map(|log| {
                let log = Rc::clone(log);
                store.subscribe(move |change| log.borrow_mut().push(change.version))
            })
            .collect();

        let mut expected = AppState::default();
        for patch in &patches {
            expected = expected.merged(patch).0;
            store.set_state(patch.clone());
        }

        prop_assert_eq!(&*store.snapshot(), &expected);
        let versions: Vec<u64> = (1..=store.version()).collect();
        for log in &logs {
            prop_assert_eq!(&*log.borrow(), &versions);
        }
    }

    #[test]
    fn nested_updates_never_tear(levels in proptest::collection::vec(-2i64..=2, 1..12)) {
        let store = Store::default();
        let torn = Rc::new(RefCell::new(false));

        // The first subscriber echoes every level change as a topic update.
        let echo_store = store.clone();
        let _echo = store.subscribe(move |change| {
            if change.new.lean_level != change.old.lean_level {
                echo_store.set_state(StatePatch::new().topic(format!("level {}", change.new.lean_level)));
            }
        });
        let observer_store = store.clone();
        let flag = Rc::clone(&torn);
        let _observer = store.subscribe(move |change| {
            if *observer_store.snapshot() != *change.new {
                *flag.borrow_mut() = true;
            }
        });

        for level in &levels {
            store.set_state(StatePatch::new().lean_level(LeanLevel::new(*level)));
        }
        prop_assert!(!*torn.borrow());
        prop_assert!(!store.is_dispatching());
        let last = LeanLevel::new(*levels.last().unwrap_or(&0));
        prop_assert_eq!(store.snapshot().lean_level, last);
    }
}
