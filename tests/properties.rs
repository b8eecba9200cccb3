//! Property tests for deep clone, deep equality and change detection.

use deepwatch::prelude::*;
use deepwatch::value::{DEFAULT_MAX_DEPTH, deep_clone, deep_equal};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn arbitrary_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-5i64..5).prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        prop_oneof![Just(String::new()), Just("0".to_string()), Just("1".to_string()), "[a-c]{1,3}"]
            .prop_map(Value::String),
    ]
}

fn arbitrary_value() -> impl Strategy<Value = Value> {
    arbitrary_scalar().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
            prop::collection::btree_map("[a-d]", inner, 0..4).prop_map(Value::Map),
        ]
    })
}

fn arbitrary_root() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-d]", arbitrary_value(), 0..4).prop_map(Value::Map)
}

fn modes() -> impl Strategy<Value = Equality> {
    prop_oneof![Just(Equality::Strict), Just(Equality::Loose)]
}

proptest! {
    #[test]
    fn prop_clone_is_deeply_equal(value in arbitrary_value(), mode in modes()) {
        let copy = deep_clone(&value, DEFAULT_MAX_DEPTH).unwrap();
        prop_assert!(deep_equal(&value, &copy, mode));
        prop_assert!(deep_equal(&copy, &value, mode));
    }

    #[test]
    fn prop_clone_is_independent(value in arbitrary_root()) {
        let before = deep_clone(&value, DEFAULT_MAX_DEPTH).unwrap();
        let mut copy = deep_clone(&value, DEFAULT_MAX_DEPTH).unwrap();

        copy.insert("__added", Value::from("x"));
        if let Some(Value::Map(map)) = copy.get_mut("a") {
            map.clear();
        }

        prop_assert!(deep_equal(&value, &before, Equality::Strict));
    }

    #[test]
    fn prop_equality_is_reflexive(value in arbitrary_value(), mode in modes()) {
        prop_assert!(deep_equal(&value, &value, mode));
    }

    #[test]
    fn prop_equality_is_symmetric(a in arbitrary_value(), b in arbitrary_value(), mode in modes()) {
        prop_assert_eq!(deep_equal(&a, &b, mode), deep_equal(&b, &a, mode));
    }

    #[test]
    fn prop_strict_equality_implies_loose(a in arbitrary_value(), b in arbitrary_value()) {
        if deep_equal(&a, &b, Equality::Strict) {
            prop_assert!(deep_equal(&a, &b, Equality::Loose));
        }
    }

    #[test]
    fn prop_callback_fires_exactly_on_change(
        initial in arbitrary_root(),
        next in arbitrary_root(),
        mode in modes(),
    ) {
        let watcher = Watcher::builder().with_equality(mode).build().unwrap();
        let subject = Subject::new(initial.clone());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        watcher.watch(&subject, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }).unwrap();

        watcher.poll_once();
        prop_assert_eq!(count.load(Ordering::SeqCst), 0);

        subject.set(next.clone());
        watcher.poll_once();
        let expected = usize::from(!deep_equal(&initial, &next, mode));
        prop_assert_eq!(count.load(Ordering::SeqCst), expected);

        // the refreshed snapshot matches, so nothing fires again
        watcher.poll_once();
        prop_assert_eq!(count.load(Ordering::SeqCst), expected);
    }
}
