//! Property-based tests for normalization totality and determinism

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use uniform::frame::{build_frame_log_key, is_broadcast_frame, normalize_frame, NormalizedFrame};

/// Arbitrary JSON up to a small depth, biased towards the field names frames use.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[ a-zA-Z0-9*_-]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        let key = prop_oneof![
            prop::sample::select(vec![
                "type", "action", "from", "to", "target", "deviceId", "ns", "mode", "payload",
                "data", "broadcast", "transport",
            ])
            .prop_map(String::from),
            "[a-z]{1,8}",
        ];
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((key, inner), 0..6)
                .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// normalize_frame never panics and always fills the required fields
#[test]
fn test_normalize_frame_is_total() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(arb_json(), "[a-z0-9-]{0,8}"), |(raw, source)| {
            let frame = normalize_frame(&raw, &source);

            prop_assert!(!frame.frame_type.is_empty());
            prop_assert!(!frame.from.is_empty());
            prop_assert!(!frame.to.is_empty());
            prop_assert_eq!(&frame.to, &frame.target);
            prop_assert!(!frame.namespace.is_empty());
            prop_assert!(!frame.mode.is_empty());
            prop_assert_eq!(frame.mode.trim(), frame.mode.as_str());

            if !raw.is_object() {
                prop_assert_eq!(&frame.payload, &json!({}));
                prop_assert!(frame.extra.is_empty());
            }
            Ok(())
        })
        .unwrap();
}

/// Same input, same frame and same log key
#[test]
fn test_normalize_frame_is_deterministic() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&arb_json(), |raw| {
            let first = normalize_frame(&raw, "peer");
            let second = normalize_frame(&raw, "peer");
            prop_assert_eq!(build_frame_log_key(&first), build_frame_log_key(&second));
            prop_assert_eq!(first, second);
            Ok(())
        })
        .unwrap();
}

/// Normalizing an already normalized frame changes nothing but the payload fallback
#[test]
fn test_renormalizing_keeps_routing_fields() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&arb_json(), |raw| {
            let once = normalize_frame(&raw, "peer");
            let twice = normalize_frame(&once.to_value(), "other");

            prop_assert_eq!(&once.frame_type, &twice.frame_type);
            prop_assert_eq!(&once.from, &twice.from);
            prop_assert_eq!(&once.to, &twice.to);
            prop_assert_eq!(&once.namespace, &twice.namespace);
            prop_assert_eq!(&once.mode, &twice.mode);
            prop_assert_eq!(once.is_broadcast(), twice.is_broadcast());
            prop_assert_eq!(&once.payload, &twice.payload);
            Ok(())
        })
        .unwrap();
}

/// A serialized frame reads back as the same frame
#[test]
fn test_serialized_frame_reads_back_unchanged() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&arb_json(), |raw| {
            let frame = normalize_frame(&raw, "peer");
            let wire = serde_json::to_value(&frame).unwrap();
            let read: NormalizedFrame = serde_json::from_value(wire).unwrap();

            prop_assert_eq!(&read, &frame);
            prop_assert_eq!(read.is_broadcast(), is_broadcast_frame(&raw));
            Ok(())
        })
        .unwrap();
}
