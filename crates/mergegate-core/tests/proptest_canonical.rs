// crates/mergegate-core/tests/proptest_canonical.rs
// ============================================================================
// Module: Canonical Encoder Property-Based Tests
// Description: Property tests for canonicalization stability and hash
//              agreement across random JSON shapes.
// Purpose: Detect panics and invariant violations across wide input ranges.
// ============================================================================

//! Property-based tests for canonical encoding invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use mergegate_core::hashing::HashAlgorithm;
use mergegate_core::hashing::encode;
use mergegate_core::hashing::hash_canonical;
use proptest::prelude::*;
use serde_json::Value;

fn json_value_strategy(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|v| Value::Number(v.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0 .. 4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0 .. 4).prop_map(|map| {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key, value);
                }
                Value::Object(object)
            }),
        ]
    })
}

/// Shuffles the key order of every object in a JSON value without changing
/// its semantic content.
fn reverse_object_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut reversed = serde_json::Map::new();
            for (key, inner) in map.iter().rev() {
                reversed.insert(key.clone(), reverse_object_keys(inner));
            }
            Value::Object(reversed)
        }
        Value::Array(items) => Value::Array(items.iter().map(reverse_object_keys).collect()),
        other => other.clone(),
    }
}

proptest! {
    #[test]
    fn encode_never_panics_on_random_json(value in json_value_strategy(4)) {
        let _ = encode(&value);
    }

    #[test]
    fn encode_ends_with_exactly_one_trailing_newline(value in json_value_strategy(3)) {
        if let Ok(bytes) = encode(&value) {
            prop_assert_eq!(bytes.last().copied(), Some(b'\n'));
            prop_assert_ne!(bytes.get(bytes.len().saturating_sub(2)).copied(), Some(b'\n'));
        }
    }

    #[test]
    fn reordering_object_keys_does_not_change_the_hash(value in json_value_strategy(3)) {
        let reordered = reverse_object_keys(&value);
        let hash_original = hash_canonical(HashAlgorithm::Sha256, &value);
        let hash_reordered = hash_canonical(HashAlgorithm::Sha256, &reordered);
        prop_assert_eq!(hash_original.is_ok(), hash_reordered.is_ok());
        if let (Ok(a), Ok(b)) = (hash_original, hash_reordered) {
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn encoding_is_idempotent_under_reparse(value in json_value_strategy(3)) {
        if let Ok(once) = encode(&value) {
            let reparsed: Value = serde_json::from_slice(&once).expect("canonical output must reparse");
            let twice = encode(&reparsed).expect("reparsed value must re-encode");
            prop_assert_eq!(once, twice);
        }
    }
}
