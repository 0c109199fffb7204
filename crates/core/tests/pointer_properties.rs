//! Property-based tests for the JSON Pointer engine
//!
//! Generates random JSON trees and checks the add/get, remove/add, merge and
//! move laws over pointers that address real nodes in those trees.

use jstore_core::json::{self, escape_segment};
use jstore_core::Value;
use proptest::prelude::*;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z~/]{0,6}".prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z~/]{0,4}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_doc() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z~/]{1,4}", arb_json(), 1..6)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// Pointers to every node below the root
fn node_pointers(value: &Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            for (k, v) in obj {
                let p = format!("{}/{}", prefix, escape_segment(k));
                out.push(p.clone());
                node_pointers(v, &p, out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                let p = format!("{}/{}", prefix, i);
                out.push(p.clone());
                node_pointers(v, &p, out);
            }
        }
        _ => {}
    }
}

/// Pointers to every container, including the root
fn container_pointers(value: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    if value.is_object() || value.is_array() {
        out.push((prefix.to_string(), value.clone()));
    }
    match value {
        Value::Object(obj) => {
            for (k, v) in obj {
                container_pointers(v, &format!("{}/{}", prefix, escape_segment(k)), out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                container_pointers(v, &format!("{}/{}", prefix, i), out);
            }
        }
        _ => {}
    }
}

fn child_count(value: &Value) -> usize {
    match value {
        Value::Object(obj) => obj.len(),
        Value::Array(arr) => arr.len(),
        _ => 0,
    }
}

proptest! {
    #[test]
    fn prop_add_then_get_returns_value(
        doc in arb_doc(),
        pick in any::<prop::sample::Index>(),
        key in "[a-z~/]{0,5}",
        slot in any::<prop::sample::Index>(),
        value in arb_json(),
    ) {
        let mut containers = Vec::new();
        container_pointers(&doc, "", &mut containers);
        let (parent, node) = &containers[pick.index(containers.len())];

        let pointer = match node {
            Value::Array(arr) => format!("{}/{}", parent, slot.index(arr.len() + 1)),
            _ => format!("{}/{}", parent, escape_segment(&key)),
        };

        let updated = json::add(doc.clone(), &pointer, value.clone()).unwrap();
        prop_assert_eq!(json::get(&updated, &pointer).unwrap(), &value);
    }

    #[test]
    fn prop_remove_then_add_restores(
        doc in arb_doc(),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut pointers = Vec::new();
        node_pointers(&doc, "", &mut pointers);
        let pointer = &pointers[pick.index(pointers.len())];

        let (without, removed) = json::take(doc.clone(), pointer).unwrap();
        let restored = json::add(without, pointer, removed).unwrap();
        prop_assert_eq!(restored, doc);
    }

    #[test]
    fn prop_merge_null_deletes_key(doc in arb_doc(), key in "[a-z~/]{1,4}") {
        let had_key = doc.get(&key).is_some();
        let before = child_count(&doc);
        let mut patch = serde_json::Map::new();
        patch.insert(key.clone(), Value::Null);
        let merged = json::merge(doc, &Value::Object(patch));
        prop_assert!(merged.get(&key).is_none());
        let expected = if had_key { before - 1 } else { before };
        prop_assert_eq!(child_count(&merged), expected);
    }

    #[test]
    fn prop_move_within_object_is_net_zero(doc in arb_doc(), pick in any::<prop::sample::Index>()) {
        let keys: Vec<String> = doc.as_object().unwrap().keys().cloned().collect();
        let from_key = &keys[pick.index(keys.len())];
        // A key that cannot already exist: generated keys are at most 4 chars.
        let to_key = "moved-target";

        let from = format!("/{}", escape_segment(from_key));
        let to = format!("/{}", to_key);
        let original = doc.get(from_key).cloned().unwrap();
        let before = child_count(&doc);

        let moved = json::move_within(doc, &from, &to).unwrap();
        prop_assert!(json::get(&moved, &from).is_err());
        prop_assert_eq!(json::get(&moved, &to).unwrap(), &original);
        prop_assert_eq!(child_count(&moved), before);
    }
}
