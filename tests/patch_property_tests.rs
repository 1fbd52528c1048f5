/// Property tests for the JSON delta engine.
///
/// The merge-patch algebra must hold for arbitrary documents: applying
/// `diff(prev, cur)` to `prev` reconstructs `cur`, identical documents
/// diff to the empty patch, and the null scrub leaves no null-valued
/// object member at any depth.
use proptest::prelude::*;
use serde_json::{Map, Value as JsonValue};

use hostmon::delta::patch;

/// Null-free JSON scalars. Merge patches cannot express a null member
/// (null means delete), so reconstruction targets must be null-free.
fn scalar() -> impl Strategy<Value = JsonValue> {
    prop_oneof![
        any::<bool>().prop_map(JsonValue::from),
        any::<i64>().prop_map(JsonValue::from),
        "[a-z0-9 ]{0,12}".prop_map(JsonValue::from),
    ]
}

/// Null-free JSON documents of bounded depth.
fn document() -> impl Strategy<Value = JsonValue> {
    scalar().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(JsonValue::Array),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..6).prop_map(|m| {
                JsonValue::Object(m.into_iter().collect::<Map<_, _>>())
            }),
        ]
    })
}

/// JSON objects (the shape plugin snapshots take).
fn object() -> impl Strategy<Value = JsonValue> {
    prop::collection::hash_map("[a-z]{1,8}", document(), 0..6)
        .prop_map(|m| JsonValue::Object(m.into_iter().collect::<Map<_, _>>()))
}

/// Documents that may carry nulls anywhere, for the scrub property.
fn document_with_nulls() -> impl Strategy<Value = JsonValue> {
    prop_oneof![Just(JsonValue::Null), scalar()].prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(JsonValue::Array),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..6).prop_map(|m| {
                JsonValue::Object(m.into_iter().collect::<Map<_, _>>())
            }),
        ]
    })
}

/// True when any object member at any depth is null. Null array elements
/// do not count; the scrub keeps them.
fn has_null_member(value: &JsonValue) -> bool {
    match value {
        JsonValue::Object(map) => map
            .values()
            .any(|v| v.is_null() || has_null_member(v)),
        JsonValue::Array(items) => items.iter().any(has_null_member),
        _ => false,
    }
}

proptest! {
    #[test]
    fn patch_reconstructs_the_current_document(prev in object(), cur in object()) {
        let patch = patch::diff(&prev, &cur);
        prop_assert_eq!(patch::apply(&prev, &patch), cur);
    }

    #[test]
    fn identical_documents_diff_to_the_empty_patch(doc in object()) {
        let patch = patch::diff(&doc, &doc);
        prop_assert_eq!(patch, JsonValue::Object(Map::new()));
    }

    #[test]
    fn byte_equal_documents_short_circuit(doc in object()) {
        let bytes = serde_json::to_vec(&doc).unwrap();
        let patch = patch::diff_bytes(&bytes, &bytes).unwrap();
        prop_assert_eq!(serde_json::to_vec(&patch).unwrap(), patch::EMPTY_PATCH.to_vec());
    }

    #[test]
    fn scrub_removes_every_null_member(mut doc in document_with_nulls()) {
        patch::scrub_nulls(&mut doc);
        prop_assert!(!has_null_member(&doc));
    }

    #[test]
    fn scrub_is_idempotent(mut doc in document_with_nulls()) {
        patch::scrub_nulls(&mut doc);
        let once = doc.clone();
        patch::scrub_nulls(&mut doc);
        prop_assert_eq!(once, doc);
    }
}
