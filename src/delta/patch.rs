/// JSON delta engine.
///
/// Computes RFC 7396 merge patches between a cached snapshot and the source
/// snapshot a sampler just wrote. A patch applied to the cached document
/// yields the source document; absent keys are expressed as explicit nulls
/// so the backend can delete them from its view.
use serde_json::{Map, Value as JsonValue};

/// The serialised form of an empty patch.
pub const EMPTY_PATCH: &[u8] = b"{}";

/// Compute the merge patch turning `previous` into `current`.
///
/// Byte-identical inputs short-circuit to the empty patch without parsing
/// either document.
pub fn diff_bytes(previous: &[u8], current: &[u8]) -> serde_json::Result<JsonValue> {
    if previous == current {
        return Ok(JsonValue::Object(Map::new()));
    }
    let previous: JsonValue = serde_json::from_slice(previous)?;
    let current: JsonValue = serde_json::from_slice(current)?;
    Ok(diff(&previous, &current))
}

/// Compute the RFC 7396 merge patch turning `previous` into `current`.
///
/// For object pairs the patch carries only changed members: added or
/// modified keys map to their new value (recursively patched when both
/// sides are objects), removed keys map to null. Any non-object pairing
/// replaces the document wholesale.
pub fn diff(previous: &JsonValue, current: &JsonValue) -> JsonValue {
    match (previous, current) {
        (JsonValue::Object(prev), JsonValue::Object(cur)) => {
            let mut patch = Map::new();
            for (key, cur_value) in cur {
                match prev.get(key) {
                    Some(prev_value) if prev_value == cur_value => {}
                    Some(prev_value) => {
                        patch.insert(key.clone(), diff(prev_value, cur_value));
                    }
                    None => {
                        patch.insert(key.clone(), cur_value.clone());
                    }
                }
            }
            for key in prev.keys() {
                if !cur.contains_key(key) {
                    patch.insert(key.clone(), JsonValue::Null);
                }
            }
            JsonValue::Object(patch)
        }
        _ => current.clone(),
    }
}

/// Apply an RFC 7396 merge patch to `target`.
pub fn apply(target: &JsonValue, patch: &JsonValue) -> JsonValue {
    match patch {
        JsonValue::Object(patch_map) => {
            let mut result = match target {
                JsonValue::Object(map) => map.clone(),
                _ => Map::new(),
            };
            for (key, patch_value) in patch_map {
                if patch_value.is_null() {
                    result.remove(key);
                } else {
                    let merged = apply(result.get(key).unwrap_or(&JsonValue::Null), patch_value);
                    result.insert(key.clone(), merged);
                }
            }
            JsonValue::Object(result)
        }
        _ => patch.clone(),
    }
}

/// Cheap pre-check for the null scrub: only documents whose raw bytes
/// contain the token `null` need to be deserialised and pruned.
pub fn contains_null_token(raw: &[u8]) -> bool {
    raw.windows(4).any(|w| w == b"null")
}

/// Remove null-valued keys from objects at any depth.
///
/// Arrays are descended so nested objects inside them are pruned, but array
/// elements themselves are kept even when null.
pub fn scrub_nulls(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                scrub_nulls(v);
            }
        }
        JsonValue::Array(items) => {
            for item in items.iter_mut() {
                scrub_nulls(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_bytes_yield_empty_patch() {
        let doc = br#"{"hostname":{"alias":"aaa"}}"#;
        let patch = diff_bytes(doc, doc).unwrap();
        assert_eq!(patch, json!({}));
        assert_eq!(serde_json::to_vec(&patch).unwrap(), EMPTY_PATCH);
    }

    #[test]
    fn changed_nested_member_produces_minimal_patch() {
        let prev = json!({"hostname": {"alias": "aaa", "id": "hostname"}});
        let cur = json!({"hostname": {"alias": "bbb", "id": "hostname"}});
        assert_eq!(diff(&prev, &cur), json!({"hostname": {"alias": "bbb"}}));
    }

    #[test]
    fn removed_member_becomes_null() {
        let prev = json!({"a": 1, "b": 2});
        let cur = json!({"a": 1});
        assert_eq!(diff(&prev, &cur), json!({"b": null}));
    }

    #[test]
    fn non_object_replacement_is_wholesale() {
        let prev = json!({"a": [1, 2]});
        let cur = json!({"a": [1, 2, 3]});
        assert_eq!(diff(&prev, &cur), json!({"a": [1, 2, 3]}));
    }

    #[test]
    fn patch_round_trips() {
        let prev = json!({"a": {"b": 1, "c": 2}, "d": [1, 2], "e": "x"});
        let cur = json!({"a": {"b": 3}, "d": [2], "f": true});
        let patch = diff(&prev, &cur);
        assert_eq!(apply(&prev, &patch), cur);
    }

    #[test]
    fn scrub_removes_nulls_at_depth() {
        let mut doc = json!({"a": 1, "b": null, "c": {"d": null, "e": 2}});
        scrub_nulls(&mut doc);
        assert_eq!(doc, json!({"a": 1, "c": {"e": 2}}));
    }

    #[test]
    fn scrub_keeps_null_array_elements() {
        let mut doc = json!({"a": [null, {"b": null, "c": 1}]});
        scrub_nulls(&mut doc);
        assert_eq!(doc, json!({"a": [null, {"c": 1}]}));
    }

    #[test]
    fn null_token_detection() {
        assert!(contains_null_token(br#"{"a":null}"#));
        assert!(!contains_null_token(br#"{"a":"nul"}"#));
    }
}
