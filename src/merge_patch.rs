//! JSON Merge Patch (RFC 7396)
//!
//! Used by [`crate::client::commands`] to fold a deal's private overlay
//! (`privstate`) onto its public view (`pubstate`) before constructing a
//! [`crate::domain::Deal`] (§4.3).

use serde_json::{Map, Value};

/// Apply `patch` to `target`, per RFC 7396.
///
/// If `patch` is an object, the result is an object: each key in `patch`
/// either deletes the corresponding key in `target` (if its value is
/// `null`) or recursively merges into it (treating a missing target key as
/// an empty object). Any non-object `patch` replaces `target` outright.
pub fn merge_patch(target: &Value, patch: &Value) -> Value {
    let Value::Object(patch_obj) = patch else {
        return patch.clone();
    };

    let mut result = match target {
        Value::Object(obj) => obj.clone(),
        _ => Map::new(),
    };

    for (key, patch_value) in patch_obj {
        if patch_value.is_null() {
            result.remove(key);
        } else {
            let target_value = result.get(key).cloned().unwrap_or(Value::Object(Map::new()));
            result.insert(key.clone(), merge_patch(&target_value, patch_value));
        }
    }

    Value::Object(result)
}
