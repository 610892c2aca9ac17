//! Framing & Serialization
//!
//! Translates between a typed argument map and the flat key/value frame
//! list that goes out on the wire (§4.1). Argument keys are UTF-8; values
//! are JSON-encoded. A `null`-valued argument is dropped rather than sent,
//! matching the server's convention of treating absence and null the same
//! way on input.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// An ordered argument map, keyed by argument name.
///
/// A `BTreeMap` rather than a `HashMap` so that frame order is stable and
/// easy to assert on in tests, even though the protocol only cares about
/// keys, not position (§4.1 "preserves order sufficient for inspection").
pub type Arguments = BTreeMap<String, Value>;

/// Flatten an argument map into a `[k1, v1, k2, v2, ...]` frame list,
/// JSON-encoding each value and dropping `null`-valued entries.
pub fn flatten(args: &Arguments) -> Vec<Vec<u8>> {
    let mut frames = Vec::with_capacity(args.len() * 2);
    for (key, value) in args {
        if value.is_null() {
            continue;
        }
        frames.push(key.clone().into_bytes());
        frames.push(encode(value));
    }
    frames
}

/// Group a flat `[k1, v1, k2, v2, ...]` frame list back into an argument
/// map, decoding each value as JSON.
///
/// Fails with [`ProtocolError::InvalidMessage`] if `frames` has odd length
/// (§3.3 "an argument list on the wire has an even number of frames") or if
/// a key frame isn't valid UTF-8.
pub fn group(frames: &[Vec<u8>]) -> Result<Arguments> {
    if frames.len() % 2 != 0 {
        return Err(ProtocolError::invalid(format!(
            "odd number of argument frames: {}",
            frames.len()
        )));
    }
    let mut args = Arguments::new();
    for pair in frames.chunks_exact(2) {
        let key = String::from_utf8(pair[0].clone())
            .map_err(|e| ProtocolError::invalid(format!("non-utf8 argument key: {e}")))?;
        let value = decode(&pair[1])?;
        args.insert(key, value);
    }
    Ok(args)
}

/// JSON-encode a single argument value.
pub fn encode(value: &Value) -> Vec<u8> {
    // `Value` serialization never fails.
    serde_json::to_vec(value).expect("serializing serde_json::Value is infallible")
}

/// JSON-decode a single argument value frame.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes)
        .map_err(|e| ProtocolError::invalid(format!("malformed argument JSON: {e}")))
}

/// Convert a typed value into the JSON [`Value`] stored in an [`Arguments`]
/// map, for callers building a command's argument list.
pub fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("serializing a well-formed domain type is infallible")
}

/// Decode a JSON [`Value`] pulled out of a reply's [`Arguments`] map into a
/// typed value.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ProtocolError::invalid(format!("{e}")))
}

/// Whether a status frame indicates success (`OK` or `OK:<code>`).
pub fn status_is_ok(status: &[u8]) -> bool {
    status.starts_with(b"OK")
}

/// The `<code>` suffix of an `ERR:<code>` status frame, or `None` for a bare
/// `ERR`/`OK` status.
pub fn error_code(status: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(status).ok()?;
    text.strip_prefix("ERR:").map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_drops_null_values() {
        let mut args = Arguments::new();
        args.insert("game".into(), json!("abc"));
        args.insert("player".into(), Value::Null);
        let frames = flatten(&args);
        assert_eq!(frames, vec![b"game".to_vec(), b"\"abc\"".to_vec()]);
    }

    #[test]
    fn group_roundtrips_flatten() {
        let mut args = Arguments::new();
        args.insert("a".into(), json!(1));
        args.insert("b".into(), json!("two"));
        let frames = flatten(&args);
        let grouped = group(&frames).unwrap();
        assert_eq!(grouped, args);
    }

    #[test]
    fn group_rejects_odd_frame_count() {
        let frames = vec![b"a".to_vec(), b"1".to_vec(), b"b".to_vec()];
        assert!(group(&frames).is_err());
    }

    #[test]
    fn status_is_ok_recognizes_coded_ok() {
        assert!(status_is_ok(b"OK"));
        assert!(status_is_ok(b"OK:created"));
        assert!(!status_is_ok(b"ERR"));
        assert!(!status_is_ok(b"ERR:NF"));
    }

    #[test]
    fn error_code_extracts_suffix() {
        assert_eq!(error_code(b"ERR:NF"), Some("NF".to_string()));
        assert_eq!(error_code(b"ERR"), None);
        assert_eq!(error_code(b"OK"), None);
    }
}
