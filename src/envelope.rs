//! Response envelope normalization.
//!
//! The backend wraps payloads inconsistently: a bare array, `{<resource>: [...]}`,
//! `{data: [...]}` or `{success, data: [...]}`. Every list-bearing response goes
//! through [`normalize_list`] so callers always get a concrete `Vec`, and every
//! single-resource response goes through [`normalize_item`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{ApiError, ApiResult};

/// A backend resource that can be extracted from an envelope.
pub trait Resource: DeserializeOwned {
    /// Envelope key holding a list of this resource (`categories`, `threads`, ...).
    const LIST_KEY: &'static str;
    /// Envelope key holding a single instance (`category`, `thread`, ...).
    const ITEM_KEY: &'static str;
    /// Fields an entry must carry (non-null, non-empty) to be handed to callers.
    const REQUIRED: &'static [&'static str] = &["id"];
}

/// Which envelope shape a list response arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    Bare,
    Keyed,
    Data,
    Unrecognized,
}

pub fn classify(body: &Value, key: &str) -> Envelope {
    if body.is_array() {
        Envelope::Bare
    } else if body.get(key).is_some_and(Value::is_array) {
        Envelope::Keyed
    } else if body.get("data").is_some_and(Value::is_array) {
        Envelope::Data
    } else {
        Envelope::Unrecognized
    }
}

/// Extract the list payload; first matching shape wins. Never fails.
pub fn unwrap_list(body: Value, key: &str) -> Vec<Value> {
    match (classify(&body, key), body) {
        (Envelope::Bare, Value::Array(items)) => items,
        (Envelope::Keyed, Value::Object(mut map)) => take_array(map.remove(key)),
        (Envelope::Data, Value::Object(mut map)) => take_array(map.remove("data")),
        (_, other) => {
            // an empty 204 / null body is a legitimate "nothing here"
            if !other.is_null() {
                warn!(resource = key, shape = %shape_hint(&other), "unexpected list envelope; treating as empty");
                metrics::increment_counter!("forum_client_envelope_unrecognized_total", "resource" => key.to_string());
            }
            Vec::new()
        }
    }
}

fn take_array(v: Option<Value>) -> Vec<Value> {
    match v {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn shape_hint(v: &Value) -> String {
    match v {
        Value::Object(map) => format!("object{{{}}}", map.keys().cloned().collect::<Vec<_>>().join(",")),
        Value::String(_) => "string".into(),
        Value::Number(_) => "number".into(),
        Value::Bool(_) => "bool".into(),
        Value::Array(_) => "array".into(),
        Value::Null => "null".into(),
    }
}

/// Extract a single-object payload: `{<key>: {..}}`, then `{data: {..}}`, then the body itself.
pub fn unwrap_object(body: Value, key: &str) -> Value {
    match body {
        Value::Object(mut map) => {
            if map.get(key).is_some_and(Value::is_object) {
                map.remove(key).unwrap_or(Value::Null)
            } else if map.get("data").is_some_and(Value::is_object) {
                map.remove("data").unwrap_or(Value::Null)
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

/// A field counts as present unless it is absent, null, or an empty string.
pub fn has_required(entry: &Value, required: &[&str]) -> bool {
    entry.is_object()
        && required.iter().all(|field| match entry.get(*field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        })
}

/// Unwrap a list envelope, drop malformed entries and deserialize the rest.
pub fn normalize_list<T: Resource>(body: Value) -> Vec<T> {
    let raw = unwrap_list(body, T::LIST_KEY);
    let total = raw.len();
    let items: Vec<T> = raw
        .into_iter()
        .filter(|entry| has_required(entry, T::REQUIRED))
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(resource = T::LIST_KEY, error = %e, "dropping undecodable entry");
                None
            }
        })
        .collect();
    let dropped = total - items.len();
    if dropped > 0 {
        warn!(resource = T::LIST_KEY, dropped, total, "filtered malformed entries");
        metrics::counter!("forum_client_malformed_entries_total", dropped as u64, "resource" => T::LIST_KEY);
    }
    items
}

/// Unwrap a single-object envelope and deserialize it.
pub fn normalize_item<T: Resource>(body: Value) -> ApiResult<T> {
    let entry = unwrap_object(body, T::ITEM_KEY);
    if !has_required(&entry, T::REQUIRED) {
        return Err(ApiError::Network(format!(
            "malformed {} payload: missing one of {:?}",
            T::ITEM_KEY,
            T::REQUIRED
        )));
    }
    serde_json::from_value(entry)
        .map_err(|e| ApiError::Network(format!("malformed {} payload: {e}", T::ITEM_KEY)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_shapes() {
        assert_eq!(classify(&json!([]), "threads"), Envelope::Bare);
        assert_eq!(classify(&json!({"threads": []}), "threads"), Envelope::Keyed);
        assert_eq!(classify(&json!({"success": true, "data": []}), "threads"), Envelope::Data);
        assert_eq!(classify(&json!({"threads": "nope"}), "threads"), Envelope::Unrecognized);
    }

    #[test]
    fn resource_key_beats_data() {
        let body = json!({"categories": [{"id": 1}], "data": [{"id": 2}, {"id": 3}]});
        assert_eq!(unwrap_list(body, "categories"), vec![json!({"id": 1})]);
    }

    #[test]
    fn unrecognized_and_null_bodies_are_empty() {
        assert!(unwrap_list(json!({"success": false, "message": "boom"}), "posts").is_empty());
        assert!(unwrap_list(Value::Null, "posts").is_empty());
        assert!(unwrap_list(json!("text"), "posts").is_empty());
    }

    #[test]
    fn unwrap_object_precedence() {
        assert_eq!(unwrap_object(json!({"thread": {"id": "1"}}), "thread"), json!({"id": "1"}));
        assert_eq!(unwrap_object(json!({"success": true, "data": {"id": "2"}}), "thread"), json!({"id": "2"}));
        assert_eq!(unwrap_object(json!({"id": "3", "title": "x"}), "thread"), json!({"id": "3", "title": "x"}));
    }

    #[test]
    fn required_field_presence() {
        assert!(has_required(&json!({"id": 0, "name": "x"}), &["id", "name"]));
        assert!(!has_required(&json!({"id": "1", "name": ""}), &["id", "name"]));
        assert!(!has_required(&json!({"id": null, "name": "x"}), &["id", "name"]));
        assert!(!has_required(&json!(null), &["id"]));
    }
}
