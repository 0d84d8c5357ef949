//! Mapping between untyped records and typed sub-collections.
//!
//! A missing key, or a key explicitly set to `null`, decodes to the zero
//! value. A present key of the wrong shape is a [`StoreError::CorruptRecord`];
//! it is never silently dropped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StoreError, StoreResult};
use crate::storage::Document;

/// Decode a list sub-collection
pub fn decode_list<T: DeserializeOwned>(doc: &Document, key: &str) -> StoreResult<Vec<T>> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value @ Value::Array(_)) => {
            Vec::<T>::deserialize(value).map_err(|e| corrupt(key, e.to_string()))
        }
        Some(other) => Err(corrupt(
            key,
            format!("expected a list, found {}", shape_of(other)),
        )),
    }
}

/// Decode a single-object sub-collection
pub fn decode_object<S: DeserializeOwned>(doc: &Document, key: &str) -> StoreResult<Option<S>> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value @ Value::Object(_)) => S::deserialize(value)
            .map(Some)
            .map_err(|e| corrupt(key, e.to_string())),
        Some(other) => Err(corrupt(
            key,
            format!("expected an object, found {}", shape_of(other)),
        )),
    }
}

/// Encode a typed value into its stored form
pub fn encode<V: Serialize + ?Sized>(key: &str, value: &V) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| corrupt(key, format!("failed to encode: {}", e)))
}

/// Replace (`Some`) or remove (`None`) one key, leaving the rest of the record untouched
pub fn write(doc: &mut Document, key: &str, value: Option<Value>) {
    match value {
        Some(value) => {
            doc.insert(key.to_string(), value);
        }
        None => {
            doc.remove(key);
        }
    }
}

fn corrupt(key: &str, reason: String) -> StoreError {
    StoreError::CorruptRecord {
        key: key.to_string(),
        reason,
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
