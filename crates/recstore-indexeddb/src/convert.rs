//! Conversions between JSON records, keys and JS values
//!
//! Records cross the boundary as JSON text: `serde_json` on the Rust side,
//! `JSON.parse`/`JSON.stringify` on the JS side.

use recstore_core::{Key, KeyRange};
use serde_json::Value;
use std::ops::Bound;
use wasm_bindgen::JsValue;
use web_sys::IdbKeyRange;

use crate::error::{describe, IndexedDbError, Result};

/// Convert a JSON record (or key) into a structured-clonable JS value.
pub fn json_to_js(value: &Value) -> Result<JsValue> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text).map_err(|e| IndexedDbError::JsValue(describe(&e)))
}

/// Convert a JS value read from IndexedDB back into JSON. `undefined` maps to `null`.
pub fn js_to_json(val: &JsValue) -> Result<Value> {
    if val.is_undefined() {
        return Ok(Value::Null);
    }
    let text = js_sys::JSON::stringify(val).map_err(|e| IndexedDbError::JsValue(describe(&e)))?;
    Ok(serde_json::from_str(&String::from(text))?)
}

/// Request result as an optional record; `undefined` means no match.
pub fn js_to_record(val: &JsValue) -> Result<Option<Value>> {
    if val.is_undefined() {
        return Ok(None);
    }
    js_to_json(val).map(Some)
}

pub fn key_to_js(key: &Key) -> Result<JsValue> {
    json_to_js(&key.to_value())
}

pub fn js_to_key(val: &JsValue) -> Result<Key> {
    let value = js_to_json(val)?;
    Key::from_value(&value).ok_or_else(|| IndexedDbError::InvalidKey(value.to_string()))
}

/// Request result as an optional key; `undefined` means no match.
pub fn js_to_optional_key(val: &JsValue) -> Result<Option<Key>> {
    if val.is_undefined() {
        return Ok(None);
    }
    js_to_key(val).map(Some)
}

/// Decode a JS array of records.
pub fn js_to_records(val: &JsValue) -> Result<Vec<Value>> {
    match js_to_json(val)? {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(IndexedDbError::JsValue(format!(
            "expected array of records, got {}",
            other
        ))),
    }
}

/// Decode a JS array of keys.
pub fn js_to_keys(val: &JsValue) -> Result<Vec<Key>> {
    js_to_records(val)?
        .iter()
        .map(|value| {
            Key::from_value(value).ok_or_else(|| IndexedDbError::InvalidKey(value.to_string()))
        })
        .collect()
}

/// Request result of a `count()` call.
pub fn js_to_count(val: &JsValue) -> Result<u32> {
    val.as_f64()
        .map(|n| n as u32)
        .ok_or_else(|| IndexedDbError::JsValue(format!("count is not a number: {}", describe(val))))
}

/// Build an `IDBKeyRange` for `range`. `None` for the unbounded range, which
/// IndexedDB expresses by omitting the query.
pub fn key_range_to_js(range: &KeyRange) -> Result<Option<JsValue>> {
    if let Some(key) = range.single_key() {
        let only = IdbKeyRange::only(&key_to_js(key)?).map_err(IndexedDbError::from_js)?;
        return Ok(Some(only.into()));
    }

    let built = match (range.lower(), range.upper()) {
        (Bound::Unbounded, Bound::Unbounded) => return Ok(None),
        (lower, Bound::Unbounded) => {
            let (key, open) = endpoint(lower)?;
            IdbKeyRange::lower_bound_with_open(&key, open)
        }
        (Bound::Unbounded, upper) => {
            let (key, open) = endpoint(upper)?;
            IdbKeyRange::upper_bound_with_open(&key, open)
        }
        (lower, upper) => {
            let (lo, lo_open) = endpoint(lower)?;
            let (hi, hi_open) = endpoint(upper)?;
            IdbKeyRange::bound_with_lower_open_and_upper_open(&lo, &hi, lo_open, hi_open)
        }
    };
    built.map(|r| Some(r.into())).map_err(IndexedDbError::from_js)
}

/// Like [`key_range_to_js`], but always yields a query. Used by calls that
/// require one (`get`, `getKey`): the unbounded range becomes `lowerBound(-Infinity)`,
/// the smallest key.
pub fn key_range_to_query(range: &KeyRange) -> Result<JsValue> {
    match key_range_to_js(range)? {
        Some(query) => Ok(query),
        None => IdbKeyRange::lower_bound(&JsValue::from_f64(f64::NEG_INFINITY))
            .map(JsValue::from)
            .map_err(IndexedDbError::from_js),
    }
}

fn endpoint(bound: &Bound<Key>) -> Result<(JsValue, bool)> {
    match bound {
        Bound::Included(key) => Ok((key_to_js(key)?, false)),
        Bound::Excluded(key) => Ok((key_to_js(key)?, true)),
        Bound::Unbounded => Err(IndexedDbError::InvalidKey("unbounded endpoint".into())),
    }
}
