//! JSON payloads exchanged with JavaScript callers
//!
//! Everything here is plain `serde_json`, so the shapes are tested natively;
//! the browser module only moves these values across the wasm-bindgen boundary.

use recstore_core::{CursorReport, Key, KeyRange, Status, StoreDecl, StoreError, StoreResult};
use serde_json::{json, Value};

/// `{code, message}` for a settled status.
pub fn status_payload(status: Status) -> Value {
    json!({"code": status.code(), "message": status.message()})
}

/// Rejection payload. Errors carrying a status become `{code, message, reason?}`;
/// the rest (`AlreadyOpen`, configuration errors) only carry `message`.
pub fn error_payload(err: &StoreError) -> Value {
    match (err.status(), err) {
        (Some(status), StoreError::Rejected { reason, .. }) => {
            let mut payload = status_payload(status);
            payload["reason"] = Value::String(reason.clone());
            payload
        }
        (Some(status), _) => status_payload(status),
        (None, _) => json!({"message": err.to_string()}),
    }
}

/// Cursor mutation result: the status payload plus scan counters.
pub fn report_payload(report: &CursorReport) -> Value {
    let mut payload = status_payload(report.status);
    payload["matched"] = json!(report.matched);
    payload["applied"] = json!(report.applied);
    payload
}

/// Store declarations as passed to the `RecordStore` constructor.
pub fn stores_from_json(value: Value) -> StoreResult<Vec<StoreDecl>> {
    Ok(serde_json::from_value(value)?)
}

/// Key passed by a caller; booleans, null and objects are rejected.
pub fn key_from_json(value: &Value) -> StoreResult<Key> {
    Key::try_from(value.clone())
}

/// Index query passed by a caller.
///
/// - `null`/absent: every key
/// - a key: exactly that key
/// - `{lower?, upper?, lowerOpen?, upperOpen?}`: a range
pub fn query_from_json(value: &Value) -> StoreResult<KeyRange> {
    let Value::Object(fields) = value else {
        return match value {
            Value::Null => Ok(KeyRange::all()),
            other => Ok(KeyRange::only(key_from_json(other)?)),
        };
    };

    let bound = |name: &str| -> StoreResult<Option<Key>> {
        match fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => key_from_json(v).map(Some),
        }
    };
    let flag = |name: &str| fields.get(name).and_then(Value::as_bool).unwrap_or(false);

    let range = match (bound("lower")?, bound("upper")?) {
        (Some(lo), Some(hi)) => KeyRange::bound(lo, hi, flag("lowerOpen"), flag("upperOpen")),
        (Some(lo), None) => KeyRange::lower_bound(lo, flag("lowerOpen")),
        (None, Some(hi)) => KeyRange::upper_bound(hi, flag("upperOpen")),
        (None, None) => KeyRange::all(),
    };
    Ok(range)
}
