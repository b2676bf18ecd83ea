//! Record keys, key paths and key ranges
//!
//! Keys follow the host engine's key model: numbers, strings and arrays of
//! keys. Ordering matches IndexedDB so that the in-memory engine returns
//! records in the same order the browser would.

use std::cmp::Ordering;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// A valid store or index key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(f64),
    String(String),
    Array(Vec<Key>),
}

impl Key {
    /// Convert a JSON value into a key.
    ///
    /// Returns `None` for values the engine refuses as keys (booleans, null,
    /// objects, arrays containing any of those).
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => n.as_f64().map(Key::Number),
            Value::String(s) => Some(Key::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            Value::Null | Value::Bool(_) | Value::Object(_) => None,
        }
    }

    /// Extract the key stored at `key_path` inside `record`.
    pub fn from_record(record: &Value, key_path: &str) -> Option<Key> {
        resolve_key_path(record, key_path).and_then(Key::from_value)
    }

    /// Convert back to a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::String(_) => 1,
            Key::Array(_) => 2,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Number(a), Key::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            // The engine compares strings by UTF-16 code unit
            (Key::String(a), Key::String(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl TryFrom<Value> for Key {
    type Error = StoreError;

    fn try_from(value: Value) -> StoreResult<Self> {
        Key::from_value(&value).ok_or_else(|| StoreError::InvalidKey(value.to_string()))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(n)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n as f64)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<u32> for Key {
    fn from(n: u32) -> Self {
        Key::Number(f64::from(n))
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items)
    }
}

/// Resolve a dotted key path (`"profile.email"`) inside a record.
///
/// An empty path addresses the record itself.
pub fn resolve_key_path<'a>(record: &'a Value, key_path: &str) -> Option<&'a Value> {
    if key_path.is_empty() {
        return Some(record);
    }
    key_path
        .split('.')
        .try_fold(record, |current, segment| current.as_object()?.get(segment))
}

/// A contiguous interval of keys used to scope index queries.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRange {
    lower: Bound<Key>,
    upper: Bound<Key>,
}

impl KeyRange {
    /// Every key.
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    /// Exactly one key.
    pub fn only(key: impl Into<Key>) -> Self {
        let key = key.into();
        Self {
            lower: Bound::Included(key.clone()),
            upper: Bound::Included(key),
        }
    }

    /// Keys between `lower` and `upper`; the `*_open` flags exclude the endpoint.
    pub fn bound(
        lower: impl Into<Key>,
        upper: impl Into<Key>,
        lower_open: bool,
        upper_open: bool,
    ) -> Self {
        Self {
            lower: to_bound(lower.into(), lower_open),
            upper: to_bound(upper.into(), upper_open),
        }
    }

    /// Keys at or above (`open`: strictly above) `lower`.
    pub fn lower_bound(lower: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: to_bound(lower.into(), open),
            upper: Bound::Unbounded,
        }
    }

    /// Keys at or below (`open`: strictly below) `upper`.
    pub fn upper_bound(upper: impl Into<Key>, open: bool) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: to_bound(upper.into(), open),
        }
    }

    pub fn lower(&self) -> &Bound<Key> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<Key> {
        &self.upper
    }

    /// True when neither side is bounded.
    pub fn is_unbounded(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    /// True when both bounds are inclusive and equal, i.e. `only(key)`.
    pub fn single_key(&self) -> Option<&Key> {
        match (&self.lower, &self.upper) {
            (Bound::Included(lo), Bound::Included(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        let above = match &self.lower {
            Bound::Included(lo) => key >= lo,
            Bound::Excluded(lo) => key > lo,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        };
        above && below
    }
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Key> for KeyRange {
    fn from(key: Key) -> Self {
        KeyRange::only(key)
    }
}

fn to_bound(key: Key, open: bool) -> Bound<Key> {
    if open {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_non_keys() {
        assert!(Key::from_value(&json!(null)).is_none());
        assert!(Key::from_value(&json!(true)).is_none());
        assert!(Key::from_value(&json!({"a": 1})).is_none());
        assert!(Key::from_value(&json!([1, null])).is_none());
        assert_eq!(Key::from_value(&json!([1, "a"])), Some(Key::Array(vec![1.into(), "a".into()])));
    }

    #[test]
    fn test_integer_and_float_keys_are_equal() {
        let int = Key::from_value(&json!(1)).unwrap();
        let float = Key::from_value(&json!(1.0)).unwrap();
        assert_eq!(int, float);
    }

    #[test]
    fn test_ordering_across_types() {
        let mut keys = vec![
            Key::from(vec![Key::from(1)]),
            Key::from("b"),
            Key::from(10),
            Key::from("a"),
            Key::from(-3.5),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::from(-3.5),
                Key::from(10),
                Key::from("a"),
                Key::from("b"),
                Key::from(vec![Key::from(1)]),
            ]
        );
    }

    #[test]
    fn test_array_ordering_prefix_first() {
        let short = Key::from(vec![Key::from(1)]);
        let long = Key::from(vec![Key::from(1), Key::from(2)]);
        assert!(short < long);
    }

    #[test]
    fn test_resolve_nested_key_path() {
        let record = json!({"id": 7, "profile": {"email": "a@b.c"}});
        assert_eq!(resolve_key_path(&record, "profile.email"), Some(&json!("a@b.c")));
        assert_eq!(resolve_key_path(&record, "profile.phone"), None);
        assert_eq!(resolve_key_path(&record, "id.deeper"), None);
        assert_eq!(Key::from_record(&record, "id"), Some(Key::from(7)));
    }

    #[test]
    fn test_key_range_contains() {
        let range = KeyRange::bound(2, 5, false, true);
        assert!(!range.contains(&Key::from(1)));
        assert!(range.contains(&Key::from(2)));
        assert!(range.contains(&Key::from(4.9)));
        assert!(!range.contains(&Key::from(5)));

        let only = KeyRange::only("x");
        assert_eq!(only.single_key(), Some(&Key::from("x")));
        assert!(only.contains(&Key::from("x")));
        assert!(!only.contains(&Key::from("y")));

        assert!(KeyRange::all().is_unbounded());
        assert!(KeyRange::lower_bound(3, true).contains(&Key::from("z")));
        assert!(!KeyRange::upper_bound(3, true).contains(&Key::from(3)));
    }

    #[test]
    fn test_key_deserializes_untagged() {
        let key: Key = serde_json::from_str(r#"["a", 2]"#).unwrap();
        assert_eq!(key, Key::Array(vec!["a".into(), 2.into()]));
        assert!(serde_json::from_str::<Key>("true").is_err());
    }
}
