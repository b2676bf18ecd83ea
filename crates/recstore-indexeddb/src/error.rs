//! Error types for the IndexedDB engine

use recstore_core::StoreError;
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomException;

/// Result type for IndexedDB operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur during IndexedDB operations
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open/upgrade error
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Transaction error
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// ConstraintError: duplicate primary key or unique index value
    #[error("IndexedDB constraint error: {0}")]
    Constraint(String),

    /// Object store not present in the opened database
    #[error("object store {0} not found")]
    UnknownStore(String),

    /// Index not declared on the object store
    #[error("index {index} not found on store {store}")]
    UnknownIndex { store: String, index: String },

    /// Value handed back by IndexedDB cannot be used as a key
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),
}

impl IndexedDbError {
    /// Classify a value thrown or rejected by IndexedDB.
    ///
    /// `DOMException`s are split by name; anything else becomes a request error.
    pub fn from_js(val: JsValue) -> Self {
        match val.dyn_into::<DomException>() {
            Ok(dom) => {
                let msg = format!("{}: {}", dom.name(), dom.message());
                match dom.name().as_str() {
                    "ConstraintError" => IndexedDbError::Constraint(msg),
                    "TransactionInactiveError" | "AbortError" | "ReadOnlyError" => {
                        IndexedDbError::Transaction(msg)
                    }
                    "DataError" => IndexedDbError::InvalidKey(msg),
                    _ => IndexedDbError::Request(msg),
                }
            }
            Err(other) => IndexedDbError::Request(describe(&other)),
        }
    }
}

impl From<JsValue> for IndexedDbError {
    fn from(val: JsValue) -> Self {
        IndexedDbError::from_js(val)
    }
}

/// Best-effort human readable form of a JS value.
pub(crate) fn describe(val: &JsValue) -> String {
    if let Some(s) = val.as_string() {
        return s;
    }
    js_sys::JSON::stringify(val)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", val))
}

/// Convert IndexedDbError to StoreError for the engine traits
impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => StoreError::NotSupported(msg),
            IndexedDbError::Open(msg) => StoreError::Open(msg),
            IndexedDbError::Transaction(msg) => StoreError::Transaction(msg),
            IndexedDbError::Request(msg) => StoreError::Request(msg),
            IndexedDbError::Constraint(msg) => StoreError::Constraint(msg),
            IndexedDbError::UnknownStore(name) => StoreError::UnknownStore(name),
            IndexedDbError::UnknownIndex { store, index } => StoreError::UnknownIndex { store, index },
            IndexedDbError::InvalidKey(msg) => StoreError::InvalidKey(msg),
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => StoreError::Serialization(format!("JS: {}", msg)),
        }
    }
}
