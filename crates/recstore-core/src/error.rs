//! Error types and per-operation error policies

use thiserror::Error;

use crate::status::Status;

/// Errors that can occur during store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No compatible storage engine on this host
    #[error("storage engine not supported: {0}")]
    NotSupported(String),

    /// Database open/upgrade error
    #[error("open error: {0}")]
    Open(String),

    /// `open` called on a session that is already open
    #[error("session is already open")]
    AlreadyOpen,

    /// Operation invoked while the session is closed
    #[error("session is closed")]
    Closed,

    /// Store name is not declared in the configuration or the database
    #[error("unknown store: {0}")]
    UnknownStore(String),

    /// Index name is not declared on the store
    #[error("unknown index '{index}' on store '{store}'")]
    UnknownIndex { store: String, index: String },

    /// Engine refused a write (duplicate primary key, unique index violation)
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Request error from an engine operation
    #[error("request error: {0}")]
    Request(String),

    /// Transaction error
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Value cannot be used as a key
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid database configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A status operation failed and settled with its failure status
    #[error("{status}: {reason}")]
    Rejected { status: Status, reason: String },
}

impl StoreError {
    /// The status payload this error settles with, if it has one.
    pub fn status(&self) -> Option<Status> {
        match self {
            StoreError::NotSupported(_) => Some(Status::NotSupported),
            StoreError::Open(_) => Some(Status::OpenFailed),
            StoreError::Closed => Some(Status::SessionClosed),
            StoreError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// How an operation reports an engine failure to its caller.
///
/// Status operations reject, data fetches report absence, cursor mutations
/// settle with a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Fail with `StoreError::Rejected` carrying the failure status.
    Reject,
    /// Resolve with `None`; the failure is only logged.
    ResolveAbsent,
    /// Resolve with the failure status.
    ResolveStatus,
}

/// Every public operation, used for policy lookup and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Close,
    Set,
    SetBatch,
    Update,
    Get,
    GetAll,
    GetAllKeys,
    Count,
    Remove,
    RemoveAll,
    GetByIndex,
    GetCountByIndex,
    GetAllByIndex,
    GetAllKeysByIndex,
    GetKeyByIndex,
    GetAllByCursor,
    UpdateByCursor,
    DeleteByCursor,
}

impl Operation {
    pub fn policy(self) -> ErrorPolicy {
        match self {
            Operation::Open
            | Operation::Close
            | Operation::Set
            | Operation::SetBatch
            | Operation::Update
            | Operation::Remove
            | Operation::RemoveAll => ErrorPolicy::Reject,

            Operation::Get
            | Operation::GetAll
            | Operation::GetAllKeys
            | Operation::Count
            | Operation::GetByIndex
            | Operation::GetCountByIndex
            | Operation::GetAllByIndex
            | Operation::GetAllKeysByIndex
            | Operation::GetKeyByIndex
            | Operation::GetAllByCursor => ErrorPolicy::ResolveAbsent,

            Operation::UpdateByCursor | Operation::DeleteByCursor => ErrorPolicy::ResolveStatus,
        }
    }

    /// Method name as exposed to JavaScript callers.
    pub fn name(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::Set => "set",
            Operation::SetBatch => "setBatch",
            Operation::Update => "update",
            Operation::Get => "get",
            Operation::GetAll => "getAll",
            Operation::GetAllKeys => "getAllKeys",
            Operation::Count => "count",
            Operation::Remove => "remove",
            Operation::RemoveAll => "removeAll",
            Operation::GetByIndex => "getByIndex",
            Operation::GetCountByIndex => "getCountByIndex",
            Operation::GetAllByIndex => "getAllByIndex",
            Operation::GetAllKeysByIndex => "getAllKeysByIndex",
            Operation::GetKeyByIndex => "getKeyByIndex",
            Operation::GetAllByCursor => "getAllByCursor",
            Operation::UpdateByCursor => "updateByCursor",
            Operation::DeleteByCursor => "deleteByCursor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(StoreError::Closed.status(), Some(Status::SessionClosed));
        assert_eq!(
            StoreError::NotSupported("no indexedDB".into()).status(),
            Some(Status::NotSupported)
        );
        let rejected = StoreError::Rejected {
            status: Status::ClearFailed,
            reason: "boom".into(),
        };
        assert_eq!(rejected.status(), Some(Status::ClearFailed));
        assert_eq!(StoreError::Request("x".into()).status(), None);
    }

    #[test]
    fn test_policies_stay_distinct() {
        assert_eq!(Operation::Update.policy(), ErrorPolicy::Reject);
        assert_eq!(Operation::GetAllKeys.policy(), ErrorPolicy::ResolveAbsent);
        assert_eq!(Operation::DeleteByCursor.policy(), ErrorPolicy::ResolveStatus);
    }
}
