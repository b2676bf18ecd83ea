//! Status payloads returned by mutating operations
//!
//! Every status-producing operation settles with one of these fixed
//! `{code, message}` pairs rather than with the mutated data.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Closed set of operation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// No compatible storage engine on this host
    NotSupported,
    /// The open request failed
    OpenFailed,
    /// Operation attempted while the session is closed
    SessionClosed,

    InsertOk,
    InsertFailed,
    /// Record lacks the store's key field
    NoKeyField,

    BatchInsertOk,
    BatchInsertFailed,

    UpdateOk,
    UpdateFailed,

    DeleteOk,
    DeleteFailed,

    ClearOk,
    ClearFailed,

    /// A cursor scan found no matching record
    NotFound,
    /// A cursor update would have changed a record's primary key
    PrimaryKeyImmutable,
}

impl Status {
    pub const ALL: [Status; 16] = [
        Status::NotSupported,
        Status::OpenFailed,
        Status::SessionClosed,
        Status::InsertOk,
        Status::InsertFailed,
        Status::NoKeyField,
        Status::BatchInsertOk,
        Status::BatchInsertFailed,
        Status::UpdateOk,
        Status::UpdateFailed,
        Status::DeleteOk,
        Status::DeleteFailed,
        Status::ClearOk,
        Status::ClearFailed,
        Status::NotFound,
        Status::PrimaryKeyImmutable,
    ];

    pub fn code(self) -> u16 {
        match self {
            Status::NotSupported => 1001,
            Status::OpenFailed => 1002,
            Status::SessionClosed => 1003,
            Status::InsertOk => 2000,
            Status::InsertFailed => 2001,
            Status::NoKeyField => 2002,
            Status::BatchInsertOk => 2100,
            Status::BatchInsertFailed => 2101,
            Status::UpdateOk => 2200,
            Status::UpdateFailed => 2201,
            Status::DeleteOk => 2300,
            Status::DeleteFailed => 2301,
            Status::ClearOk => 2400,
            Status::ClearFailed => 2401,
            Status::NotFound => 3001,
            Status::PrimaryKeyImmutable => 3002,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Status::NotSupported => "no compatible storage engine available",
            Status::OpenFailed => "failed to open database",
            Status::SessionClosed => "database session is closed",
            Status::InsertOk => "record inserted",
            Status::InsertFailed => "failed to insert record",
            Status::NoKeyField => "record is missing the store key field",
            Status::BatchInsertOk => "all records inserted",
            Status::BatchInsertFailed => "failed to insert one or more records",
            Status::UpdateOk => "record updated",
            Status::UpdateFailed => "failed to update record",
            Status::DeleteOk => "record deleted",
            Status::DeleteFailed => "failed to delete record",
            Status::ClearOk => "store cleared",
            Status::ClearFailed => "failed to clear store",
            Status::NotFound => "no matching record found",
            Status::PrimaryKeyImmutable => "primary key cannot be changed",
        }
    }

    /// Look a status up by its numeric code.
    pub fn from_code(code: u16) -> Option<Status> {
        Status::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            Status::InsertOk
                | Status::BatchInsertOk
                | Status::UpdateOk
                | Status::DeleteOk
                | Status::ClearOk
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Status", 2)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("message", self.message())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_distinct() {
        let codes: HashSet<u16> = Status::ALL.iter().map(|s| s.code()).collect();
        assert_eq!(codes.len(), Status::ALL.len());
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Status::from_code(3002), Some(Status::PrimaryKeyImmutable));
        assert_eq!(Status::from_code(9999), None);
    }

    #[test]
    fn test_serializes_as_code_and_message() {
        let json = serde_json::to_value(Status::NoKeyField).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": 2002, "message": "record is missing the store key field"})
        );
    }

    #[test]
    fn test_only_ok_variants_are_success() {
        assert!(Status::InsertOk.is_success());
        assert!(!Status::NoKeyField.is_success());
        assert!(!Status::NotFound.is_success());
    }
}
