//! Cursor facade: whole-store scans with conditional update/delete
//!
//! Mutating scans visit every record before settling and report an aggregate
//! result, so a store with several matching records yields one deterministic
//! status instead of whichever per-record write happened to finish last.

use serde::Serialize;
use serde_json::Value;

use crate::engine::{AccessMode, CursorOps, Engine, Record, RecordCursor};
use crate::error::{Operation, StoreError, StoreResult};
use crate::key::{resolve_key_path, Key};
use crate::promise::{promisify_fixed, promisify_result};
use crate::session::Session;
use crate::status::Status;

/// Aggregate outcome of a mutating cursor scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CursorReport {
    pub status: Status,
    /// Records whose attribute matched.
    pub matched: usize,
    /// Matched records actually written or deleted.
    pub applied: usize,
}

impl CursorReport {
    fn new(status: Status, matched: usize, applied: usize) -> Self {
        Self {
            status,
            matched,
            applied,
        }
    }
}

/// True when `record[attr_name]` equals `attr_value`. Key-like values compare
/// as keys, so `1` and `1.0` match.
fn attr_matches(record: &Record, attr_name: &str, attr_value: &Value) -> bool {
    let Some(found) = resolve_key_path(record, attr_name) else {
        return false;
    };
    match (Key::from_value(found), Key::from_value(attr_value)) {
        (Some(a), Some(b)) => a == b,
        _ => found == attr_value,
    }
}

/// Counters accumulated while a mutating scan runs.
#[derive(Default)]
struct ScanTally {
    matched: usize,
    applied: usize,
    failed: usize,
    key_changes: usize,
}

impl<E> Session<E>
where
    E: Engine,
    E::Connection: CursorOps,
{
    /// Every record in primary key order, read through a cursor.
    ///
    /// An empty store yields `Some(vec![])`; a failed scan yields `None`.
    pub async fn get_all_by_cursor(&self, store: &str) -> StoreResult<Option<Vec<Record>>> {
        let connection = self.connection()?;
        Ok(promisify_result(Operation::GetAllByCursor, async {
            let mut cursor = connection.open_cursor(store, AccessMode::ReadOnly).await?;
            let mut records = Vec::new();
            while let Some(record) = cursor.value() {
                records.push(record.clone());
                cursor.advance().await?;
            }
            tracing::debug!(store, count = records.len(), "cursor scan complete");
            Ok::<_, StoreError>(records)
        })
        .await)
    }

    /// Replace every record whose `attr_name` equals `attr_value` with
    /// `new_record`, provided that keeps the record's primary key.
    ///
    /// Matches whose primary key differs from `new_record`'s are left
    /// untouched. Status, in order of precedence: `NotFound` when nothing
    /// matched, `UpdateFailed` when any write failed, `PrimaryKeyImmutable`
    /// when any match would have changed key, otherwise `UpdateOk`.
    pub async fn update_by_cursor(
        &self,
        store: &str,
        attr_name: &str,
        attr_value: &Value,
        new_record: &Record,
    ) -> StoreResult<CursorReport> {
        let connection = self.connection()?;
        let decl = match self.config().require_store(store) {
            Ok(decl) => decl,
            Err(err) => return Ok(self.scan_failed(store, Status::UpdateFailed, err)),
        };
        let Some(new_key) = Key::from_record(new_record, &decl.key) else {
            return Ok(CursorReport::new(Status::NoKeyField, 0, 0));
        };

        let mut cursor = match connection.open_cursor(store, AccessMode::ReadWrite).await {
            Ok(cursor) => cursor,
            Err(err) => return Ok(self.scan_failed(store, Status::UpdateFailed, err)),
        };

        let mut tally = ScanTally::default();
        while let Some(record) = cursor.value() {
            if attr_matches(record, attr_name, attr_value) {
                tally.matched += 1;
                if cursor.primary_key() == Some(&new_key) {
                    let status = promisify_fixed(
                        Operation::UpdateByCursor,
                        cursor.update(new_record),
                        Status::UpdateOk,
                        Status::UpdateFailed,
                    )
                    .await?;
                    if status.is_success() {
                        tally.applied += 1;
                    } else {
                        tally.failed += 1;
                    }
                } else {
                    tracing::debug!(
                        store,
                        current = ?cursor.primary_key(),
                        requested = ?new_key,
                        "refusing to change primary key"
                    );
                    tally.key_changes += 1;
                }
            }
            // The scan continues past a match
            if let Err(err) = cursor.advance().await {
                tracing::warn!(store, error = %err, "cursor advance failed");
                tally.failed += 1;
                break;
            }
        }

        let status = if tally.matched == 0 {
            Status::NotFound
        } else if tally.failed > 0 {
            Status::UpdateFailed
        } else if tally.key_changes > 0 {
            Status::PrimaryKeyImmutable
        } else {
            Status::UpdateOk
        };
        tracing::debug!(
            store,
            matched = tally.matched,
            applied = tally.applied,
            status = status.code(),
            "cursor update complete"
        );
        Ok(CursorReport::new(status, tally.matched, tally.applied))
    }

    /// Delete every record whose `attr_name` equals `attr_value`.
    ///
    /// Status: `NotFound` when nothing matched, `DeleteFailed` when any delete
    /// failed, otherwise `DeleteOk`.
    pub async fn delete_by_cursor(
        &self,
        store: &str,
        attr_name: &str,
        attr_value: &Value,
    ) -> StoreResult<CursorReport> {
        let connection = self.connection()?;
        let mut cursor = match connection.open_cursor(store, AccessMode::ReadWrite).await {
            Ok(cursor) => cursor,
            Err(err) => return Ok(self.scan_failed(store, Status::DeleteFailed, err)),
        };

        let mut tally = ScanTally::default();
        while let Some(record) = cursor.value() {
            if attr_matches(record, attr_name, attr_value) {
                tally.matched += 1;
                let status = promisify_fixed(
                    Operation::DeleteByCursor,
                    cursor.delete(),
                    Status::DeleteOk,
                    Status::DeleteFailed,
                )
                .await?;
                if status.is_success() {
                    tally.applied += 1;
                } else {
                    tally.failed += 1;
                }
            }
            if let Err(err) = cursor.advance().await {
                tracing::warn!(store, error = %err, "cursor advance failed");
                tally.failed += 1;
                break;
            }
        }

        let status = if tally.matched == 0 {
            Status::NotFound
        } else if tally.failed > 0 {
            Status::DeleteFailed
        } else {
            Status::DeleteOk
        };
        tracing::debug!(
            store,
            matched = tally.matched,
            applied = tally.applied,
            status = status.code(),
            "cursor delete complete"
        );
        Ok(CursorReport::new(status, tally.matched, tally.applied))
    }

    fn scan_failed(&self, store: &str, status: Status, err: StoreError) -> CursorReport {
        tracing::warn!(store, error = %err, "cursor scan could not start");
        CursorReport::new(status, 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attr_matches() {
        let record = json!({"id": 1, "team": {"name": "core"}, "score": 3, "flag": true});
        assert!(attr_matches(&record, "team.name", &json!("core")));
        assert!(attr_matches(&record, "score", &json!(3.0)));
        assert!(attr_matches(&record, "flag", &json!(true)));
        assert!(!attr_matches(&record, "flag", &json!(false)));
        assert!(!attr_matches(&record, "missing", &json!(null)));
    }
}
