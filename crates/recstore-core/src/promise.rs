//! Settling single engine requests according to the operation's error policy
//!
//! Engines report every request as a `StoreResult`. These helpers turn that
//! into what the caller of a facade method sees: a fixed status, a rejected
//! status, or a value that may be absent.

use std::future::Future;

use crate::error::{ErrorPolicy, Operation, StoreError, StoreResult};
use crate::status::Status;

/// Settle a status-only request.
///
/// Success yields `success`. Failure yields `StoreError::Rejected` carrying
/// `failure` under [`ErrorPolicy::Reject`], or `Ok(failure)` under
/// [`ErrorPolicy::ResolveStatus`].
pub async fn promisify_fixed<T, F>(
    op: Operation,
    request: F,
    success: Status,
    failure: Status,
) -> StoreResult<Status>
where
    F: Future<Output = StoreResult<T>>,
{
    match request.await {
        Ok(_) => Ok(success),
        Err(err) => {
            tracing::debug!(op = op.name(), status = failure.code(), error = %err, "request failed");
            match op.policy() {
                ErrorPolicy::ResolveStatus => Ok(failure),
                ErrorPolicy::Reject | ErrorPolicy::ResolveAbsent => Err(StoreError::Rejected {
                    status: failure,
                    reason: err.to_string(),
                }),
            }
        }
    }
}

/// Settle a data request: the produced value, or `None` if the request failed.
///
/// Never fails; the engine error is only logged.
pub async fn promisify_result<T, F>(op: Operation, request: F) -> Option<T>
where
    F: Future<Output = StoreResult<T>>,
{
    debug_assert_eq!(op.policy(), ErrorPolicy::ResolveAbsent);
    match request.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(op = op.name(), error = %err, "request failed, resolving as absent");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> StoreResult<u32> {
        Ok(7)
    }

    async fn failing() -> StoreResult<u32> {
        Err(StoreError::Request("boom".into()))
    }

    #[tokio::test]
    async fn test_fixed_success() {
        let status = promisify_fixed(Operation::Remove, ok(), Status::DeleteOk, Status::DeleteFailed)
            .await
            .unwrap();
        assert_eq!(status, Status::DeleteOk);
    }

    #[tokio::test]
    async fn test_fixed_failure_rejects() {
        let result =
            promisify_fixed(Operation::Remove, failing(), Status::DeleteOk, Status::DeleteFailed)
                .await;
        match result {
            Err(StoreError::Rejected { status, reason }) => {
                assert_eq!(status, Status::DeleteFailed);
                assert!(reason.contains("boom"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fixed_failure_resolves_for_cursor_ops() {
        let status = promisify_fixed(
            Operation::DeleteByCursor,
            failing(),
            Status::DeleteOk,
            Status::DeleteFailed,
        )
        .await
        .unwrap();
        assert_eq!(status, Status::DeleteFailed);
    }

    #[tokio::test]
    async fn test_result_failure_is_absent() {
        assert_eq!(promisify_result(Operation::Get, ok()).await, Some(7));
        assert_eq!(promisify_result(Operation::Get, failing()).await, None);
    }
}
