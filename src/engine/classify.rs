//! Translation of store failures into [`EngineError`].
//!
//! Cancellation reasons line up with the write set built by
//! [`write_set`](super::write_set): index [`BALANCE_OP`] is the balance
//! update, index [`MARKER_OP`] the idempotency marker.

use super::EngineError;
use super::write_set::{BALANCE_OP, MARKER_OP};
use crate::model::{TransactionKind, ValidatedRequest};
use crate::store::{CancellationReason, StoreError};

/// Cancellation code for an update the store cannot evaluate.
const VALIDATION_CODE: &str = "ValidationError";

/// Map any store error raised while executing `request`.
pub fn classify_store_error(err: StoreError, request: &ValidatedRequest) -> EngineError {
    match err {
        StoreError::TransactionCanceled { reasons } => classify_cancellation(&reasons, request),
        StoreError::Timeout => EngineError::StoreUnavailable("request timed out".to_string()),
        StoreError::Unavailable(message) => EngineError::StoreUnavailable(message),
        other => EngineError::UnexpectedStoreError(other.to_string()),
    }
}

/// Map the per-operation reasons of a cancelled transaction.
///
/// A failed marker insert means the key is already taken, which trumps any
/// balance failure in the same set. A failed balance check is only reported
/// as insufficient funds for debits, the only update carrying a condition.
/// A balance update the store refused to evaluate is a rejection, not an
/// outage.
pub fn classify_cancellation(
    reasons: &[CancellationReason],
    request: &ValidatedRequest,
) -> EngineError {
    let failed = |idx: usize| reasons.get(idx) == Some(&CancellationReason::ConditionalCheckFailed);

    if failed(MARKER_OP) {
        return EngineError::AlreadyProcessed {
            key: request.idempotent_key.clone(),
        };
    }
    if failed(BALANCE_OP) && request.kind == TransactionKind::Debit {
        return EngineError::InsufficientFunds {
            user_id: request.user_id.clone(),
            requested: request.amount,
        };
    }
    // the store could not evaluate the arithmetic; the same request fails again
    if let Some(CancellationReason::Other { code, message }) = reasons.get(BALANCE_OP) {
        if code == VALIDATION_CODE {
            return EngineError::BalanceNotUpdatable {
                user_id: request.user_id.clone(),
                detail: message.clone(),
            };
        }
    }

    let transient = reasons.iter().find(|r| {
        matches!(
            r,
            CancellationReason::TransactionConflict | CancellationReason::Throttled
        )
    });
    if let Some(reason) = transient {
        return EngineError::StoreUnavailable(format!("transaction cancelled: {reason:?}"));
    }

    let other = reasons.iter().find_map(|r| match r {
        CancellationReason::Other { code, message } => Some(format!("{code}: {message}")),
        _ => None,
    });
    match other {
        Some(detail) => EngineError::UnexpectedStoreError(detail),
        None => EngineError::ConditionalFailureUnspecified,
    }
}
