//! Error types for transaction processing.

use std::fmt;

use thiserror::Error;

use crate::Amount;

/// Top-level error returned by [`Engine::execute`](super::Engine::execute).
///
/// Store-native errors are translated into this taxonomy before leaving the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The idempotency key was already committed, or a concurrent request
    /// with the same key won the race.
    #[error("transaction {key} already processed")]
    AlreadyProcessed { key: String },

    #[error("insufficient funds for user {user_id}: requested {requested}")]
    InsufficientFunds { user_id: String, requested: Amount },

    /// The store refused the balance arithmetic itself, e.g. a result that
    /// cannot be held exactly or a balance that is not a number. Resubmitting
    /// the same request fails the same way.
    #[error("balance of user {user_id} cannot take this update: {detail}")]
    BalanceNotUpdatable { user_id: String, detail: String },

    /// The store cancelled the write on a condition without saying which one.
    #[error("transaction cancelled by an unidentified conditional check")]
    ConditionalFailureUnspecified,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("unexpected store error: {0}")]
    UnexpectedStoreError(String),
}

/// Broad class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed request; never reached the store.
    Caller,
    /// The store refused the transaction on business grounds.
    Rejection,
    /// Infrastructure failure; outcome is unknown to the caller.
    Infrastructure,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidInput(_) => ErrorClass::Caller,
            EngineError::AlreadyProcessed { .. }
            | EngineError::InsufficientFunds { .. }
            | EngineError::BalanceNotUpdatable { .. } => ErrorClass::Rejection,
            EngineError::ConditionalFailureUnspecified
            | EngineError::StoreUnavailable(_)
            | EngineError::UnexpectedStoreError(_) => ErrorClass::Infrastructure,
        }
    }

    /// Whether resubmitting the identical request (same idempotency key) is
    /// meaningful. It is always safe: a committed key re-lands on
    /// `AlreadyProcessed`.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Infrastructure
    }
}

/// Reason a request was rejected by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid idempotentKey: must be a non-empty string")]
    InvalidIdempotencyKey,

    #[error("invalid userId: must be a non-empty string")]
    InvalidUserId,

    #[error("invalid amount {value}: {reason}")]
    InvalidAmount { value: String, reason: AmountIssue },

    #[error("invalid type '{0}': must be either \"credit\" or \"debit\"")]
    InvalidTransactionType(String),
}

/// Why an amount was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountIssue {
    NotANumber,
    NotPositive,
    /// Positive, but applying it would change its value.
    Inexact,
}

impl fmt::Display for AmountIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountIssue::NotANumber | AmountIssue::NotPositive => {
                f.write_str("must be a positive number")
            }
            AmountIssue::Inexact => f.write_str("cannot be held exactly in 28 significant digits"),
        }
    }
}
