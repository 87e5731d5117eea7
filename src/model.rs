//! Core domain types for the ledger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::Amount;

/// Direction of a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Increase the balance.
    Credit,
    /// Decrease the balance, never below zero.
    Debit,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ();

    /// Exact match only: `credit` or `debit`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(TransactionKind::Credit),
            "debit" => Ok(TransactionKind::Debit),
            _ => Err(()),
        }
    }
}

/// An amount as supplied by a caller, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

impl From<f64> for RawAmount {
    fn from(value: f64) -> Self {
        RawAmount::Number(value)
    }
}

impl From<i32> for RawAmount {
    fn from(value: i32) -> Self {
        RawAmount::Number(f64::from(value))
    }
}

impl From<i64> for RawAmount {
    fn from(value: i64) -> Self {
        RawAmount::Number(value as f64)
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

impl From<String> for RawAmount {
    fn from(value: String) -> Self {
        RawAmount::Text(value)
    }
}

/// An untrusted transaction request. Every field may be missing or malformed;
/// [`validate`](crate::validate::validate) turns it into a [`ValidatedRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRequest {
    pub user_id: Option<String>,
    pub amount: Option<RawAmount>,
    pub kind: Option<String>,
    pub idempotent_key: Option<String>,
}

impl RawRequest {
    pub fn new(
        user_id: impl Into<String>,
        amount: impl Into<RawAmount>,
        kind: impl Into<String>,
        idempotent_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            amount: Some(amount.into()),
            kind: Some(kind.into()),
            idempotent_key: Some(idempotent_key.into()),
        }
    }

    pub fn credit(
        user_id: impl Into<String>,
        amount: impl Into<RawAmount>,
        idempotent_key: impl Into<String>,
    ) -> Self {
        Self::new(user_id, amount, TransactionKind::Credit.as_str(), idempotent_key)
    }

    pub fn debit(
        user_id: impl Into<String>,
        amount: impl Into<RawAmount>,
        idempotent_key: impl Into<String>,
    ) -> Self {
        Self::new(user_id, amount, TransactionKind::Debit.as_str(), idempotent_key)
    }
}

/// A request that passed validation. Amount is always strictly positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub user_id: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub idempotent_key: String,
}

/// Proof of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub user_id: String,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub idempotent_key: String,
    /// Timestamp written to the idempotency record
    pub created_at: DateTime<Utc>,
}
