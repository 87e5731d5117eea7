//! Store client port.
//!
//! The engine needs two capabilities from its storage collaborator: a
//! strongly consistent point read and an all-or-nothing conditional
//! multi-item write. Any key-value store offering both can sit behind
//! [`StoreClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::Amount;

mod memory;
pub use memory::{MAX_TRANSACT_ITEMS, MemoryStore};

mod timeout;
pub use timeout::TimeoutStore;

/// Name of the primary key attribute on every table.
pub const PK_ATTR: &str = "PK";

/// Storage operations required by the ledger.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Strongly consistent read by primary key.
    async fn point_read(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError>;

    /// Apply every operation or none. If any condition is false the whole set
    /// is cancelled and the error reports which operations failed.
    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Number(Amount),
    Text(String),
}

/// A stored record: a map of named attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    attributes: BTreeMap<String, AttributeValue>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Numeric attribute, if present and numeric.
    pub fn number(&self, name: &str) -> Option<Amount> {
        match self.get(name) {
            Some(AttributeValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Text attribute, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(AttributeValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

/// A mutation applied to an existing (or implicitly created) item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// `SET attr = if_not_exists(attr, default) + amount`
    AddWithDefault {
        attribute: String,
        amount: Amount,
        default: Amount,
    },
    /// `SET attr = attr - amount`
    Subtract { attribute: String, amount: Amount },
}

/// What a [`WriteOp`] does to its item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Update(Update),
    /// Replace the whole item.
    Put(Item),
}

/// A precondition evaluated by the store at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `attribute_not_exists(attr)`; true for a missing item.
    AttributeNotExists(String),
    /// `attribute_exists(attr) AND attr >= value`
    AttributeAtLeast { attribute: String, value: Amount },
}

/// One operation of an atomic write set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub table: String,
    pub key: String,
    pub action: Action,
    pub condition: Option<Condition>,
}

/// Why a given operation of a cancelled transaction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationReason {
    /// This operation did not cause the cancellation.
    None,
    ConditionalCheckFailed,
    /// Another transaction touched the same item concurrently.
    TransactionConflict,
    Throttled,
    Other { code: String, message: String },
}

/// Store-native failures. These never leave the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The atomic write was rejected. `reasons` lines up with the submitted
    /// operations; an empty list means the store did not say which failed.
    #[error("transaction cancelled: {reasons:?}")]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    #[error("request timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("table {0} does not exist")]
    ResourceNotFound(String),

    #[error("table {0} already exists")]
    ResourceInUse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}
