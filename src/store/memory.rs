//! In-memory store implementation.
//!
//! Used by the batch runner, tests and benchmarks. Every transaction runs
//! under one write lock, so condition checks and mutations see a single
//! consistent snapshot and transactions are serializable.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    Action, AttributeValue, CancellationReason, Condition, Item, PK_ATTR, StoreClient, StoreError,
    Update, WriteOp,
};
use crate::config::LedgerConfig;

/// Largest number of operations accepted by one `transact_write`.
pub const MAX_TRANSACT_ITEMS: usize = 100;

type Table = HashMap<String, Item>;

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    /// Create a store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the ledger's two tables already provisioned.
    pub async fn provisioned(config: &LedgerConfig) -> Self {
        let store = Self::new();
        store.provision(config).await;
        store
    }

    /// Create an empty table.
    pub async fn create_table(&self, name: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(name) {
            return Err(StoreError::ResourceInUse(name.to_string()));
        }
        tables.insert(name.to_string(), Table::new());
        Ok(())
    }

    /// Make sure the ledger tables exist. Existing tables are left alone.
    pub async fn provision(&self, config: &LedgerConfig) {
        for table in [&config.user_table, &config.idempotency_table] {
            match self.create_table(table).await {
                Ok(()) => info!(table = %table, "table created"),
                Err(_) => info!(table = %table, "table already exists"),
            }
        }
    }

    /// Number of items in a table, `None` if the table does not exist.
    pub async fn item_count(&self, table: &str) -> Option<usize> {
        self.tables.read().await.get(table).map(HashMap::len)
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn point_read(&self, table: &str, key: &str) -> Result<Option<Item>, StoreError> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table)
            .ok_or_else(|| StoreError::ResourceNotFound(table.to_string()))?;
        Ok(table.get(key).cloned())
    }

    async fn transact_write(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() || ops.len() > MAX_TRANSACT_ITEMS {
            return Err(StoreError::InvalidRequest(format!(
                "transaction must contain 1 to {MAX_TRANSACT_ITEMS} operations, got {}",
                ops.len()
            )));
        }

        let mut seen = HashSet::new();
        for op in &ops {
            if !seen.insert((op.table.as_str(), op.key.as_str())) {
                return Err(StoreError::InvalidRequest(format!(
                    "multiple operations on item {} in {}",
                    op.key, op.table
                )));
            }
        }

        let mut tables = self.tables.write().await;

        for op in &ops {
            if !tables.contains_key(&op.table) {
                return Err(StoreError::ResourceNotFound(op.table.clone()));
            }
        }

        // Evaluate every operation against the current snapshot before
        // touching anything.
        let mut reasons = Vec::with_capacity(ops.len());
        let mut staged = Vec::with_capacity(ops.len());
        for op in &ops {
            let current = tables.get(&op.table).and_then(|t| t.get(&op.key));
            let passed = op
                .condition
                .as_ref()
                .is_none_or(|condition| holds(condition, current));
            if !passed {
                reasons.push(CancellationReason::ConditionalCheckFailed);
                continue;
            }
            match apply(op, current) {
                Ok(item) => {
                    reasons.push(CancellationReason::None);
                    staged.push(item);
                }
                Err(message) => reasons.push(CancellationReason::Other {
                    code: "ValidationError".to_string(),
                    message,
                }),
            }
        }

        if reasons.iter().any(|r| *r != CancellationReason::None) {
            debug!(?reasons, "transaction cancelled");
            return Err(StoreError::TransactionCanceled { reasons });
        }

        for (op, item) in ops.into_iter().zip(staged) {
            if let Some(table) = tables.get_mut(&op.table) {
                table.insert(op.key, item);
            }
        }
        Ok(())
    }
}

fn holds(condition: &Condition, current: Option<&Item>) -> bool {
    match condition {
        Condition::AttributeNotExists(attribute) => {
            current.is_none_or(|item| !item.contains(attribute))
        }
        Condition::AttributeAtLeast { attribute, value } => current
            .and_then(|item| item.number(attribute))
            .is_some_and(|n| n >= *value),
    }
}

/// Compute the item that results from applying `op`.
fn apply(op: &WriteOp, current: Option<&Item>) -> Result<Item, String> {
    match &op.action {
        Action::Put(item) => {
            Ok(item.clone().with(PK_ATTR, AttributeValue::Text(op.key.clone())))
        }
        Action::Update(update) => {
            let mut item = current
                .cloned()
                .unwrap_or_else(|| Item::new().with(PK_ATTR, AttributeValue::Text(op.key.clone())));
            let (attribute, value) = match update {
                Update::AddWithDefault {
                    attribute,
                    amount,
                    default,
                } => {
                    let base = match item.get(attribute) {
                        None => *default,
                        Some(AttributeValue::Number(n)) => *n,
                        Some(AttributeValue::Text(_)) => {
                            return Err(format!("attribute {attribute} is not a number"));
                        }
                    };
                    let sum = base
                        .checked_add(*amount)
                        .ok_or_else(|| format!("attribute {attribute} cannot hold the exact result"))?;
                    (attribute, sum)
                }
                Update::Subtract { attribute, amount } => {
                    let base = item
                        .number(attribute)
                        .ok_or_else(|| format!("attribute {attribute} is missing or not a number"))?;
                    let difference = base
                        .checked_sub(*amount)
                        .ok_or_else(|| format!("attribute {attribute} cannot hold the exact result"))?;
                    (attribute, difference)
                }
            };
            item.set(attribute.clone(), AttributeValue::Number(value));
            Ok(item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;

    const T: &str = "T";

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table(T).await.unwrap();
        store
    }

    fn add(key: &str, amount: i64) -> WriteOp {
        WriteOp {
            table: T.to_string(),
            key: key.to_string(),
            action: Action::Update(Update::AddWithDefault {
                attribute: "n".to_string(),
                amount: Amount::from_units(amount),
                default: Amount::from_units(100),
            }),
            condition: None,
        }
    }

    fn subtract_guarded(key: &str, amount: i64) -> WriteOp {
        WriteOp {
            table: T.to_string(),
            key: key.to_string(),
            action: Action::Update(Update::Subtract {
                attribute: "n".to_string(),
                amount: Amount::from_units(amount),
            }),
            condition: Some(Condition::AttributeAtLeast {
                attribute: "n".to_string(),
                value: Amount::from_units(amount),
            }),
        }
    }

    fn insert_once(key: &str) -> WriteOp {
        WriteOp {
            table: T.to_string(),
            key: key.to_string(),
            action: Action::Put(Item::new().with("v", AttributeValue::Text("x".to_string()))),
            condition: Some(Condition::AttributeNotExists(PK_ATTR.to_string())),
        }
    }

    async fn number(store: &MemoryStore, key: &str) -> Option<Amount> {
        store
            .point_read(T, key)
            .await
            .unwrap()
            .and_then(|item| item.number("n"))
    }

    #[tokio::test]
    async fn create_table_twice_reports_in_use() {
        let store = store().await;
        assert_eq!(
            store.create_table(T).await,
            Err(StoreError::ResourceInUse(T.to_string()))
        );
    }

    #[tokio::test]
    async fn provision_is_repeatable() {
        let config = LedgerConfig::default();
        let store = MemoryStore::provisioned(&config).await;
        store.provision(&config).await;
        assert_eq!(store.item_count(&config.user_table).await, Some(0));
        assert_eq!(store.item_count(&config.idempotency_table).await, Some(0));
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let store = MemoryStore::new();
        assert_eq!(
            store.point_read("nope", "k").await,
            Err(StoreError::ResourceNotFound("nope".to_string()))
        );
        assert_eq!(
            store.transact_write(vec![add("k", 1)]).await,
            Err(StoreError::ResourceNotFound(T.to_string()))
        );
    }

    #[tokio::test]
    async fn add_with_default_initializes_missing_item() {
        let store = store().await;
        store.transact_write(vec![add("k", 50)]).await.unwrap();
        assert_eq!(number(&store, "k").await, Some(Amount::from_units(150)));

        store.transact_write(vec![add("k", 5)]).await.unwrap();
        assert_eq!(number(&store, "k").await, Some(Amount::from_units(155)));

        let item = store.point_read(T, "k").await.unwrap().unwrap();
        assert_eq!(item.text(PK_ATTR), Some("k"));
    }

    #[tokio::test]
    async fn guarded_subtract_fails_on_missing_item() {
        let store = store().await;
        let result = store.transact_write(vec![subtract_guarded("k", 1)]).await;
        assert_eq!(
            result,
            Err(StoreError::TransactionCanceled {
                reasons: vec![CancellationReason::ConditionalCheckFailed]
            })
        );
        assert_eq!(store.item_count(T).await, Some(0));
    }

    #[tokio::test]
    async fn failed_condition_cancels_whole_set() {
        let store = store().await;
        store.transact_write(vec![add("a", 0)]).await.unwrap();

        let result = store
            .transact_write(vec![subtract_guarded("a", 500), insert_once("m")])
            .await;
        assert_eq!(
            result,
            Err(StoreError::TransactionCanceled {
                reasons: vec![
                    CancellationReason::ConditionalCheckFailed,
                    CancellationReason::None
                ]
            })
        );
        assert_eq!(number(&store, "a").await, Some(Amount::from_units(100)));
        assert_eq!(store.point_read(T, "m").await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_once_rejects_second_insert() {
        let store = store().await;
        store.transact_write(vec![insert_once("m")]).await.unwrap();
        let result = store
            .transact_write(vec![add("a", 1), insert_once("m")])
            .await;
        assert_eq!(
            result,
            Err(StoreError::TransactionCanceled {
                reasons: vec![
                    CancellationReason::None,
                    CancellationReason::ConditionalCheckFailed
                ]
            })
        );
        assert_eq!(number(&store, "a").await, None);
    }

    #[tokio::test]
    async fn type_mismatch_cancels_with_validation_reason() {
        let store = store().await;
        let put_text = WriteOp {
            table: T.to_string(),
            key: "a".to_string(),
            action: Action::Put(Item::new().with("n", AttributeValue::Text("x".to_string()))),
            condition: None,
        };
        store.transact_write(vec![put_text]).await.unwrap();

        let result = store.transact_write(vec![add("a", 1)]).await;
        assert!(matches!(
            result,
            Err(StoreError::TransactionCanceled { ref reasons })
                if matches!(reasons[..], [CancellationReason::Other { ref code, .. }] if code == "ValidationError")
        ));
    }

    #[tokio::test]
    async fn inexact_result_cancels_with_validation_reason() {
        let store = store().await;
        let mut huge = add("a", 0);
        if let Action::Update(Update::AddWithDefault { amount, .. }) = &mut huge.action {
            *amount = Amount::from(rust_decimal::Decimal::MAX);
        }

        let result = store.transact_write(vec![huge, insert_once("m")]).await;
        assert!(matches!(
            result,
            Err(StoreError::TransactionCanceled { ref reasons })
                if matches!(
                    reasons[..],
                    [CancellationReason::Other { ref code, .. }, CancellationReason::None]
                        if code == "ValidationError"
                )
        ));
        assert_eq!(store.item_count(T).await, Some(0));
    }

    #[tokio::test]
    async fn rejects_empty_oversized_and_duplicate_sets() {
        let store = store().await;
        assert!(matches!(
            store.transact_write(Vec::new()).await,
            Err(StoreError::InvalidRequest(_))
        ));

        let oversized = (0..=MAX_TRANSACT_ITEMS)
            .map(|i| add(&i.to_string(), 1))
            .collect();
        assert!(matches!(
            store.transact_write(oversized).await,
            Err(StoreError::InvalidRequest(_))
        ));

        assert!(matches!(
            store.transact_write(vec![add("a", 1), add("a", 2)]).await,
            Err(StoreError::InvalidRequest(_))
        ));
        assert_eq!(store.item_count(T).await, Some(0));
    }
}
