//! Transaction processing engine.
//!
//! The engine applies credits and debits to user balances exactly once per
//! idempotency key. It holds no state of its own: every guarantee comes from
//! the store's atomic conditional write, so any number of clones may run
//! concurrently against the same store.

use std::sync::Arc;

use chrono::Utc;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::balance::BalanceLookup;
use crate::config::LedgerConfig;
use crate::model::{RawRequest, Receipt, ValidatedRequest};
use crate::store::StoreClient;
use crate::validate::validate;

mod classify;
pub use classify::{classify_cancellation, classify_store_error};

mod error;
pub use error::{AmountIssue, EngineError, ErrorClass, ValidationError};

mod write_set;
pub use write_set::{BALANCE_ATTR, BALANCE_OP, CREATED_AT_ATTR, MARKER_OP, write_set};

/// Counters returned by [`Engine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub applied: usize,
    pub rejected: usize,
}

/// The transaction engine.
pub struct Engine<S> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

/// Public API
impl<S: StoreClient> Engine<S> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(config))
    }

    pub fn from_shared(store: Arc<S>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Balance lookup sharing this engine's store and configuration.
    pub fn balances(&self) -> BalanceLookup<S> {
        BalanceLookup::from_shared(Arc::clone(&self.store), Arc::clone(&self.config))
    }

    /// Run the engine over a stream of requests, in order.
    pub async fn run(&self, mut stream: impl Stream<Item = RawRequest> + Unpin) -> RunStats {
        let mut stats = RunStats::default();
        while let Some(request) = stream.next().await {
            // a rejected request never stops the run
            match self.transact(request).await {
                Ok(_) => stats.applied += 1,
                Err(_) => stats.rejected += 1,
            }
        }
        stats
    }

    /// Validate a raw request, then execute it.
    pub async fn transact(&self, request: RawRequest) -> Result<Receipt, EngineError> {
        let validated = match validate(&request) {
            Ok(validated) => validated,
            Err(e) => {
                info!(
                    user = request.user_id.as_deref().unwrap_or_default(),
                    key = request.idempotent_key.as_deref().unwrap_or_default(),
                    reason = %e,
                    "transaction rejected"
                );
                return Err(e.into());
            }
        };
        self.execute(validated).await
    }

    /// Execute a validated request:
    /// - Fail fast if the idempotency record already exists
    /// - Submit the balance update and the marker insert as one atomic write
    /// - Translate a cancelled write into the engine's error taxonomy
    pub async fn execute(&self, request: ValidatedRequest) -> Result<Receipt, EngineError> {
        let result = self.execute_inner(&request).await;
        Self::log_result(&request, &result);
        result
    }
}

/// Private API
impl<S: StoreClient> Engine<S> {
    async fn execute_inner(&self, request: &ValidatedRequest) -> Result<Receipt, EngineError> {
        // The pre-check only narrows the race window; the marker's condition
        // in the atomic write is what guarantees exactly-once.
        let marker_key = self.config.idempotency_key(&request.idempotent_key);
        let existing = self
            .store
            .point_read(&self.config.idempotency_table, &marker_key)
            .await
            .map_err(|e| classify_store_error(e, request))?;
        if existing.is_some() {
            return Err(EngineError::AlreadyProcessed {
                key: request.idempotent_key.clone(),
            });
        }

        let created_at = Utc::now();
        let ops = write_set(&self.config, request, created_at);
        self.store
            .transact_write(ops)
            .await
            .map_err(|e| classify_store_error(e, request))?;

        Ok(Receipt {
            user_id: request.user_id.clone(),
            amount: request.amount,
            kind: request.kind,
            idempotent_key: request.idempotent_key.clone(),
            created_at,
        })
    }

    /// Small helper to log `execute` results
    fn log_result(request: &ValidatedRequest, result: &Result<Receipt, EngineError>) {
        match result {
            Ok(_) => info!(
                user = %request.user_id,
                key = %request.idempotent_key,
                amount = %request.amount,
                "{} applied",
                request.kind
            ),
            Err(e) if e.class() == ErrorClass::Infrastructure => warn!(
                user = %request.user_id,
                key = %request.idempotent_key,
                amount = %request.amount,
                reason = %e,
                "{} failed",
                request.kind
            ),
            Err(e) => info!(
                user = %request.user_id,
                key = %request.idempotent_key,
                amount = %request.amount,
                reason = %e,
                "{} rejected",
                request.kind
            ),
        }
    }
}
