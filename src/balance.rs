//! Read-only balance lookup.

use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::Amount;
use crate::config::LedgerConfig;
use crate::engine::BALANCE_ATTR;
use crate::store::{StoreClient, StoreError};

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("invalid userId: must be a non-empty string")]
    InvalidUserId,

    #[error("could not retrieve balance for user {user_id}: {source}")]
    Retrieval {
        user_id: String,
        #[source]
        source: StoreError,
    },
}

/// Point reads of user balances, falling back to the configured default for
/// users that were never written.
pub struct BalanceLookup<S> {
    store: Arc<S>,
    config: Arc<LedgerConfig>,
}

impl<S: StoreClient> BalanceLookup<S> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(config))
    }

    pub fn from_shared(store: Arc<S>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<Amount, BalanceError> {
        if user_id.trim().is_empty() {
            return Err(BalanceError::InvalidUserId);
        }

        let item = self
            .store
            .point_read(&self.config.user_table, &self.config.user_key(user_id))
            .await
            .map_err(|source| {
                error!(user = user_id, reason = %source, "failed to retrieve user balance");
                BalanceError::Retrieval {
                    user_id: user_id.to_string(),
                    source,
                }
            })?;

        Ok(item
            .and_then(|item| item.number(BALANCE_ATTR))
            .unwrap_or(self.config.default_balance))
    }
}
