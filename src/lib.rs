pub mod amount;
pub mod balance;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod store;
pub mod validate;

pub use amount::Amount;
pub use balance::{BalanceError, BalanceLookup};
pub use config::LedgerConfig;
pub use engine::{Engine, EngineError, ValidationError};
pub use model::{RawAmount, RawRequest, Receipt, TransactionKind, ValidatedRequest};
pub use store::{MemoryStore, StoreClient};
