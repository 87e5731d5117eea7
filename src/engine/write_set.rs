//! Shaping of the two-operation atomic write.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::LedgerConfig;
use crate::model::{TransactionKind, ValidatedRequest};
use crate::store::{Action, AttributeValue, Condition, Item, PK_ATTR, Update, WriteOp};

/// Position of the balance update in the write set.
pub const BALANCE_OP: usize = 0;
/// Position of the idempotency marker insert in the write set.
pub const MARKER_OP: usize = 1;

pub const BALANCE_ATTR: &str = "balance";
pub const CREATED_AT_ATTR: &str = "createdAt";

/// Build the balance update and the idempotency marker for `request`.
///
/// Credits start from the configured default when the balance is absent and
/// carry no condition. Debits require an existing balance of at least the
/// amount. The marker may only be inserted once.
pub fn write_set(
    config: &LedgerConfig,
    request: &ValidatedRequest,
    created_at: DateTime<Utc>,
) -> Vec<WriteOp> {
    let (update, condition) = match request.kind {
        TransactionKind::Credit => (
            Update::AddWithDefault {
                attribute: BALANCE_ATTR.to_string(),
                amount: request.amount,
                default: config.default_balance,
            },
            None,
        ),
        TransactionKind::Debit => (
            Update::Subtract {
                attribute: BALANCE_ATTR.to_string(),
                amount: request.amount,
            },
            Some(Condition::AttributeAtLeast {
                attribute: BALANCE_ATTR.to_string(),
                value: request.amount,
            }),
        ),
    };

    let balance = WriteOp {
        table: config.user_table.clone(),
        key: config.user_key(&request.user_id),
        action: Action::Update(update),
        condition,
    };

    let marker = WriteOp {
        table: config.idempotency_table.clone(),
        key: config.idempotency_key(&request.idempotent_key),
        action: Action::Put(idempotency_record(created_at)),
        condition: Some(Condition::AttributeNotExists(PK_ATTR.to_string())),
    };

    vec![balance, marker]
}

/// Attributes of a fresh idempotency record (the key is added by the store).
fn idempotency_record(created_at: DateTime<Utc>) -> Item {
    Item::new().with(
        CREATED_AT_ATTR,
        AttributeValue::Text(created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    )
}
