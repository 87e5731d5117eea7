//! Request validation.
//!
//! Runs before any store access. Rules are checked in a fixed order so the
//! first malformed field decides the error.

use crate::amount::{Amount, ParseAmountError};
use crate::engine::{AmountIssue, ValidationError};
use crate::model::{RawAmount, RawRequest, TransactionKind, ValidatedRequest};

/// Validate a raw request, producing a normalized copy with a parsed amount.
pub fn validate(request: &RawRequest) -> Result<ValidatedRequest, ValidationError> {
    let idempotent_key = non_blank(request.idempotent_key.as_deref())
        .ok_or(ValidationError::InvalidIdempotencyKey)?;

    let user_id = non_blank(request.user_id.as_deref()).ok_or(ValidationError::InvalidUserId)?;

    let amount = parse_amount(request.amount.as_ref()).map_err(|reason| {
        ValidationError::InvalidAmount {
            value: describe(request.amount.as_ref()),
            reason,
        }
    })?;

    let kind = request
        .kind
        .as_deref()
        .and_then(|kind| kind.parse::<TransactionKind>().ok())
        .ok_or_else(|| {
            ValidationError::InvalidTransactionType(request.kind.clone().unwrap_or_default())
        })?;

    Ok(ValidatedRequest {
        user_id: user_id.to_string(),
        amount,
        kind,
        idempotent_key: idempotent_key.to_string(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse to a strictly positive amount, exactly as supplied. Text is read
/// as written, so `"0.00015"` stays `0.00015`.
fn parse_amount(raw: Option<&RawAmount>) -> Result<Amount, AmountIssue> {
    let parsed = match raw {
        None => return Err(AmountIssue::NotANumber),
        Some(RawAmount::Number(n)) => Amount::try_from_float(*n),
        Some(RawAmount::Text(s)) => s.parse::<Amount>(),
    };
    let amount = parsed.map_err(|e| match e {
        ParseAmountError::NotANumber(_) => AmountIssue::NotANumber,
        ParseAmountError::Unrepresentable(_) => AmountIssue::Inexact,
    })?;
    if !amount.is_positive() {
        return Err(AmountIssue::NotPositive);
    }
    Ok(amount)
}

fn describe(raw: Option<&RawAmount>) -> String {
    match raw {
        None => "missing".to_string(),
        Some(RawAmount::Number(n)) => n.to_string(),
        Some(RawAmount::Text(s)) => format!("'{s}'"),
    }
}
