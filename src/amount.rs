use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

/// Exact decimal amount.
///
/// Holds up to 28 significant digits with no rounding: a value that cannot be
/// represented exactly is refused rather than approximated, and arithmetic
/// whose exact result does not fit fails instead of rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Convert a float through its shortest round-trip decimal form, so `0.1`
    /// becomes exactly `0.1`. Refuses NaN and infinities, and values needing
    /// more digits than an [`Amount`] holds.
    pub fn try_from_float(value: f64) -> Result<Self, ParseAmountError> {
        if !value.is_finite() {
            return Err(ParseAmountError::NotANumber(value.to_string()));
        }
        // f64's Display never uses exponent notation
        let text = value.to_string();
        Decimal::from_str_exact(&text)
            .map(Amount)
            .map_err(|_| ParseAmountError::Unrepresentable(text))
    }

    pub fn from_units(units: i64) -> Self {
        Amount(Decimal::from(units))
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Exact addition. `None` on overflow or when the sum would need rounding.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        exact(self.0.checked_add(rhs.0)?, self.0, rhs.0)
    }

    /// Exact subtraction. `None` on overflow or when the difference would
    /// need rounding.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        exact(self.0.checked_sub(rhs.0)?, self.0, rhs.0)
    }
}

// Decimal arithmetic keeps the larger operand scale unless it had to round,
// so a smaller result scale means digits were dropped.
fn exact(result: Decimal, lhs: Decimal, rhs: Decimal) -> Option<Amount> {
    (result.scale() >= lhs.scale().max(rhs.scale())).then_some(Amount(result))
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Error returned when a value cannot become an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("'{0}' is not a finite number")]
    NotANumber(String),

    #[error("'{0}' cannot be held exactly in 28 significant digits")]
    Unrepresentable(String),
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Accepts plain (`12.50`) and scientific (`1.5e3`) notation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let is_number = text.parse::<f64>().is_ok_and(f64::is_finite);
        if !is_number {
            return Err(ParseAmountError::NotANumber(s.to_string()));
        }
        let parsed = if text.contains(['e', 'E']) {
            exact_scientific(text)
        } else {
            Decimal::from_str_exact(text).ok()
        };
        parsed
            .map(Amount)
            .ok_or_else(|| ParseAmountError::Unrepresentable(text.to_string()))
    }
}

/// `<mantissa>e<exponent>` without rounding the mantissa or the result.
fn exact_scientific(text: &str) -> Option<Decimal> {
    let (mantissa, exponent) = text.split_once(['e', 'E'])?;
    let mut value = Decimal::from_str_exact(mantissa).ok()?;
    let exponent: i64 = exponent.parse().ok()?;
    let scale = i64::from(value.scale()).checked_sub(exponent)?;
    if scale >= 0 {
        value.set_scale(u32::try_from(scale).ok()?).ok()?;
        return Some(value);
    }
    // integer times a power of ten: either exact or overflowing
    let factor = 10i128.checked_pow(u32::try_from(-scale).ok()?)?;
    value.set_scale(0).ok()?;
    value.checked_mul(Decimal::try_from_i128_with_scale(factor, 0).ok()?)
}
