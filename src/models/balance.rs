use rust_decimal::Decimal;
use std::str::FromStr;

/// Fractional digits between nanoton and TON
pub const NANO_DECIMALS: u32 = 9;

/// Convert a smallest-unit integer (nanoton) to a display decimal
pub fn nano_to_decimal(nano: &str) -> Result<Decimal, BalanceError> {
    let trimmed = nano.trim();
    let value: i128 = trimmed
        .parse()
        .map_err(|_| BalanceError::InvalidInteger(nano.to_string()))?;

    if value < 0 {
        return Err(BalanceError::Negative(nano.to_string()));
    }

    Decimal::try_from_i128_with_scale(value, NANO_DECIMALS)
        .map(|d| d.normalize())
        .map_err(|_| BalanceError::Overflow(nano.to_string()))
}

/// Parse a stored balance, e.g. "5.25"
pub fn parse_balance(value: &str) -> Result<Decimal, BalanceError> {
    Decimal::from_str(value.trim()).map_err(|_| BalanceError::InvalidDecimal(value.to_string()))
}

/// Signed difference `current - previous`
pub fn balance_change(current: Decimal, previous: Decimal) -> Decimal {
    (current - previous).normalize()
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum BalanceError {
    #[error("Invalid smallest-unit integer: {0}")]
    InvalidInteger(String),
    #[error("Negative balance: {0}")]
    Negative(String),
    #[error("Balance out of range: {0}")]
    Overflow(String),
    #[error("Invalid decimal format: {0}")]
    InvalidDecimal(String),
}
