use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance change sent to the webhook. Built once per detected change, never persisted.
///
/// `balance` goes out as a decimal string, `change` and `price` as JSON numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub user_id: String,
    pub wallet_address: String,
    /// Signed delta, current - previous
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    /// Balance after the change
    pub balance: Decimal,
    pub tx_timestamp: u64,
    /// USD price of the native asset, 0 when unavailable
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}
