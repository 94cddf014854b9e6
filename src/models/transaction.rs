use serde::{Deserialize, Serialize};

/// Transaction as returned by the provider's `getTransactions`.
/// Only the fields the monitor needs are modelled; the rest is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    /// Unix time of the transaction
    pub utime: u64,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub fee: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionId {
    pub lt: String,
    pub hash: String,
}

impl TransactionRecord {
    pub fn at(utime: u64) -> Self {
        Self {
            utime,
            transaction_id: None,
            fee: None,
        }
    }
}

/// Latest `utime` among the records, 0 when there are none.
/// Equal timestamps of distinct transactions are indistinguishable here.
pub fn latest_utime(transactions: &[TransactionRecord]) -> u64 {
    transactions.iter().map(|tx| tx.utime).max().unwrap_or(0)
}
