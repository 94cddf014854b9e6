pub mod balance;
pub mod event;
pub mod transaction;
pub mod wallet;

pub use balance::{balance_change, nano_to_decimal, parse_balance, BalanceError, NANO_DECIMALS};
pub use event::ChangeEvent;
pub use transaction::{latest_utime, TransactionId, TransactionRecord};
pub use wallet::{AddressRegistry, WalletEntry};
