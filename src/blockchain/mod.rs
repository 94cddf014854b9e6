pub mod balance_monitor;
pub mod change_detector;
pub mod rpc_client;

pub use balance_monitor::{BalanceMonitor, BalanceMonitorConfig, ConcurrencyPolicy, TickSummary};
pub use change_detector::{ChangeDetector, CheckOutcome};
pub use rpc_client::{ChainReader, ProviderClient, DEFAULT_TRANSACTION_LIMIT};
