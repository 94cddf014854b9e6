pub mod api;
pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;

pub use blockchain::{BalanceMonitor, ChangeDetector, ProviderClient};
pub use config::{AppConfig, LoggingConfig, MonitorConfig, NotifierConfig, PriceConfig, ProviderConfig, StoreConfig};
pub use database::{open_store, StateStore};
pub use error::{MonitorError, Result};
pub use logging::{ErrorLogger, LogContext, MetricsLogger, PerformanceMonitor};
pub use retry::{RetryConfig, RetryManager};
