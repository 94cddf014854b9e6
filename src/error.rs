use thiserror::Error;

/// Main error type for the balance monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Price lookup error: {0}")]
    Price(#[from] PriceError),
}

/// Provider (JSON-RPC) errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RPC method error: code={code}, message={message}")]
    Method { code: i64, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Provider returned HTTP {status}")]
    Status { status: u16 },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("Blocking store task failed: {0}")]
    Task(String),

    #[error("Corrupt value for key {key}: {value}")]
    CorruptValue { key: String, value: String },

    #[error("Unsupported store URL: {0}")]
    UnsupportedUrl(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parsing failed: {0}")]
    Parsing(String),

    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
}

/// Wallet registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read wallet file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed wallet file {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Webhook delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Price API errors
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Price missing for asset {0}")]
    Missing(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Errors that stop the process
    Critical,
    /// Errors that lose data for a wallet on this tick
    High,
    /// Transient errors that are expected to clear on their own
    Medium,
    /// Informational
    Low,
}

impl MonitorError {
    /// Get the severity level of an error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            MonitorError::Config(_) => ErrorSeverity::Critical,
            MonitorError::Registry(_) => ErrorSeverity::Critical,
            MonitorError::Store(StoreError::UnsupportedUrl(_)) => ErrorSeverity::Critical,

            MonitorError::Store(_) => ErrorSeverity::High,
            MonitorError::Notify(_) => ErrorSeverity::High,
            MonitorError::Rpc(RpcError::Method { .. }) => ErrorSeverity::High,

            MonitorError::Rpc(_) => ErrorSeverity::Medium,

            MonitorError::Price(_) => ErrorSeverity::Low,
        }
    }

    /// Check if the error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            MonitorError::Rpc(RpcError::Timeout { .. }) => true,
            MonitorError::Rpc(RpcError::RateLimit) => true,
            MonitorError::Rpc(RpcError::Connection(_)) => true,
            MonitorError::Rpc(RpcError::Http(_)) => true,
            MonitorError::Rpc(RpcError::Status { status }) => *status >= 500,
            MonitorError::Store(StoreError::Lock(_)) => true,
            MonitorError::Store(StoreError::Redis(e)) => e.is_io_error() || e.is_timeout(),

            _ => false,
        }
    }
}
