use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub price: PriceConfig,
    pub notifier: NotifierConfig,
    pub store: StoreConfig,
    pub monitor: MonitorConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

/// RPC provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// toncenter JSON-RPC endpoint URL
    pub endpoint: String,
    /// API key sent as X-API-Key
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Price API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceConfig {
    /// Base URL of a coingecko-compatible API
    pub endpoint: String,
    /// Asset identifier in the price API
    pub asset_id: String,
    pub timeout_seconds: u64,
}

/// Webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Base URL; the operation is selected with a `method` query parameter
    pub base_url: Option<String>,
    /// Whether balance changes are posted at all
    pub send_balance_changes: bool,
    /// Health check interval in seconds, 0 disables it
    pub health_check_interval_seconds: u64,
    pub timeout_seconds: u64,
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// memory://, sqlite://<path> or redis://...; unset means in-memory
    pub url: Option<String>,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Balance check interval in seconds
    pub interval_seconds: u64,
    /// JSON file mapping user id to wallet address
    pub wallets_file: String,
    /// Wallets processed concurrently within one pass
    pub max_in_flight: usize,
    /// Pause between launching consecutive wallet checks, in milliseconds
    pub spacing_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://toncenter.com/api/v2/jsonRPC".to_string(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.coingecko.com/api/v3".to_string(),
            asset_id: "the-open-network".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            send_balance_changes: false,
            health_check_interval_seconds: 60,
            timeout_seconds: 15,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 10,
            wallets_file: "wallets.json".to_string(),
            max_in_flight: 1,
            spacing_ms: 1_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Same as `load`, reading the given TOML file
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load_from_file(config_path: &str) -> Result<Self, ConfigError> {
        if !Path::new(config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Provider
        if let Ok(endpoint) = env::var("TONCENTER_RPC_URL") {
            self.provider.endpoint = endpoint;
        }
        if let Ok(api_key) = env::var("TONCENTER_API_MAINNET_KEY") {
            if !api_key.trim().is_empty() {
                self.provider.api_key = Some(api_key);
            }
        }

        // Price
        if let Ok(endpoint) = env::var("PRICE_API_URL") {
            self.price.endpoint = endpoint;
        }

        // Notifier
        if let Ok(url) = env::var("GVND_API_URL") {
            if !url.trim().is_empty() {
                self.notifier.base_url = Some(url);
            }
        }
        if let Ok(flag) = env::var("SAVE_BALANCE_CHANGE") {
            self.notifier.send_balance_changes = flag == "true";
        }
        if let Ok(interval) = env::var("HEALTH_CHECK_INTERVAL") {
            self.notifier.health_check_interval_seconds = parse_env("HEALTH_CHECK_INTERVAL", interval)?;
        }

        // Store
        if let Ok(url) = env::var("STORE_URL").or_else(|_| env::var("REDIS_URL")) {
            if !url.trim().is_empty() {
                self.store.url = Some(url);
            }
        }

        // Monitor
        if let Ok(interval) = env::var("MONITOR_INTERVAL") {
            self.monitor.interval_seconds = parse_env("MONITOR_INTERVAL", interval)?;
        }
        if let Ok(path) = env::var("WALLETS_FILE") {
            self.monitor.wallets_file = path;
        }
        if let Ok(max_in_flight) = env::var("MONITOR_MAX_IN_FLIGHT") {
            self.monitor.max_in_flight = parse_env("MONITOR_MAX_IN_FLIGHT", max_in_flight)?;
        }
        if let Ok(spacing) = env::var("MONITOR_SPACING_MS") {
            self.monitor.spacing_ms = parse_env("MONITOR_SPACING_MS", spacing)?;
        }

        // Logging
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url(&self.provider.endpoint)?;
        validate_url(&self.price.endpoint)?;
        if let Some(base_url) = &self.notifier.base_url {
            validate_url(base_url)?;
        }

        if self.provider.timeout_seconds == 0 || self.provider.timeout_seconds > 300 {
            return Err(invalid("provider.timeout_seconds", self.provider.timeout_seconds));
        }

        if self.monitor.interval_seconds == 0 || self.monitor.interval_seconds > 3600 {
            return Err(invalid("monitor.interval_seconds", self.monitor.interval_seconds));
        }

        if self.monitor.max_in_flight == 0 {
            return Err(invalid("monitor.max_in_flight", self.monitor.max_in_flight));
        }

        if self.monitor.wallets_file.trim().is_empty() {
            return Err(invalid("monitor.wallets_file", &self.monitor.wallets_file));
        }

        if self.retry.max_attempts == 0 || self.retry.max_attempts > 10 {
            return Err(invalid("retry.max_attempts", self.retry.max_attempts));
        }

        if self.notifier.send_balance_changes && self.notifier.base_url.is_none() {
            return Err(ConfigError::MissingEnvVar("GVND_API_URL".to_string()));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level", &self.logging.level));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(invalid("logging.format", &self.logging.format));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider.endpoint, "https://toncenter.com/api/v2/jsonRPC");
        assert_eq!(config.price.asset_id, "the-open-network");
        assert_eq!(config.monitor.interval_seconds, 10);
        assert_eq!(config.monitor.wallets_file, "wallets.json");
        assert!(!config.notifier.send_balance_changes);
        assert!(config.store.url.is_none());
        assert_eq!(config.retry, RetryConfig::for_provider());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.provider.endpoint = "invalid-url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        config = AppConfig::default();
        config.monitor.interval_seconds = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.monitor.max_in_flight = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.notifier.send_balance_changes = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingEnvVar(_))));

        config.notifier.base_url = Some("https://hooks.example.com/api".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("MONITOR_INTERVAL", "30");
        env::set_var("SAVE_BALANCE_CHANGE", "true");
        env::set_var("TONCENTER_API_MAINNET_KEY", "secret");
        env::set_var("GVND_API_URL", "https://hooks.example.com/api");
        env::set_var("REDIS_URL", "redis://127.0.0.1:6379");

        let mut config = AppConfig::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.monitor.interval_seconds, 30);
        assert!(config.notifier.send_balance_changes);
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.notifier.base_url.as_deref(), Some("https://hooks.example.com/api"));
        assert_eq!(config.store.url.as_deref(), Some("redis://127.0.0.1:6379"));

        env::remove_var("MONITOR_INTERVAL");
        env::remove_var("SAVE_BALANCE_CHANGE");
        env::remove_var("TONCENTER_API_MAINNET_KEY");
        env::remove_var("GVND_API_URL");
        env::remove_var("REDIS_URL");
    }

    #[test]
    #[serial]
    fn test_notifications_flag_requires_exact_true() {
        env::set_var("SAVE_BALANCE_CHANGE", "yes");

        let mut config = AppConfig::default();
        config.notifier.send_balance_changes = true;
        config.apply_env_overrides().unwrap();
        assert!(!config.notifier.send_balance_changes);

        env::remove_var("SAVE_BALANCE_CHANGE");
    }

    #[test]
    #[serial]
    fn test_invalid_env_values() {
        env::set_var("MONITOR_INTERVAL", "soon");

        let mut config = AppConfig::default();
        let result = config.apply_env_overrides();

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        env::remove_var("MONITOR_INTERVAL");
    }

    #[test]
    fn test_config_file_loading() {
        let config_content = r#"
[provider]
endpoint = "https://testnet.toncenter.com/api/v2/jsonRPC"
timeout_seconds = 20

[notifier]
base_url = "https://hooks.example.com/api"
send_balance_changes = true
health_check_interval_seconds = 120

[store]
url = "sqlite://state.db"

[monitor]
interval_seconds = 30
max_in_flight = 4
spacing_ms = 250

[retry]
max_attempts = 3
initial_delay_ms = 500
max_delay_ms = 4000
backoff_multiplier = 2.0
jitter = true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut temp_file, config_content.as_bytes()).unwrap();

        let config = AppConfig::load_from_file(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.provider.endpoint, "https://testnet.toncenter.com/api/v2/jsonRPC");
        assert_eq!(config.provider.timeout_seconds, 20);
        assert!(config.notifier.send_balance_changes);
        assert_eq!(config.notifier.health_check_interval_seconds, 120);
        assert_eq!(config.store.url.as_deref(), Some("sqlite://state.db"));
        assert_eq!(config.monitor.interval_seconds, 30);
        assert_eq!(config.monitor.max_in_flight, 4);
        assert_eq!(config.monitor.wallets_file, "wallets.json");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/monitor.toml").unwrap();
        assert_eq!(config.monitor.interval_seconds, 10);
    }

    #[test]
    fn test_generate_sample_config() {
        let sample = AppConfig::generate_sample_config().unwrap();
        assert!(sample.contains("[provider]"));
        assert!(sample.contains("[monitor]"));
        assert!(sample.contains("[retry]"));

        let parsed: AppConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.provider.endpoint, AppConfig::default().provider.endpoint);
    }
}
