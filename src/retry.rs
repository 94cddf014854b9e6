use std::time::Duration;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use crate::error::MonitorError;
use crate::logging::{LogContext, ErrorLogger, PerformanceMonitor};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt; 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,
    /// Add up to 5% jitter in either direction
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::for_provider()
    }
}

impl RetryConfig {
    /// One retry after a fixed two second pause
    pub fn for_provider() -> Self {
        Self {
            max_attempts: 2,
            initial_delay_ms: 2_000,
            max_delay_ms: 2_000,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Single attempt, used for calls that must never be repeated
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Bounded retry with optional exponential backoff
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
    operation_name: String,
}

impl RetryManager {
    pub fn new(operation_name: &str, config: RetryConfig) -> Self {
        Self {
            config,
            operation_name: operation_name.to_string(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, MonitorError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, MonitorError>>,
    {
        let monitor = PerformanceMonitor::new(&format!("retry_{}", self.operation_name));
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        ErrorLogger::log_recovery_success(&self.operation_name, attempt, monitor.elapsed_ms());
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_recoverable() {
                        let context = LogContext::new("retry", &self.operation_name)
                            .with_retry_count(attempt)
                            .with_metadata("reason", serde_json::json!("non_recoverable"));
                        context.debug(&format!("Non-recoverable error, not retrying: {}", error));
                        return Err(error);
                    }

                    ErrorLogger::log_retry_attempt(&self.operation_name, &error, attempt, max_attempts);

                    if attempt >= max_attempts {
                        return Err(error);
                    }

                    let delay = self.calculate_delay(attempt);
                    let context = LogContext::new("retry", &self.operation_name)
                        .with_retry_count(attempt)
                        .with_metadata("delay_ms", serde_json::json!(delay.as_millis() as u64));
                    context.debug(&format!("Retrying in {}ms", delay.as_millis()));

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay_ms as f64;
        let exponential_delay = base_delay * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = exponential_delay.min(self.config.max_delay_ms as f64);

        let final_delay = if self.config.jitter {
            let jitter = capped_delay * 0.1 * (rand::random::<f64>() - 0.5);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, RpcError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 5,
            max_delay_ms: 50,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_provider_preset() {
        let config = RetryConfig::for_provider();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.initial_delay_ms, 2_000);
        assert_eq!(config.backoff_multiplier, 1.0);
        assert!(!config.jitter);
        assert_eq!(RetryConfig::default(), config);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let retry_manager = RetryManager::new("test_operation", fast_config(3));

        let result = retry_manager.execute(|| async { Ok::<i32, MonitorError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let retry_manager = RetryManager::new("test_operation", fast_config(2));

        let result = retry_manager
            .execute(move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(MonitorError::Rpc(RpcError::Timeout { seconds: 1 }))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let retry_manager = RetryManager::new("test_operation", fast_config(2));

        let result = retry_manager
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, MonitorError>(MonitorError::Rpc(RpcError::RateLimit))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let retry_manager = RetryManager::new("test_operation", fast_config(3));

        let result = retry_manager
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, MonitorError>(MonitorError::Config(ConfigError::MissingEnvVar(
                    "TEST".to_string(),
                )))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_calculation() {
        let retry_manager = RetryManager::new(
            "test",
            RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 2_000,
                max_delay_ms: 30_000,
                backoff_multiplier: 2.0,
                jitter: false,
            },
        );

        assert_eq!(retry_manager.calculate_delay(1).as_millis(), 2_000);
        assert_eq!(retry_manager.calculate_delay(2).as_millis(), 4_000);
        assert_eq!(retry_manager.calculate_delay(3).as_millis(), 8_000);
        assert_eq!(retry_manager.calculate_delay(10).as_millis(), 30_000);
    }

    #[test]
    fn test_fixed_delay() {
        let retry_manager = RetryManager::new("test", RetryConfig::for_provider());
        assert_eq!(retry_manager.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(retry_manager.calculate_delay(3), Duration::from_secs(2));
    }
}
