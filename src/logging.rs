use log::{info, warn, error, debug, trace};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Structured logging context for the monitor
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub metadata: HashMap<String, Value>,
}

impl LogContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_user_id(self, user_id: &str) -> Self {
        self.with_metadata("user_id", json!(user_id))
    }

    pub fn with_address(self, address: &str) -> Self {
        self.with_metadata("address", json!(address))
    }

    pub fn with_balance(self, balance: &str) -> Self {
        self.with_metadata("balance", json!(balance))
    }

    pub fn with_duration_ms(self, duration_ms: u64) -> Self {
        self.with_metadata("duration_ms", json!(duration_ms))
    }

    pub fn with_retry_count(self, retry_count: u32) -> Self {
        self.with_metadata("retry_count", json!(retry_count))
    }

    fn format_message(&self, level: &str, message: &str) -> String {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut log_entry = json!({
            "timestamp": timestamp,
            "level": level,
            "component": self.component,
            "operation": self.operation,
            "message": message,
        });

        for (key, value) in &self.metadata {
            log_entry[key] = value.clone();
        }

        log_entry.to_string()
    }

    pub fn info(&self, message: &str) {
        info!("{}", self.format_message("INFO", message));
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", self.format_message("WARN", message));
    }

    pub fn error(&self, message: &str) {
        error!("{}", self.format_message("ERROR", message));
    }

    pub fn debug(&self, message: &str) {
        debug!("{}", self.format_message("DEBUG", message));
    }

    pub fn trace(&self, message: &str) {
        trace!("{}", self.format_message("TRACE", message));
    }
}

/// Times a single outbound call
pub struct PerformanceMonitor {
    pub start_time: SystemTime,
    operation: String,
    metadata: HashMap<String, Value>,
}

impl PerformanceMonitor {
    pub fn new(operation: &str) -> Self {
        Self {
            start_time: SystemTime::now(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn elapsed_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.start_time)
            .unwrap_or_default()
            .as_millis() as u64
    }

    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) -> u64
    where
        E: std::fmt::Display,
    {
        let duration = self.elapsed_ms();

        let mut context = LogContext::new("performance", &self.operation)
            .with_duration_ms(duration);

        for (key, value) in self.metadata {
            context = context.with_metadata(&key, value);
        }

        match result {
            Ok(_) => {
                context.trace(&format!("Operation completed successfully in {}ms", duration));
            }
            Err(e) => {
                context = context.with_metadata("error", json!(e.to_string()));
                context.debug(&format!("Operation failed after {}ms: {}", duration, e));
            }
        }

        duration
    }
}

/// Error logging utilities
pub struct ErrorLogger;

impl ErrorLogger {
    pub fn log_error(error: &crate::error::MonitorError, context: Option<LogContext>) {
        let severity = error.severity();

        let log_context = context
            .unwrap_or_else(|| LogContext::new("error", "unknown"))
            .with_metadata("severity", json!(format!("{:?}", severity)))
            .with_metadata("recoverable", json!(error.is_recoverable()));

        let message = format!("Error occurred: {}", error);

        match severity {
            crate::error::ErrorSeverity::Critical => log_context.error(&message),
            crate::error::ErrorSeverity::High => log_context.error(&message),
            crate::error::ErrorSeverity::Medium => log_context.warn(&message),
            crate::error::ErrorSeverity::Low => log_context.info(&message),
        }
    }

    pub fn log_retry_attempt(
        operation: &str,
        error: &crate::error::MonitorError,
        attempt: u32,
        max_attempts: u32,
    ) {
        let context = LogContext::new("retry", operation)
            .with_retry_count(attempt)
            .with_metadata("max_attempts", json!(max_attempts));

        if attempt >= max_attempts {
            context.error(&format!("Final attempt failed: {}", error));
        } else {
            context.warn(&format!("Attempt {} of {} failed: {}", attempt, max_attempts, error));
        }
    }

    pub fn log_recovery_success(operation: &str, attempts: u32, total_duration_ms: u64) {
        let context = LogContext::new("retry", operation)
            .with_retry_count(attempts)
            .with_duration_ms(total_duration_ms);

        context.info(&format!("Operation recovered after {} attempts in {}ms", attempts, total_duration_ms));
    }
}

/// Per-call and per-tick metrics written to the log
pub struct MetricsLogger;

impl MetricsLogger {
    pub fn log_rpc_call(method: &str, duration_ms: u64, success: bool) {
        let context = LogContext::new("metrics", "rpc_call")
            .with_metadata("method", json!(method))
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.debug(&format!("RPC call {} completed in {}ms", method, duration_ms));
        } else {
            context.warn(&format!("RPC call {} failed after {}ms", method, duration_ms));
        }
    }

    pub fn log_balance_change(user_id: &str, address: &str, change: &str, new_balance: &str) {
        let context = LogContext::new("metrics", "balance_change")
            .with_user_id(user_id)
            .with_address(address)
            .with_balance(new_balance)
            .with_metadata("change", json!(change));

        context.info(&format!("Balance change detected for wallet {}: {}", address, change));
    }

    pub fn log_notification(user_id: &str, tx_timestamp: u64, success: bool) {
        let context = LogContext::new("metrics", "notification")
            .with_user_id(user_id)
            .with_metadata("tx_timestamp", json!(tx_timestamp))
            .with_metadata("success", json!(success));

        if success {
            context.info(&format!("Balance update delivered for user {}", user_id));
        } else {
            context.error(&format!("Balance update for user {} dropped", user_id));
        }
    }

    pub fn log_health_check(success: bool, duration_ms: u64) {
        let context = LogContext::new("metrics", "health_check")
            .with_duration_ms(duration_ms)
            .with_metadata("success", json!(success));

        if success {
            context.info("Health check succeeded");
        } else {
            context.warn("Health check failed");
        }
    }

    pub fn log_tick_summary(summary: &crate::blockchain::TickSummary, duration_ms: u64) {
        let context = LogContext::new("metrics", "tick")
            .with_duration_ms(duration_ms)
            .with_metadata("wallets", json!(summary.total()))
            .with_metadata("unchanged", json!(summary.unchanged))
            .with_metadata("changed", json!(summary.changed))
            .with_metadata("notified", json!(summary.notified))
            .with_metadata("failed", json!(summary.failed));

        if summary.failed > 0 {
            context.warn(&format!(
                "Tick finished: {} wallets, {} changed, {} notified, {} failed",
                summary.total(), summary.changed, summary.notified, summary.failed
            ));
        } else {
            context.debug(&format!(
                "Tick finished: {} wallets, {} changed, {} notified",
                summary.total(), summary.changed, summary.notified
            ));
        }
    }
}

/// Initialize structured logging for the application
pub fn init_logging(level: &str, format: &str) {
    let pretty = format == "pretty";

    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(move |buf, record| {
            use std::io::Write;

            let line = record.args().to_string();
            match serde_json::from_str::<Value>(&line) {
                Ok(json_value) if pretty => writeln!(buf, "{}", serde_json::to_string_pretty(&json_value)?),
                Ok(_) => writeln!(buf, "{}", line),
                Err(_) => writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    line
                ),
            }
        })
        .try_init();

    if result.is_ok() {
        info!("Structured logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("test_component", "test_operation");
        assert_eq!(context.component, "test_component");
        assert_eq!(context.operation, "test_operation");
        assert!(context.metadata.is_empty());
    }

    #[test]
    fn test_log_context_with_metadata() {
        let context = LogContext::new("test", "test")
            .with_user_id("42")
            .with_address("EQabc")
            .with_balance("1.5");

        assert_eq!(context.metadata.get("user_id"), Some(&json!("42")));
        assert_eq!(context.metadata.get("address"), Some(&json!("EQabc")));
        assert_eq!(context.metadata.get("balance"), Some(&json!("1.5")));
    }

    #[test]
    fn test_performance_monitor_with_result() {
        let monitor = PerformanceMonitor::new("test_operation")
            .with_metadata("test_key", json!("test_value"));
        assert_eq!(monitor.metadata.get("test_key"), Some(&json!("test_value")));

        let result: Result<(), String> = Err("boom".to_string());
        let duration = monitor.finish_with_result(&result);
        assert!(duration < 1_000);
    }

    #[test]
    fn test_log_context_format_message() {
        let context = LogContext::new("detector", "check_wallet")
            .with_metadata("key", json!("value"));

        let message = context.format_message("INFO", "test message");

        let parsed: Value = serde_json::from_str(&message).expect("Should be valid JSON");
        assert_eq!(parsed["level"], "INFO");
        assert_eq!(parsed["component"], "detector");
        assert_eq!(parsed["operation"], "check_wallet");
        assert_eq!(parsed["message"], "test message");
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn test_metrics_logging() {
        MetricsLogger::log_rpc_call("getAddressBalance", 120, true);
        MetricsLogger::log_balance_change("42", "EQabc", "2.5", "7.5");
        MetricsLogger::log_notification("42", 1200, false);
        MetricsLogger::log_health_check(true, 30);
    }
}
