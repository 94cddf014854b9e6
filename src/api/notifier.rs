use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::NotifierConfig;
use crate::error::{MonitorError, NotifyError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::ChangeEvent;

const UPDATE_METHOD: &str = "updateWalletBalance";
const HEALTH_CHECK_METHOD: &str = "healthCheck";

/// Downstream receiver of balance updates
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_balance_update(&self, event: &ChangeEvent) -> Result<(), NotifyError>;
    async fn health_check(&self) -> Result<(), NotifyError>;
}

/// Posts to `{base_url}?method=<name>`. A delivery counts only on HTTP 200.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    base_url: String,
}

impl WebhookNotifier {
    pub fn new(base_url: &str, config: &NotifierConfig) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(NotifyError::Http)?;

        LogContext::new("notifier", "initialization")
            .with_metadata("base_url", json!(base_url))
            .info("Initializing webhook notifier");

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Build a notifier from config; `None` when no base URL is configured
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>, MonitorError> {
        match config.base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(Some(Self::new(url.trim(), config)?)),
            _ => Ok(None),
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.base_url)
            .query(&[("method", method)])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.unwrap_or_default();
        LogContext::new("notifier", method)
            .with_metadata("response", json!(body))
            .debug("Webhook accepted request");

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send_balance_update(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        let monitor = PerformanceMonitor::new("notify_balance_update")
            .with_metadata("user_id", json!(event.user_id));
        let result = self.post(UPDATE_METHOD, event).await;
        monitor.finish_with_result(&result);

        MetricsLogger::log_notification(&event.user_id, event.tx_timestamp, result.is_ok());
        result
    }

    async fn health_check(&self) -> Result<(), NotifyError> {
        let monitor = PerformanceMonitor::new("health_check");
        let body = json!({ "timestamp": chrono::Utc::now().timestamp() });
        let result = self.post(HEALTH_CHECK_METHOD, &body).await;
        let duration = monitor.finish_with_result(&result);

        MetricsLogger::log_health_check(result.is_ok(), duration);
        result
    }
}
