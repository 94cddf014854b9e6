use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::PriceConfig;
use crate::error::{MonitorError, PriceError};
use crate::logging::{ErrorLogger, LogContext, PerformanceMonitor};

/// Source of the USD price attached to balance updates
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// USD price of the native asset; 0 when it cannot be determined
    async fn usd_price(&self) -> Decimal;
}

/// Coingecko-style `simple/price` client
#[derive(Clone)]
pub struct PriceClient {
    client: Client,
    endpoint: String,
    asset_id: String,
}

impl PriceClient {
    pub fn new(config: &PriceConfig) -> Result<Self, MonitorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(PriceError::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            asset_id: config.asset_id.clone(),
        })
    }

    pub async fn fetch_price(&self) -> Result<Decimal, PriceError> {
        let url = format!("{}/simple/price", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("ids", self.asset_id.as_str()), ("vs_currencies", "usd")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let body: HashMap<String, HashMap<String, Value>> = response.json().await?;

        // go through the textual form so 5.37 stays 5.37
        body.get(&self.asset_id)
            .and_then(|prices| prices.get("usd"))
            .and_then(|usd| match usd {
                Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
                Value::String(s) => s.parse::<Decimal>().ok(),
                _ => None,
            })
            .ok_or_else(|| PriceError::Missing(self.asset_id.clone()))
    }
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn usd_price(&self) -> Decimal {
        let monitor = PerformanceMonitor::new("price_lookup")
            .with_metadata("asset_id", json!(self.asset_id));
        let result = self.fetch_price().await;
        monitor.finish_with_result(&result);

        match result {
            Ok(price) => {
                LogContext::new("price", "usd_price")
                    .with_metadata("price", json!(price.to_string()))
                    .debug(&format!("{} price: {} USD", self.asset_id, price));
                price
            }
            Err(e) => {
                ErrorLogger::log_error(
                    &MonitorError::Price(e),
                    Some(LogContext::new("price", "usd_price")),
                );
                Decimal::ZERO
            }
        }
    }
}
