use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{MonitorError, RpcError};
use crate::logging::{LogContext, MetricsLogger, PerformanceMonitor};
use crate::models::{nano_to_decimal, TransactionRecord};
use crate::retry::{RetryConfig, RetryManager};

/// Transactions requested when the caller does not pass a limit
pub const DEFAULT_TRANSACTION_LIMIT: u32 = 10;

/// Read access to the chain, as needed by the change detector
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current balance in the native unit
    async fn balance(&self, address: &str) -> Result<Decimal, MonitorError>;

    /// Most recent transactions, newest first
    async fn recent_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, MonitorError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// toncenter answers with `ok`/`result`/`error`/`code`; plain JSON-RPC
/// servers put an object with `code` and `message` under `error`.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    code: Option<i64>,
}

impl JsonRpcResponse {
    fn into_result(self) -> Result<Value, RpcError> {
        if let Some(error) = self.error {
            return Err(method_error(error, self.code));
        }

        if self.ok == Some(false) {
            return Err(RpcError::Method {
                code: self.code.unwrap_or(-1),
                message: "Provider reported failure".to_string(),
            });
        }

        self.result
            .ok_or_else(|| RpcError::InvalidResponse("No result in response".to_string()))
    }
}

fn method_error(error: Value, code: Option<i64>) -> RpcError {
    match error {
        Value::String(message) => RpcError::Method {
            code: code.unwrap_or(-1),
            message,
        },
        Value::Object(map) => RpcError::Method {
            code: map
                .get("code")
                .and_then(Value::as_i64)
                .or(code)
                .unwrap_or(-1),
            message: map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
        },
        other => RpcError::Method {
            code: code.unwrap_or(-1),
            message: other.to_string(),
        },
    }
}

/// JSON-RPC client for a toncenter-compatible provider
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    retry: RetryManager,
}

impl ProviderClient {
    pub fn new(config: &ProviderConfig, retry: RetryConfig) -> Result<Self, MonitorError> {
        LogContext::new("rpc_client", "initialization")
            .with_metadata("endpoint", json!(config.endpoint))
            .with_metadata("timeout_seconds", json!(config.timeout_seconds))
            .with_metadata("api_key_configured", json!(config.api_key.is_some()))
            .info("Initializing provider client");

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(RpcError::Http)?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
            retry: RetryManager::new("provider", retry),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn make_request(&self, method: &str, params: Value) -> Result<Value, MonitorError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        LogContext::new("rpc_client", "make_request")
            .with_metadata("method", json!(method))
            .trace(&format!("Sending RPC request: {}", method));

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("X-API-Key", api_key);
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimit.into());
        }
        if status.is_server_error() {
            return Err(RpcError::Status { status: status.as_u16() }.into());
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let rpc_response: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(RpcError::Status { status: status.as_u16() }.into());
            }
            Err(e) => return Err(RpcError::Json(e).into()),
        };

        Ok(rpc_response.into_result()?)
    }

    fn classify(&self, error: reqwest::Error) -> MonitorError {
        let rpc_error = if error.is_timeout() {
            RpcError::Timeout { seconds: self.timeout_seconds }
        } else if error.is_connect() {
            RpcError::Connection(error.to_string())
        } else {
            RpcError::Http(error)
        };
        rpc_error.into()
    }

    async fn timed_request(&self, method: &str, params: Value) -> Result<Value, MonitorError> {
        let monitor = PerformanceMonitor::new(&format!("rpc_{}", method));
        let result = self.make_request(method, params).await;
        let duration = monitor.finish_with_result(&result);
        MetricsLogger::log_rpc_call(method, duration, result.is_ok());
        result
    }

    async fn fetch_balance(&self, address: &str) -> Result<Decimal, MonitorError> {
        let value = self
            .timed_request("getAddressBalance", json!({ "address": address }))
            .await?;

        let nano = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            other => {
                return Err(RpcError::InvalidResponse(format!(
                    "Balance is not an integer: {}",
                    other
                ))
                .into())
            }
        };

        nano_to_decimal(&nano)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()).into())
    }

    async fn fetch_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, MonitorError> {
        let value = self
            .timed_request("getTransactions", json!({ "address": address, "limit": limit }))
            .await?;

        serde_json::from_value(value).map_err(|e| RpcError::Json(e).into())
    }

    /// Current balance of `address`, retried according to the retry policy
    pub async fn get_balance(&self, address: &str) -> Result<Decimal, MonitorError> {
        let balance = self.retry.execute(move || self.fetch_balance(address)).await?;

        LogContext::new("rpc_client", "get_balance")
            .with_address(address)
            .with_balance(&balance.to_string())
            .debug(&format!("Balance for address {}: {}", address, balance));

        Ok(balance)
    }

    /// Up to `limit` (default 10) recent transactions of `address`, retried
    /// according to the retry policy
    pub async fn get_transactions(
        &self,
        address: &str,
        limit: Option<u32>,
    ) -> Result<Vec<TransactionRecord>, MonitorError> {
        let limit = limit.unwrap_or(DEFAULT_TRANSACTION_LIMIT);
        let transactions = self
            .retry
            .execute(move || self.fetch_transactions(address, limit))
            .await?;

        LogContext::new("rpc_client", "get_transactions")
            .with_address(address)
            .with_metadata("transaction_count", json!(transactions.len()))
            .debug(&format!("Fetched {} transactions for {}", transactions.len(), address));

        Ok(transactions)
    }
}

#[async_trait]
impl ChainReader for ProviderClient {
    async fn balance(&self, address: &str) -> Result<Decimal, MonitorError> {
        self.get_balance(address).await
    }

    async fn recent_transactions(
        &self,
        address: &str,
        limit: u32,
    ) -> Result<Vec<TransactionRecord>, MonitorError> {
        self.get_transactions(address, Some(limit)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "getAddressBalance",
            params: json!({ "address": "EQAaaaa" }),
            id: 1,
        };

        let serialized = serde_json::to_string(&request).unwrap();
        let expected = r#"{"jsonrpc":"2.0","method":"getAddressBalance","params":{"address":"EQAaaaa"},"id":1}"#;
        assert_eq!(serialized, expected);
    }

    #[test]
    fn test_toncenter_success_response() {
        let response: JsonRpcResponse =
            serde_json::from_str(r#"{"ok":true,"result":"1500000000","jsonrpc":"2.0","id":1}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), json!("1500000000"));
    }

    #[test]
    fn test_toncenter_error_response() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"ok":false,"error":"Incorrect address","code":416,"jsonrpc":"2.0","id":1}"#,
        )
        .unwrap();

        match response.into_result() {
            Err(RpcError::Method { code, message }) => {
                assert_eq!(code, 416);
                assert_eq!(message, "Incorrect address");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_json_rpc_object_error_response() {
        let response: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"Method not found"},"id":1}"#,
        )
        .unwrap();

        assert!(matches!(
            response.into_result(),
            Err(RpcError::Method { code: -32601, .. })
        ));
    }

    #[test]
    fn test_missing_result() {
        let response: JsonRpcResponse = serde_json::from_str(r#"{"ok":true,"id":1}"#).unwrap();
        assert!(matches!(response.into_result(), Err(RpcError::InvalidResponse(_))));
    }

    #[test]
    fn test_client_creation() {
        let config = ProviderConfig {
            endpoint: "https://testnet.toncenter.com/api/v2/jsonRPC".to_string(),
            api_key: Some("key".to_string()),
            timeout_seconds: 5,
        };
        let client = ProviderClient::new(&config, RetryConfig::no_retry()).unwrap();
        assert_eq!(client.endpoint(), config.endpoint);
    }
}
