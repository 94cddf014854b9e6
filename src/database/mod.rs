pub mod memory;
pub mod operations;
pub mod redis_store;
pub mod schema;


use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::StoreError;
use crate::logging::LogContext;
use crate::models::parse_balance;

pub use memory::MemoryStore;
pub use operations::SqliteStore;
pub use redis_store::RedisStore;
pub use schema::{initialize_schema, run_migrations};

/// Flat key-value namespace the monitor persists its state in
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Key holding the last observed balance of a user
pub fn balance_key(user_id: &str) -> String {
    format!("balance:{}", user_id)
}

/// Key holding the timestamp of the last reported transaction of a user
pub fn watermark_key(user_id: &str) -> String {
    format!("last_tx_utime:{}", user_id)
}

/// Typed per-user state on top of a `KeyValueStore`.
///
/// Balance and watermark are two independent keys; they are written
/// separately and a crash between the writes can leave them out of step.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Last observed balance, `None` if the user was never seeded
    pub async fn get_balance(&self, user_id: &str) -> Result<Option<Decimal>, StoreError> {
        let key = balance_key(user_id);
        match self.backend.get(&key).await? {
            Some(raw) => parse_balance(&raw)
                .map(Some)
                .map_err(|_| StoreError::CorruptValue { key, value: raw }),
            None => Ok(None),
        }
    }

    pub async fn set_balance(&self, user_id: &str, balance: Decimal) -> Result<(), StoreError> {
        self.backend
            .set(&balance_key(user_id), &balance.normalize().to_string())
            .await
    }

    /// Timestamp of the last reported transaction, 0 if none
    pub async fn get_watermark(&self, user_id: &str) -> Result<u64, StoreError> {
        let key = watermark_key(user_id);
        match self.backend.get(&key).await? {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| StoreError::CorruptValue { key, value: raw }),
            None => Ok(0),
        }
    }

    pub async fn set_watermark(&self, user_id: &str, utime: u64) -> Result<(), StoreError> {
        self.backend.set(&watermark_key(user_id), &utime.to_string()).await
    }

    /// Forget everything stored for a user
    pub async fn reset_user(&self, user_id: &str) -> Result<(), StoreError> {
        self.backend.delete(&balance_key(user_id)).await?;
        self.backend.delete(&watermark_key(user_id)).await
    }
}

/// Open the backend selected by the store URL.
///
/// `None` or `memory://` -> in-process map, `sqlite://<path>` -> SQLite file,
/// `redis://` / `rediss://` -> Redis.
pub async fn open_store(url: Option<&str>) -> Result<StateStore, StoreError> {
    let context = LogContext::new("store", "open");

    let url = match url {
        None => {
            context.warn("No store URL configured, state will not survive restarts");
            return Ok(StateStore::in_memory());
        }
        Some(url) => url.trim(),
    };

    if url == "memory://" {
        context.info("Using in-memory state store");
        return Ok(StateStore::in_memory());
    }

    if let Some(path) = url.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(StoreError::UnsupportedUrl(url.to_string()));
        }
        context
            .with_metadata("path", serde_json::json!(path))
            .info("Using SQLite state store");
        return Ok(StateStore::new(Arc::new(SqliteStore::new(path)?)));
    }

    if url.starts_with("redis://") || url.starts_with("rediss://") {
        let store = RedisStore::connect(url).await?;
        store.ping().await?;
        return Ok(StateStore::new(Arc::new(store)));
    }

    Err(StoreError::UnsupportedUrl(url.to_string()))
}
