use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::RegistryError;

/// A monitored wallet and the user it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletEntry {
    pub user_id: String,
    pub address: String,
}

impl WalletEntry {
    pub fn new(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: address.into(),
        }
    }
}

/// Static user id -> address mapping loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct AddressRegistry {
    entries: Vec<WalletEntry>,
}

impl AddressRegistry {
    /// Load the registry from a JSON object file `{ "<userId>": "<address>" }`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: display.clone(),
            source,
        })?;

        Self::from_json(&display, &content)
    }

    /// Parse the registry from JSON text; `origin` is used in error messages
    pub fn from_json(origin: &str, content: &str) -> Result<Self, RegistryError> {
        let map: BTreeMap<String, String> =
            serde_json::from_str(content).map_err(|e| RegistryError::Malformed {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = Vec::with_capacity(map.len());
        for (user_id, address) in map {
            let address = address.trim().to_string();
            if address.is_empty() {
                return Err(RegistryError::Malformed {
                    path: origin.to_string(),
                    reason: format!("empty address for user {}", user_id),
                });
            }
            entries.push(WalletEntry { user_id, address });
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<WalletEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[WalletEntry] {
        &self.entries
    }

    pub fn find(&self, user_id: &str) -> Option<&WalletEntry> {
        self.entries.iter().find(|entry| entry.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
