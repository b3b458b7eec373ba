//! Key-value persistence
//!
//! The desk keeps four blobs, one per collection, and rewrites all of them
//! after every mutation. Backends only need to store opaque strings.

mod json;
mod sqlite;


pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::broker::{Broker, BrokerRegistry};
use crate::config::{RiskConfig, StorageBackend, StorageConfig};
use crate::error::{BotError, Result};
use crate::paper::{Ledger, Position};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

pub const BROKERS_KEY: &str = "gentle_gix_brokers";
pub const TRADES_KEY: &str = "gentle_gix_trades";
pub const RISK_KEY: &str = "gentle_gix_risk";
pub const PROFIT_KEY: &str = "gentle_gix_profit";

/// Opaque string blob store
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Write several blobs; backends that can do it in one step override this
    async fn put_many(&self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, value).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Process-local store, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.blobs.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Open the backend named in config
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Json => Arc::new(JsonFileStore::new(config.resolved_path()?)),
        StorageBackend::Sqlite => Arc::new(SqliteStore::connect(config.resolved_path()?).await?),
    };
    tracing::debug!("Using {} store", store.name());
    Ok(store)
}

/// Everything the desk persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub brokers: BrokerRegistry,
    pub ledger: Ledger,
    pub risk: RiskConfig,
}

impl PersistedState {
    /// Load all four blobs. A missing blob yields that collection's
    /// default. A malformed blob is an error unless `reset_on_corrupt`.
    pub async fn load(store: &dyn KvStore, initial_risk: &RiskConfig, reset_on_corrupt: bool) -> Result<Self> {
        let brokers: Option<Vec<Broker>> = load_json(store, BROKERS_KEY, reset_on_corrupt).await?;
        let positions: Option<Vec<Position>> = load_json(store, TRADES_KEY, reset_on_corrupt).await?;
        let risk: Option<RiskConfig> = load_json(store, RISK_KEY, reset_on_corrupt).await?;
        let profit = load_profit(store, reset_on_corrupt).await?;

        Ok(Self {
            brokers: brokers.map(BrokerRegistry::restore).unwrap_or_default(),
            ledger: Ledger::from_parts(positions.unwrap_or_default(), profit.unwrap_or_default()),
            risk: risk.unwrap_or_else(|| initial_risk.clone()),
        })
    }

    pub async fn save(&self, store: &dyn KvStore) -> Result<()> {
        save_parts(store, &self.brokers, &self.ledger, &self.risk).await
    }
}

/// Serialize all four collections and write them in one call
pub async fn save_parts(
    store: &dyn KvStore,
    brokers: &BrokerRegistry,
    ledger: &Ledger,
    risk: &RiskConfig,
) -> Result<()> {
    let entries = [
        (BROKERS_KEY, serde_json::to_string(brokers)?),
        (TRADES_KEY, serde_json::to_string(ledger.positions())?),
        (RISK_KEY, serde_json::to_string(risk)?),
        (PROFIT_KEY, ledger.realized_profit().to_string()),
    ];
    store.put_many(&entries).await
}

async fn load_json<T: DeserializeOwned>(store: &dyn KvStore, key: &str, reset_on_corrupt: bool) -> Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => corrupt(key, e.to_string(), reset_on_corrupt),
    }
}

async fn load_profit(store: &dyn KvStore, reset_on_corrupt: bool) -> Result<Option<Decimal>> {
    let Some(raw) = store.get(PROFIT_KEY).await? else {
        return Ok(None);
    };
    match Decimal::from_str(raw.trim()).or_else(|_| Decimal::from_scientific(raw.trim())) {
        Ok(value) => Ok(Some(value)),
        Err(e) => corrupt(PROFIT_KEY, e.to_string(), reset_on_corrupt),
    }
}

fn corrupt<T>(key: &str, reason: String, reset_on_corrupt: bool) -> Result<Option<T>> {
    if reset_on_corrupt {
        tracing::warn!("Discarding malformed '{}' blob ({}); using defaults", key, reason);
        Ok(None)
    } else {
        Err(BotError::CorruptState {
            key: key.to_string(),
            reason,
        })
    }
}
