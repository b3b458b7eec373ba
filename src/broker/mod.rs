//! Broker registry
//!
//! Simulated liquidity sources. "Connecting" never leaves the process:
//! credentials are accepted on length alone and the account metrics are
//! drawn at random.
//!
//! ```text
//! DISCONNECTED ──authorize──► CONNECTED | ERROR ──disconnect──► DISCONNECTED
//! ```

pub mod catalog;


use crate::config::BrokerPolicy;
use crate::error::{BotError, Result};
use crate::types::AssetClass;
use rand::Rng;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

pub const MIN_KEY_LEN: usize = 8;
pub const MIN_SECRET_LEN: usize = 12;
pub const HANDSHAKE_ERROR: &str =
    "Critical Handshake Error: Unauthorized API Credentials or Invalid Project Scope.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BrokerStatus {
    Disconnected,
    Connected,
    Error,
}

impl std::fmt::Display for BrokerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerStatus::Disconnected => write!(f, "DISCONNECTED"),
            BrokerStatus::Connected => write!(f, "CONNECTED"),
            BrokerStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Synthetic account figures shown for a connected broker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerMetrics {
    pub balance: Decimal,
    /// Percent
    pub win_rate: Decimal,
    pub avg_profit: Decimal,
    /// Milliseconds
    pub execution_speed: Decimal,
}

impl BrokerMetrics {
    /// Plausible figures for a freshly authorized account
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            balance: uniform(rng, 2_000.0, 50_000.0),
            win_rate: uniform(rng, 72.0, 22.0),
            avg_profit: uniform(rng, 150.0, 800.0),
            execution_speed: uniform(rng, 2.0, 15.0),
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, base: f64, span: f64) -> Decimal {
    let value = base + rng.random::<f64>() * span;
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broker {
    pub id: String,
    pub name: String,
    pub asset_class: AssetClass,
    pub status: BrokerStatus,
    /// Stored as entered; never validated against a real service
    pub api_key: String,
    pub api_secret: String,
    pub metrics: BrokerMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Broker {
    fn from_catalog(entry: &catalog::CatalogEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            asset_class: entry.asset_class,
            status: BrokerStatus::Disconnected,
            api_key: String::new(),
            api_secret: String::new(),
            metrics: BrokerMetrics::default(),
            error_message: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == BrokerStatus::Connected
    }

    pub fn balance(&self) -> Decimal {
        self.metrics.balance
    }
}

/// Credential acceptance rule of the simulated handshake
pub fn credentials_accepted(key: &str, secret: &str) -> bool {
    key.chars().count() >= MIN_KEY_LEN && secret.chars().count() >= MIN_SECRET_LEN
}

/// Fixed catalog of brokers, in display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokerRegistry {
    brokers: Vec<Broker>,
}

impl BrokerRegistry {
    pub fn from_catalog() -> Self {
        Self {
            brokers: catalog::BROKERS.iter().map(Broker::from_catalog).collect(),
        }
    }

    /// Rebuild from persisted brokers, appending catalog entries the saved
    /// list does not know about
    pub fn restore(saved: Vec<Broker>) -> Self {
        let mut brokers = saved;
        for entry in catalog::BROKERS {
            if !brokers.iter().any(|b| b.id == entry.id) {
                brokers.push(Broker::from_catalog(entry));
            }
        }
        Self { brokers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Broker> {
        self.brokers
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BotError::BrokerNotFound(id.to_string()))
    }

    pub fn connected(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.iter().filter(|b| b.is_connected())
    }

    pub fn any_connected(&self) -> bool {
        self.brokers.iter().any(Broker::is_connected)
    }

    /// Broker that carries a new position under `policy`
    pub fn select(&self, policy: BrokerPolicy, class: Option<AssetClass>) -> Option<&Broker> {
        match (policy, class) {
            (BrokerPolicy::MatchAssetClass, Some(class)) => {
                self.connected().find(|b| b.asset_class == class)
            }
            // Symbols outside the catalog have no class to match on
            (BrokerPolicy::MatchAssetClass, None) => None,
            (BrokerPolicy::FirstConnected, _) => self.connected().next(),
        }
    }

    /// Apply the outcome of a handshake. Credentials are stored whatever the
    /// outcome; metrics are drawn only when the handshake is accepted.
    pub fn authorize<R: Rng + ?Sized>(
        &mut self,
        id: &str,
        key: &str,
        secret: &str,
        rng: &mut R,
    ) -> Result<&Broker> {
        if key.is_empty() || secret.is_empty() {
            return Err(BotError::InvalidInput("API key and secret are required".into()));
        }

        let broker = self.get_mut(id)?;
        broker.api_key = key.to_string();
        broker.api_secret = secret.to_string();

        if credentials_accepted(key, secret) {
            broker.status = BrokerStatus::Connected;
            broker.metrics = BrokerMetrics::generate(rng);
            broker.error_message = None;
            tracing::debug!("Broker {} authorized, balance {}", broker.id, broker.metrics.balance);
        } else {
            broker.status = BrokerStatus::Error;
            broker.metrics = BrokerMetrics::default();
            broker.error_message = Some(HANDSHAKE_ERROR.to_string());
            tracing::debug!("Broker {} rejected credentials", broker.id);
        }

        Ok(broker)
    }

    /// Always succeeds for a known broker, whatever its state
    pub fn disconnect(&mut self, id: &str) -> Result<&Broker> {
        let broker = self.get_mut(id)?;
        broker.status = BrokerStatus::Disconnected;
        broker.metrics = BrokerMetrics::default();
        broker.error_message = None;
        Ok(broker)
    }

    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::from_catalog()
    }
}
