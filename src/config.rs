//! Configuration loading
//!
//! `config.toml` is layered with `GIX__SECTION__KEY` environment overrides.
//! Every field has a default, so an absent file yields a working desk.

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

/// Simulation and execution constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk engine tick period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Minimum gap between autonomous signal scans
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    /// Per-tick multiplicative volatility of the random walk
    #[serde(default = "default_volatility")]
    pub volatility: f64,
    /// Center subtracted from the uniform draw; above 0.5 biases prices down
    #[serde(default = "default_drift_center")]
    pub drift_center: f64,
    /// Fraction of the broker balance committed per trade
    #[serde(default = "default_allocation_pct")]
    pub allocation_pct: Decimal,
    /// Hard leverage ceiling regardless of risk settings
    #[serde(default = "default_leverage_cap")]
    pub leverage_cap: u32,
    /// Scanner only fires below this many open positions
    #[serde(default = "default_scan_max_open")]
    pub scan_max_open: usize,
    #[serde(default = "default_notification_capacity")]
    pub notification_capacity: usize,
    /// Simulated broker handshake latency
    #[serde(default = "default_handshake_latency_ms")]
    pub handshake_latency_ms: u64,
    #[serde(default)]
    pub broker_policy: BrokerPolicy,
}

fn default_tick_interval_ms() -> u64 { 3_000 }
fn default_scan_interval_ms() -> u64 { 45_000 }
fn default_volatility() -> f64 { 0.0025 }
fn default_drift_center() -> f64 { 0.53 }
fn default_allocation_pct() -> Decimal { dec!(0.08) }
fn default_leverage_cap() -> u32 { 10 }
fn default_scan_max_open() -> usize { 3 }
fn default_notification_capacity() -> usize { 30 }
fn default_handshake_latency_ms() -> u64 { 1_800 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            scan_interval_ms: default_scan_interval_ms(),
            volatility: default_volatility(),
            drift_center: default_drift_center(),
            allocation_pct: default_allocation_pct(),
            leverage_cap: default_leverage_cap(),
            scan_max_open: default_scan_max_open(),
            notification_capacity: default_notification_capacity(),
            handshake_latency_ms: default_handshake_latency_ms(),
            broker_policy: BrokerPolicy::default(),
        }
    }
}

/// Which connected broker carries a new position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerPolicy {
    /// First connected broker in catalog order, whatever it trades
    #[default]
    FirstConnected,
    /// First connected broker whose asset class matches the symbol
    MatchAssetClass,
}

/// Live risk settings. Also the initial value when nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
    #[serde(default = "default_stop_loss")]
    pub default_stop_loss: Decimal,
    #[serde(default = "default_take_profit")]
    pub default_take_profit: Decimal,
    /// Thresholds are percentages of entry when true, price levels otherwise
    #[serde(default = "default_true")]
    pub is_percentage: bool,
    /// Automation on/off
    #[serde(default)]
    pub trading_enabled: bool,
}

pub const MAX_LEVERAGE_LIMIT: u32 = 100;

/// One day
pub const MAX_SCAN_INTERVAL_MS: u64 = 86_400_000;

fn default_max_leverage() -> u32 { 10 }
fn default_stop_loss() -> Decimal { dec!(2) }
fn default_take_profit() -> Decimal { dec!(5) }
fn default_true() -> bool { true }

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_leverage: default_max_leverage(),
            default_stop_loss: default_stop_loss(),
            default_take_profit: default_take_profit(),
            is_percentage: true,
            trading_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// File path for the JSON and SQLite backends (`~` is expanded)
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Replace a malformed blob with defaults instead of refusing to start
    #[serde(default)]
    pub reset_on_corrupt: bool,
}

fn default_storage_path() -> String {
    "~/.gentle_gix/state.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
            reset_on_corrupt: false,
        }
    }
}

impl StorageConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.path)
            .map_err(|e| BotError::Config(format!("storage.path: {}", e)))?;
        Ok(PathBuf::from(expanded.as_ref()))
    }
}

/// Market analysis LLM endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// gemini | openai | deepseek | ollama | anything OpenAI-compatible
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("GIX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;

        if config.llm.is_none() {
            if let Ok(api_key) = std::env::var("GEMINI_API_KEY").or_else(|_| std::env::var("API_KEY")) {
                tracing::debug!("Using Gemini analysis from environment API key");
                config.llm = Some(LlmConfig {
                    provider: "gemini".to_string(),
                    api_key,
                    model: None,
                    base_url: None,
                });
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.tick_interval_ms == 0 {
            return Err(BotError::Config("engine.tick_interval_ms must be > 0".into()));
        }
        if !(self.engine.volatility.is_finite() && self.engine.volatility >= 0.0) {
            return Err(BotError::Config("engine.volatility must be a non-negative number".into()));
        }
        if !(0.0..=1.0).contains(&self.engine.drift_center) {
            return Err(BotError::Config("engine.drift_center must be within [0, 1]".into()));
        }
        if self.engine.allocation_pct <= Decimal::ZERO || self.engine.allocation_pct > Decimal::ONE {
            return Err(BotError::Config("engine.allocation_pct must be within (0, 1]".into()));
        }
        if self.engine.leverage_cap == 0 {
            return Err(BotError::Config("engine.leverage_cap must be >= 1".into()));
        }
        if self.engine.scan_interval_ms > MAX_SCAN_INTERVAL_MS {
            return Err(BotError::Config(format!(
                "engine.scan_interval_ms must be <= {}",
                MAX_SCAN_INTERVAL_MS
            )));
        }
        if self.engine.notification_capacity == 0 {
            return Err(BotError::Config("engine.notification_capacity must be >= 1".into()));
        }
        if self.risk.max_leverage == 0 || self.risk.max_leverage > MAX_LEVERAGE_LIMIT {
            return Err(BotError::Config(format!(
                "risk.max_leverage must be within 1..={}",
                MAX_LEVERAGE_LIMIT
            )));
        }
        Ok(())
    }
}
