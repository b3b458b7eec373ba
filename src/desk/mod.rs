//! Trading desk
//!
//! `Desk` is the single owner of all mutable state: broker registry, ledger,
//! risk settings and the notification log. Every mutation goes through a
//! method here and is written through to the store before returning.
//!
//! The desk itself is synchronous apart from persistence. `actor` wraps it
//! in a task that serializes commands with the periodic tick.

pub mod actor;

#[cfg(test)]
mod tests;

pub use actor::{spawn, DeskHandle};

use crate::analysis::AnalysisReport;
use crate::broker::{Broker, BrokerRegistry, HANDSHAKE_ERROR};
use crate::config::{Config, EngineConfig, RiskConfig, MAX_LEVERAGE_LIMIT};
use crate::error::{BotError, Result};
use crate::executor::Executor;
use crate::market::PriceFeed;
use crate::monitor::DashboardMetrics;
use crate::notify::{Notification, NotificationLog};
use crate::paper::{AutoCloseResult, AutoTrader, CloseReason, Ledger, Position, PositionUpdate};
use crate::scanner::SignalScanner;
use crate::storage::{save_parts, KvStore, PersistedState};
use crate::types::{AssetClass, Side, SignalOrder, ThresholdMode};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one risk-engine tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Open positions walked this tick
    pub marked: usize,
    pub closed: Vec<AutoCloseResult>,
    /// Position opened by the signal scanner, if any
    pub scanned: Option<Position>,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.marked == 0 && self.scanned.is_none()
    }
}

/// Read-only copy of desk state for front ends
#[derive(Debug, Clone, Serialize)]
pub struct DeskSnapshot {
    pub brokers: Vec<Broker>,
    pub positions: Vec<Position>,
    pub risk: RiskConfig,
    pub realized_profit: Decimal,
    pub notifications: Vec<Notification>,
    pub metrics: DashboardMetrics,
}

pub struct Desk {
    engine: EngineConfig,
    brokers: BrokerRegistry,
    ledger: Ledger,
    risk: RiskConfig,
    notes: NotificationLog,
    store: Arc<dyn KvStore>,
    auto_trader: AutoTrader,
    executor: Executor,
    scanner: SignalScanner,
    rng: StdRng,
}

impl Desk {
    pub fn new(
        engine: EngineConfig,
        state: PersistedState,
        store: Arc<dyn KvStore>,
        feed: Box<dyn PriceFeed>,
        rng: StdRng,
    ) -> Self {
        Self {
            notes: NotificationLog::new(engine.notification_capacity),
            executor: Executor::from_config(&engine),
            scanner: SignalScanner::from_config(&engine),
            auto_trader: AutoTrader::new(feed),
            brokers: state.brokers,
            ledger: state.ledger,
            risk: state.risk,
            engine,
            store,
            rng,
        }
    }

    /// Load persisted state from `store` and build a desk around it
    pub async fn open(
        config: &Config,
        store: Arc<dyn KvStore>,
        feed: Box<dyn PriceFeed>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let state = PersistedState::load(store.as_ref(), &config.risk, config.storage.reset_on_corrupt).await?;
        info!(
            "Loaded desk from {} store: {} positions ({} open), {} brokers connected, profit {}",
            store.name(),
            state.ledger.positions().len(),
            state.ledger.open_count(),
            state.brokers.connected().count(),
            state.ledger.realized_profit()
        );
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self::new(config.engine.clone(), state, store, feed, rng))
    }

    pub fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub fn brokers(&self) -> &BrokerRegistry {
        &self.brokers
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn risk(&self) -> &RiskConfig {
        &self.risk
    }

    pub fn notifications(&self) -> &NotificationLog {
        &self.notes
    }

    pub fn automation_enabled(&self) -> bool {
        self.risk.trading_enabled
    }

    pub fn metrics(&self) -> DashboardMetrics {
        DashboardMetrics::compute(&self.brokers, &self.ledger)
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        DeskSnapshot {
            brokers: self.brokers.iter().cloned().collect(),
            positions: self.ledger.positions().to_vec(),
            risk: self.risk.clone(),
            realized_profit: self.ledger.realized_profit(),
            notifications: self.notes.to_vec(),
            metrics: self.metrics(),
        }
    }

    /// Mock quote used for manual and analysis-driven tickets
    pub fn quote(&mut self, class: AssetClass) -> Decimal {
        self.auto_trader.feed_mut().quote(class)
    }

    /// Write all four blobs. Callers mutate first, so a failed write leaves
    /// memory ahead of the store; the error still reaches the caller and the
    /// next successful write rewrites every blob.
    async fn persist(&self) -> Result<()> {
        save_parts(self.store.as_ref(), &self.brokers, &self.ledger, &self.risk).await
    }

    /// Run the execution rule on `order`. Refusals are recorded as
    /// notifications and come back as `Ok(None)`.
    pub async fn execute_signal(&mut self, order: &SignalOrder, now: DateTime<Utc>) -> Result<Option<Position>> {
        let opened = self
            .executor
            .execute(order, &self.brokers, &mut self.ledger, &self.risk, &mut self.notes, now);
        if opened.is_some() {
            self.persist().await?;
        }
        Ok(opened)
    }

    /// Turn an analysis report into a ticket at a fresh mock quote and run
    /// it through the execution rule. A HOLD with no side override is a no-op.
    pub async fn execute_report(
        &mut self,
        report: &AnalysisReport,
        symbol: &str,
        class: AssetClass,
        side: Option<Side>,
        now: DateTime<Utc>,
    ) -> Result<Option<Position>> {
        let price = self.quote(class);
        let Some(order) = report.ticket(symbol, price, side, &self.risk) else {
            info!("{} analysis is HOLD; nothing to execute", symbol);
            return Ok(None);
        };
        self.execute_signal(&order, now).await
    }

    /// Close an open position at its last floating P&L. Unknown or already
    /// closed ids are a no-op.
    pub async fn close_position(&mut self, id: &str, now: DateTime<Utc>) -> Result<Option<Position>> {
        let Some(closed) = self.ledger.close(id, None, CloseReason::Manual, now) else {
            debug!("Close ignored for {}: not an open position", id);
            return Ok(None);
        };
        info!("Manually closed {} {} with P&L {}", closed.side, closed.symbol, closed.pnl);
        self.notes.info(
            "Manual Intervention",
            format!("User-signed exit for {} finalized.", closed.symbol),
        );
        self.persist().await?;
        Ok(Some(closed))
    }

    /// Edit leverage and thresholds of an open position. Invalid thresholds
    /// reject the whole update.
    pub async fn update_position(&mut self, id: &str, update: &PositionUpdate) -> Result<Position> {
        match self.ledger.update(id, update, self.risk.max_leverage) {
            Ok(position) => {
                let position = position.clone();
                debug!(
                    "Updated {}: leverage={}x sl={} tp={}",
                    position.symbol, position.leverage, position.stop_loss, position.take_profit
                );
                self.notes.info(
                    "Position Updated",
                    format!(
                        "{} now {}x, SL {} / TP {}.",
                        position.symbol, position.leverage, position.stop_loss, position.take_profit
                    ),
                );
                self.persist().await?;
                Ok(position)
            }
            Err(e @ BotError::InvalidInput(_)) => {
                warn!("Rejected update for {}: {}", id, e);
                self.notes.warning("Parameter Rejected", e.to_string());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns whether the state changed
    pub async fn set_automation(&mut self, enabled: bool) -> Result<bool> {
        if self.risk.trading_enabled == enabled {
            return Ok(false);
        }
        self.risk.trading_enabled = enabled;
        if enabled {
            self.notes.success("GIX Neural On", "Scanning global order flows and news sentiment.");
        } else {
            self.notes.warning("GIX Neural Off", "Analysis cycles suspended.");
        }
        self.persist().await?;
        Ok(true)
    }

    /// Flip automation; returns the new state
    pub async fn toggle_automation(&mut self) -> Result<bool> {
        let enabled = !self.risk.trading_enabled;
        self.set_automation(enabled).await?;
        Ok(enabled)
    }

    /// Replace risk settings. Max leverage is clamped into range; default
    /// thresholds must be positive. Only positions opened afterwards see the
    /// new defaults and threshold mode.
    pub async fn update_risk(&mut self, mut risk: RiskConfig) -> Result<&RiskConfig> {
        if risk.default_stop_loss <= Decimal::ZERO || risk.default_take_profit <= Decimal::ZERO {
            return Err(BotError::InvalidInput(
                "default stop-loss and take-profit must be positive".into(),
            ));
        }
        risk.max_leverage = risk.max_leverage.clamp(1, MAX_LEVERAGE_LIMIT);

        if risk.trading_enabled != self.risk.trading_enabled {
            self.set_automation(risk.trading_enabled).await?;
        }
        self.notes.info(
            "Risk Profile Updated",
            format!(
                "Max leverage {}x, default SL {} / TP {} ({}).",
                risk.max_leverage,
                risk.default_stop_loss,
                risk.default_take_profit,
                ThresholdMode::from_flag(risk.is_percentage)
            ),
        );
        self.risk = risk;
        self.persist().await?;
        Ok(&self.risk)
    }

    /// Simulated handshake: waits out the configured latency, then applies
    /// the result. Front ends that must not block the desk await the latency
    /// themselves and call `apply_authorization`.
    pub async fn connect_broker(&mut self, id: &str, api_key: &str, api_secret: &str) -> Result<Broker> {
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(BotError::InvalidInput("API key and secret are required".into()));
        }
        self.brokers.get(id).ok_or_else(|| BotError::BrokerNotFound(id.to_string()))?;
        tokio::time::sleep(std::time::Duration::from_millis(self.engine.handshake_latency_ms)).await;
        self.apply_authorization(id, api_key, api_secret).await
    }

    pub async fn apply_authorization(&mut self, id: &str, api_key: &str, api_secret: &str) -> Result<Broker> {
        let broker = self.brokers.authorize(id, api_key, api_secret, &mut self.rng)?.clone();
        if broker.is_connected() {
            info!("🔗 {} connected, balance {}", broker.name, broker.metrics.balance);
            self.notes.success(
                "Broker Connected",
                format!("{} node online with balance {}.", broker.name, broker.metrics.balance),
            );
        } else {
            let reason = broker.error_message.as_deref().unwrap_or(HANDSHAKE_ERROR);
            warn!("{} handshake failed: {}", broker.name, reason);
            self.notes.error(format!("{} Rejected", broker.name), reason.to_string());
        }
        self.persist().await?;
        Ok(broker)
    }

    pub async fn disconnect_broker(&mut self, id: &str) -> Result<Broker> {
        let broker = self.brokers.disconnect(id)?.clone();
        info!("{} disconnected", broker.name);
        self.notes.info("Broker Disconnected", format!("{} node taken offline.", broker.name));
        self.persist().await?;
        Ok(broker)
    }

    /// One risk-engine step: walk open positions, then scan for a new
    /// signal if one is due. Does nothing while automation is off.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        if !self.risk.trading_enabled {
            return Ok(TickReport::default());
        }

        let marked = self.ledger.open_count();
        let closed = self.auto_trader.update_and_check(&mut self.ledger, &mut self.notes, now);
        for result in &closed {
            info!(
                "⚡ Auto-exit {} ({}) at {} P&L {:.2} ({:.2}%)",
                result.symbol, result.reason, result.exit_price, result.pnl, result.pnl_pct
            );
        }

        let scanned = match self.scanner.poll(
            now,
            self.ledger.open_count(),
            self.brokers.any_connected(),
            &mut self.rng,
        ) {
            Some(order) => self
                .executor
                .execute(&order, &self.brokers, &mut self.ledger, &self.risk, &mut self.notes, now),
            None => None,
        };

        let report = TickReport { marked, closed, scanned };
        if !report.is_idle() {
            self.persist().await?;
        }
        Ok(report)
    }
}
