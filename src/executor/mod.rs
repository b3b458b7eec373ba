//! Signal execution rule
//!
//! Turns a trading signal into a new simulated position. Precondition
//! failures are recovered here: they are recorded as notifications and
//! never propagate to the caller.


use crate::broker::BrokerRegistry;
use crate::config::{BrokerPolicy, EngineConfig, RiskConfig};
use crate::error::{BotError, Result};
use crate::market::catalog;
use crate::notify::NotificationLog;
use crate::paper::{Ledger, Position, PositionStatus};
use crate::types::{SignalOrder, ThresholdMode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Price-mode default stop, as a multiple of the entry price
const PRICE_MODE_STOP: Decimal = dec!(0.98);
/// Price-mode default target, as a multiple of the entry price
const PRICE_MODE_TARGET: Decimal = dec!(1.05);

/// Ceiling on entry prices; keeps the walk and P&L far from `Decimal` overflow
pub const MAX_PRICE: Decimal = dec!(1000000000);

/// Opens positions under exposure and leverage constraints
#[derive(Debug, Clone)]
pub struct Executor {
    allocation_pct: Decimal,
    leverage_cap: u32,
    policy: BrokerPolicy,
}

impl Executor {
    pub fn new(allocation_pct: Decimal, leverage_cap: u32, policy: BrokerPolicy) -> Self {
        Self {
            allocation_pct,
            leverage_cap,
            policy,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.allocation_pct, config.leverage_cap, config.broker_policy)
    }

    pub fn policy(&self) -> BrokerPolicy {
        self.policy
    }

    /// Execute a signal. Returns the opened position, or `None` after
    /// recording why the signal was refused.
    pub fn execute(
        &self,
        order: &SignalOrder,
        brokers: &BrokerRegistry,
        ledger: &mut Ledger,
        risk: &RiskConfig,
        notes: &mut NotificationLog,
        now: DateTime<Utc>,
    ) -> Option<Position> {
        match self.try_execute(order, brokers, ledger, risk, now) {
            Ok(position) => {
                let broker_name = brokers
                    .get(&position.broker_id)
                    .map(|b| b.name.as_str())
                    .unwrap_or(position.broker_id.as_str());
                notes.success(
                    "Trade Initiated",
                    format!("GIX executed {} for {} via {}", position.side, position.symbol, broker_name),
                );
                tracing::info!(
                    "Opened {} {} @ {} amount={} leverage={}x sl={}{} tp={}{}",
                    position.side,
                    position.symbol,
                    position.entry_price,
                    position.amount,
                    position.leverage,
                    position.stop_loss,
                    position.threshold_mode,
                    position.take_profit,
                    position.threshold_mode,
                );
                Some(position)
            }
            Err(e) => {
                record_rejection(&e, order, notes);
                None
            }
        }
    }

    /// Check preconditions in order and open the position
    pub fn try_execute(
        &self,
        order: &SignalOrder,
        brokers: &BrokerRegistry,
        ledger: &mut Ledger,
        risk: &RiskConfig,
        now: DateTime<Utc>,
    ) -> Result<Position> {
        // 1. Connectivity
        let class = catalog::asset_class_of(&order.symbol);
        let broker = brokers.select(self.policy, class).ok_or_else(|| {
            let detail = match (self.policy, class) {
                (BrokerPolicy::MatchAssetClass, Some(class)) if brokers.any_connected() => {
                    format!("no connected {} broker for {}", class, order.symbol)
                }
                (BrokerPolicy::MatchAssetClass, None) if brokers.any_connected() => {
                    format!("{} is not in the asset catalog", order.symbol)
                }
                _ => "no connected broker".to_string(),
            };
            BotError::NoConnectivity(detail)
        })?;

        // 2. One open position per symbol
        if ledger.has_open(&order.symbol) {
            return Err(BotError::ExposureBlock(order.symbol.clone()));
        }

        // 3. Sane price
        if order.price <= Decimal::ZERO || order.price > MAX_PRICE {
            return Err(BotError::InvalidInput(format!(
                "{} price must be within (0, {}], got {}",
                order.symbol, MAX_PRICE, order.price
            )));
        }

        let mode = ThresholdMode::from_flag(risk.is_percentage);
        let suggested = |v: Option<Decimal>| v.filter(|v| *v > Decimal::ZERO);
        let stop_loss = suggested(order.stop_loss).unwrap_or(match mode {
            ThresholdMode::Percentage => risk.default_stop_loss,
            ThresholdMode::Price => order.price * PRICE_MODE_STOP,
        });
        let take_profit = suggested(order.take_profit).unwrap_or(match mode {
            ThresholdMode::Percentage => risk.default_take_profit,
            ThresholdMode::Price => order.price * PRICE_MODE_TARGET,
        });

        let position = Position {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            entry_price: order.price,
            current_price: order.price,
            amount: broker.balance() * self.allocation_pct,
            leverage: risk.max_leverage.min(self.leverage_cap).max(1),
            stop_loss,
            take_profit,
            threshold_mode: mode,
            status: PositionStatus::Open,
            pnl: Decimal::ZERO,
            open_time: now,
            broker_id: broker.id.clone(),
            is_auto_closed: false,
            closed_at: None,
            close_reason: None,
        };

        ledger.open(position).cloned()
    }
}

fn record_rejection(err: &BotError, order: &SignalOrder, notes: &mut NotificationLog) {
    match err {
        BotError::NoConnectivity(detail) => notes.error(
            "Connectivity Failure",
            format!("GIX requires an active Broker Node to execute trades ({}).", detail),
        ),
        BotError::ExposureBlock(symbol) => notes.warning(
            "Exposure Block",
            format!("{} already has an active node. Diversifying...", symbol),
        ),
        other => notes.error(
            "Invalid Signal",
            format!("{} {} refused: {}", order.side, order.symbol, other),
        ),
    }
}
