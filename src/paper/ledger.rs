//! Position ledger
//!
//! Newest-first list of every position ever opened, plus the running
//! realized profit. All state transitions go through here so that a
//! position closes at most once and is counted into profit exactly once.

use super::position::{CloseReason, Position, PositionStatus, PNL_DP};
use crate::error::{BotError, Result};
use crate::types::{Side, ThresholdMode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Manual edits to an open position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub leverage: Option<u32>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl PositionUpdate {
    pub fn is_empty(&self) -> bool {
        self.leverage.is_none() && self.stop_loss.is_none() && self.take_profit.is_none()
    }
}

/// Thresholds must be positive and, as price levels, sit on the correct
/// sides of each other for the direction.
pub fn validate_thresholds(side: Side, mode: ThresholdMode, stop_loss: Decimal, take_profit: Decimal) -> Result<()> {
    if stop_loss <= Decimal::ZERO {
        return Err(BotError::InvalidInput(format!("stop-loss must be positive, got {}", stop_loss)));
    }
    if take_profit <= Decimal::ZERO {
        return Err(BotError::InvalidInput(format!("take-profit must be positive, got {}", take_profit)));
    }
    if mode == ThresholdMode::Price {
        let ordered = match side {
            Side::Buy => stop_loss < take_profit,
            Side::Sell => stop_loss > take_profit,
        };
        if !ordered {
            return Err(BotError::InvalidInput(format!(
                "{} stop-loss {} and take-profit {} are inverted",
                side, stop_loss, take_profit
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    positions: Vec<Position>,
    realized_profit: Decimal,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(positions: Vec<Position>, realized_profit: Decimal) -> Self {
        Self { positions, realized_profit }
    }

    /// Newest first
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn realized_profit(&self) -> Decimal {
        self.realized_profit
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| !p.is_open())
    }

    pub fn open_count(&self) -> usize {
        self.open_positions().count()
    }

    pub fn has_open(&self, symbol: &str) -> bool {
        self.open_positions().any(|p| p.symbol == symbol)
    }

    pub fn open_ids(&self) -> Vec<String> {
        self.open_positions().map(|p| p.id.clone()).collect()
    }

    /// Insert a new open position at the head
    pub fn open(&mut self, position: Position) -> Result<&Position> {
        if position.status != PositionStatus::Open {
            return Err(BotError::InvalidInput(format!("position {} is not open", position.id)));
        }
        if self.has_open(&position.symbol) {
            return Err(BotError::ExposureBlock(position.symbol));
        }
        self.positions.insert(0, position);
        Ok(&self.positions[0])
    }

    fn open_mut(&mut self, id: &str) -> Result<&mut Position> {
        let position = self
            .positions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BotError::PositionNotFound(id.to_string()))?;
        if !position.is_open() {
            return Err(BotError::PositionClosed(id.to_string()));
        }
        Ok(position)
    }

    /// Move an open position to a new price and floating P&L
    pub fn mark(&mut self, id: &str, price: Decimal, pnl: Decimal) -> bool {
        match self.open_mut(id) {
            Ok(position) => {
                position.current_price = price;
                position.pnl = pnl;
                true
            }
            Err(_) => false,
        }
    }

    /// Close an open position. `exit` carries the final price and P&L; when
    /// absent the last floating values become final. Returns `None` for
    /// unknown or already-closed ids, which leaves profit untouched.
    pub fn close(
        &mut self,
        id: &str,
        exit: Option<(Decimal, Decimal)>,
        reason: CloseReason,
        at: DateTime<Utc>,
    ) -> Option<Position> {
        let position = self.open_mut(id).ok()?;
        if let Some((price, pnl)) = exit {
            position.current_price = price;
            position.pnl = pnl.round_dp(PNL_DP);
        }
        position.status = PositionStatus::Closed;
        position.is_auto_closed = reason.is_auto();
        position.close_reason = Some(reason);
        position.closed_at = Some(at);

        let closed = position.clone();
        self.realized_profit += closed.pnl;
        Some(closed)
    }

    /// Apply manual edits. Leverage is clamped to `[1, max_leverage]`;
    /// thresholds are validated against the position's own mode and the
    /// whole update is rejected if they are invalid.
    pub fn update(&mut self, id: &str, update: &PositionUpdate, max_leverage: u32) -> Result<&Position> {
        let position = self.open_mut(id)?;

        let stop_loss = update.stop_loss.unwrap_or(position.stop_loss);
        let take_profit = update.take_profit.unwrap_or(position.take_profit);
        if update.stop_loss.is_some() || update.take_profit.is_some() {
            validate_thresholds(position.side, position.threshold_mode, stop_loss, take_profit)?;
        }

        if let Some(leverage) = update.leverage {
            position.leverage = leverage.clamp(1, max_leverage.max(1));
        }
        position.stop_loss = stop_loss;
        position.take_profit = take_profit;
        Ok(position)
    }
}
