//! Simulated position and its exit rules

use crate::types::{Side, ThresholdMode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal places kept on P&L figures
pub const PNL_DP: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    Manual,
}

impl CloseReason {
    pub fn is_auto(&self) -> bool {
        !matches!(self, CloseReason::Manual)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            CloseReason::StopLoss => write!(f, "STOP_LOSS"),
            CloseReason::Manual => write!(f, "MANUAL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Notional committed from the broker balance
    pub amount: Decimal,
    pub leverage: u32,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Fixed at creation; later config changes do not reinterpret thresholds
    #[serde(default = "default_threshold_mode")]
    pub threshold_mode: ThresholdMode,
    pub status: PositionStatus,
    /// Floating while open, frozen at close
    pub pnl: Decimal,
    pub open_time: DateTime<Utc>,
    pub broker_id: String,
    pub is_auto_closed: bool,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_reason: Option<CloseReason>,
}

fn default_threshold_mode() -> ThresholdMode {
    ThresholdMode::Percentage
}

/// Result of marking a position to a new price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mark {
    pub price: Decimal,
    /// Signed so that a favorable move is positive, in percent
    pub pnl_pct: Decimal,
    pub pnl: Decimal,
    /// Threshold hit at this price, if any
    pub exit: Option<CloseReason>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Favorable-positive fractional move from entry
    pub fn signed_change(&self, price: Decimal) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.entry_price) / self.entry_price * self.side.sign()
    }

    /// Value the position at `price` and evaluate its thresholds
    pub fn mark(&self, price: Decimal) -> Mark {
        let change = self.signed_change(price);
        let pnl = (change * self.amount * Decimal::from(self.leverage)).round_dp(PNL_DP);
        let pnl_pct = change * Decimal::ONE_HUNDRED;

        let exit = match self.threshold_mode {
            ThresholdMode::Percentage => {
                if pnl_pct <= -self.stop_loss {
                    Some(CloseReason::StopLoss)
                } else if pnl_pct >= self.take_profit {
                    Some(CloseReason::TakeProfit)
                } else {
                    None
                }
            }
            ThresholdMode::Price => match self.side {
                Side::Buy if price <= self.stop_loss => Some(CloseReason::StopLoss),
                Side::Buy if price >= self.take_profit => Some(CloseReason::TakeProfit),
                // Short: stop sits above, target below
                Side::Sell if price >= self.stop_loss => Some(CloseReason::StopLoss),
                Side::Sell if price <= self.take_profit => Some(CloseReason::TakeProfit),
                _ => None,
            },
        };

        Mark { price, pnl_pct, pnl, exit }
    }

    /// Floating P&L as a percent of entry, favorable-positive
    pub fn pnl_pct(&self) -> Decimal {
        self.signed_change(self.current_price) * Decimal::ONE_HUNDRED
    }
}
