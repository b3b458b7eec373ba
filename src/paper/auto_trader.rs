//! Risk engine tick
//!
//! Each tick walks every open position one step along the price feed:
//! - marks it to the new price and recomputes floating P&L
//! - evaluates stop-loss / take-profit under the position's own mode
//! - auto-closes and books realized profit when a threshold is hit

use super::ledger::Ledger;
use super::position::CloseReason;
use crate::market::PriceFeed;
use crate::notify::NotificationLog;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A position closed by the risk engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCloseResult {
    pub position_id: String,
    pub symbol: String,
    pub reason: CloseReason,
    pub exit_price: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
}

/// Drives open positions along a price feed
pub struct AutoTrader {
    feed: Box<dyn PriceFeed>,
}

impl AutoTrader {
    pub fn new(feed: Box<dyn PriceFeed>) -> Self {
        Self { feed }
    }

    pub fn feed_mut(&mut self) -> &mut dyn PriceFeed {
        self.feed.as_mut()
    }

    pub fn feed_name(&self) -> &str {
        self.feed.name()
    }

    /// Advance every open position by one step. Returns the positions the
    /// engine closed; marked-but-open positions are updated in place.
    pub fn update_and_check(
        &mut self,
        ledger: &mut Ledger,
        notes: &mut NotificationLog,
        now: DateTime<Utc>,
    ) -> Vec<AutoCloseResult> {
        let mut results = Vec::new();

        for id in ledger.open_ids() {
            let Some(position) = ledger.get(&id) else { continue };
            let new_price = self.feed.next_price(&position.symbol, position.current_price);
            let mark = position.mark(new_price);

            let Some(reason) = mark.exit else {
                ledger.mark(&id, mark.price, mark.pnl);
                continue;
            };

            let Some(closed) = ledger.close(&id, Some((mark.price, mark.pnl)), reason, now) else {
                continue;
            };

            debug!(
                "{} hit {} at {} ({:.2}%)",
                closed.symbol, reason, mark.price, mark.pnl_pct
            );

            let outcome = if closed.pnl >= Decimal::ZERO { "gain" } else { "loss" };
            let message = format!(
                "Finalized {} position with {} of ${:.2}",
                closed.symbol, outcome, closed.pnl
            );
            if closed.pnl >= Decimal::ZERO {
                notes.success("GIX Auto-Exit", message);
            } else {
                notes.warning("GIX Auto-Exit", message);
            }

            results.push(AutoCloseResult {
                position_id: closed.id,
                symbol: closed.symbol,
                reason,
                exit_price: mark.price,
                pnl: closed.pnl,
                pnl_pct: mark.pnl_pct,
            });
        }

        results
    }
}
