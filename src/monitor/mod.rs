//! Dashboard metrics derived from desk state

#[cfg(test)]
mod tests;

use crate::broker::BrokerRegistry;
use crate::paper::Ledger;
use rust_decimal::Decimal;
use serde::Serialize;

/// Point-in-time summary of brokers and the ledger. Nothing here is stored;
/// it is recomputed on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub connected_brokers: usize,
    /// Sum of balances across connected brokers
    pub total_balance: Decimal,
    pub unrealized_pnl: Decimal,
    /// Sum of committed amounts over open positions
    pub open_exposure: Decimal,
    pub open_positions: usize,
    pub realized_profit: Decimal,
    pub closed_positions: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winners over closed positions, 0-1
    pub win_rate: Decimal,
    pub auto_closed: usize,
}

impl DashboardMetrics {
    pub fn compute(brokers: &BrokerRegistry, ledger: &Ledger) -> Self {
        let mut metrics = DashboardMetrics {
            realized_profit: ledger.realized_profit(),
            ..Default::default()
        };

        for broker in brokers.connected() {
            metrics.connected_brokers += 1;
            metrics.total_balance += broker.balance();
        }

        for position in ledger.open_positions() {
            metrics.open_positions += 1;
            metrics.unrealized_pnl += position.pnl;
            metrics.open_exposure += position.amount;
        }

        for position in ledger.closed_positions() {
            metrics.closed_positions += 1;
            if position.pnl > Decimal::ZERO {
                metrics.winning_trades += 1;
            } else if position.pnl < Decimal::ZERO {
                metrics.losing_trades += 1;
            }
            if position.is_auto_closed {
                metrics.auto_closed += 1;
            }
        }

        metrics.win_rate = if metrics.closed_positions > 0 {
            Decimal::from(metrics.winning_trades) / Decimal::from(metrics.closed_positions)
        } else {
            Decimal::ZERO
        };

        metrics
    }

    pub fn log(&self) {
        tracing::info!(
            "Desk: {} brokers ({:.2} balance), {} open ({:.2} exposure, {:+.2} floating), \
             {} closed, {:.1}% win rate, {:+.2} realized",
            self.connected_brokers,
            self.total_balance,
            self.open_positions,
            self.open_exposure,
            self.unrealized_pnl,
            self.closed_positions,
            self.win_rate * Decimal::ONE_HUNDRED,
            self.realized_profit
        );
    }
}
