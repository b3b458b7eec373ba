//! Tests for dashboard metrics

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::broker::{Broker, BrokerMetrics, BrokerStatus};
    use crate::paper::{CloseReason, Position, PositionStatus};
    use crate::types::{Side, ThresholdMode};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(id: &str, symbol: &str, amount: Decimal, pnl: Decimal) -> Position {
        Position {
            id: id.to_string(),
            symbol: symbol.to_string(),
            side: Side::Buy,
            entry_price: dec!(100),
            current_price: dec!(100),
            amount,
            leverage: 10,
            stop_loss: dec!(2),
            take_profit: dec!(5),
            threshold_mode: ThresholdMode::Percentage,
            status: PositionStatus::Open,
            pnl,
            open_time: Utc::now(),
            broker_id: "oanda".to_string(),
            is_auto_closed: false,
            closed_at: None,
            close_reason: None,
        }
    }

    #[test]
    fn test_empty_desk() {
        let metrics = DashboardMetrics::compute(&BrokerRegistry::from_catalog(), &Ledger::new());
        assert_eq!(metrics, DashboardMetrics::default());
    }

    #[test]
    fn test_metrics_aggregate_brokers_and_ledger() {
        let brokers: Vec<Broker> = BrokerRegistry::from_catalog()
            .iter()
            .cloned()
            .map(|mut b| {
                if b.id == "oanda" || b.id == "kraken" {
                    b.status = BrokerStatus::Connected;
                    b.metrics = BrokerMetrics {
                        balance: dec!(5000),
                        ..Default::default()
                    };
                }
                b
            })
            .collect();
        let brokers = BrokerRegistry::restore(brokers);

        let mut ledger = Ledger::new();
        ledger.open(position("a", "BTC", dec!(800), dec!(40))).unwrap();
        ledger.open(position("b", "ETH", dec!(400), dec!(-16))).unwrap();
        ledger.open(position("c", "SOL", dec!(400), dec!(-25))).unwrap();
        ledger.open(position("d", "XRP", dec!(100), dec!(10))).unwrap();
        ledger.close("b", None, CloseReason::StopLoss, Utc::now());
        ledger.close("d", None, CloseReason::Manual, Utc::now());

        let metrics = DashboardMetrics::compute(&brokers, &ledger);
        assert_eq!(metrics.connected_brokers, 2);
        assert_eq!(metrics.total_balance, dec!(10000));
        assert_eq!(metrics.open_positions, 2);
        assert_eq!(metrics.open_exposure, dec!(1200));
        assert_eq!(metrics.unrealized_pnl, dec!(15));
        assert_eq!(metrics.closed_positions, 2);
        assert_eq!(metrics.winning_trades, 1);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.win_rate, dec!(0.5));
        assert_eq!(metrics.auto_closed, 1);
        assert_eq!(metrics.realized_profit, dec!(-6));
    }
}
