//! Tests for the desk and its actor

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::analysis::{AnalysisReport, Sentiment, TradeSignal};
    use crate::broker::{BrokerMetrics, BrokerStatus};
    use crate::market::ReplayFeed;
    use crate::notify::Severity;
    use crate::paper::PositionStatus;
    use crate::storage::{MemoryStore, PROFIT_KEY, TRADES_KEY};
    use crate::types::ThresholdMode;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Memory store whose writes can be switched off
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl KvStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: &str) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.put(key, value).await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Engine config with the scanner disabled so ticks only walk positions
    fn quiet_engine() -> EngineConfig {
        EngineConfig {
            scan_max_open: 0,
            ..Default::default()
        }
    }

    fn connected(ids: &[&str]) -> BrokerRegistry {
        let brokers = BrokerRegistry::from_catalog()
            .iter()
            .cloned()
            .map(|mut b| {
                if ids.contains(&b.id.as_str()) {
                    b.status = BrokerStatus::Connected;
                    b.metrics = BrokerMetrics {
                        balance: dec!(10000),
                        win_rate: dec!(80),
                        avg_profit: dec!(300),
                        execution_speed: dec!(4),
                    };
                }
                b
            })
            .collect();
        BrokerRegistry::restore(brokers)
    }

    fn desk_with(engine: EngineConfig, brokers: BrokerRegistry, feed: ReplayFeed, store: Arc<MemoryStore>) -> Desk {
        let state = PersistedState {
            brokers,
            ..Default::default()
        };
        Desk::new(engine, state, store, Box::new(feed), StdRng::seed_from_u64(42))
    }

    fn desk(feed: ReplayFeed) -> (Desk, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (desk_with(quiet_engine(), connected(&["oanda"]), feed, Arc::clone(&store)), store)
    }

    fn buy(symbol: &str) -> SignalOrder {
        SignalOrder::new(Side::Buy, symbol, dec!(100))
    }

    #[tokio::test]
    async fn test_execute_opens_and_persists() {
        let (mut desk, store) = desk(ReplayFeed::new());
        let position = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap().unwrap();

        assert_eq!(position.amount, dec!(800));
        assert_eq!(position.leverage, 10);
        assert_eq!(position.broker_id, "oanda");
        let saved = store.get(TRADES_KEY).await.unwrap().unwrap();
        assert!(saved.contains(&position.id));
        assert_eq!(desk.notifications().latest().unwrap().title, "Trade Initiated");
    }

    #[tokio::test]
    async fn test_execute_without_broker_records_error() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(quiet_engine(), BrokerRegistry::from_catalog(), ReplayFeed::new(), Arc::clone(&store));

        let result = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap();
        assert!(result.is_none());
        assert!(desk.ledger().positions().is_empty());
        assert_eq!(desk.notifications().len(), 1);
        assert_eq!(desk.notifications().latest().unwrap().severity, Severity::Error);
        // Nothing changed, nothing written
        assert_eq!(store.get(TRADES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_manual_close_counts_once() {
        let (mut desk, store) = desk(ReplayFeed::new().with_marks("EUR/USD", [dec!(101)]));
        desk.set_automation(true).await.unwrap();
        let id = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap().unwrap().id;
        desk.tick(Utc::now()).await.unwrap();

        let closed = desk.close_position(&id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert!(!closed.is_auto_closed);
        assert_eq!(closed.pnl, dec!(80));
        assert_eq!(desk.ledger().realized_profit(), dec!(80));

        let note = desk.notifications().latest().unwrap();
        assert_eq!(note.title, "Manual Intervention");
        assert_eq!(note.severity, Severity::Info);

        assert!(desk.close_position(&id, Utc::now()).await.unwrap().is_none());
        assert!(desk.close_position("missing", Utc::now()).await.unwrap().is_none());
        assert_eq!(desk.ledger().realized_profit(), dec!(80));
        let saved: Decimal = store.get(PROFIT_KEY).await.unwrap().unwrap().parse().unwrap();
        assert_eq!(saved, dec!(80));
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected_whole() {
        let (mut desk, _store) = desk(ReplayFeed::new());
        let id = desk.execute_signal(&buy("AAPL"), Utc::now()).await.unwrap().unwrap().id;

        let err = desk
            .update_position(
                &id,
                &PositionUpdate {
                    leverage: Some(3),
                    stop_loss: Some(dec!(-1)),
                    take_profit: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));

        let position = desk.ledger().get(&id).unwrap();
        assert_eq!(position.leverage, 10);
        assert_eq!(position.stop_loss, dec!(2));
        let note = desk.notifications().latest().unwrap();
        assert_eq!(note.title, "Parameter Rejected");
        assert_eq!(note.severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_update_clamps_leverage() {
        let (mut desk, _store) = desk(ReplayFeed::new());
        let id = desk.execute_signal(&buy("AAPL"), Utc::now()).await.unwrap().unwrap().id;

        let update = PositionUpdate {
            leverage: Some(50),
            ..Default::default()
        };
        let position = desk.update_position(&id, &update).await.unwrap();
        assert_eq!(position.leverage, 10);
        let note = desk.notifications().latest().unwrap();
        assert_eq!((note.title.as_str(), note.severity), ("Position Updated", Severity::Info));
        assert!(note.message.contains("AAPL"));

        desk.close_position(&id, Utc::now()).await.unwrap();
        assert!(matches!(
            desk.update_position(&id, &update).await,
            Err(BotError::PositionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_tick_is_noop_while_automation_off() {
        let (mut desk, _store) = desk(ReplayFeed::new().with_marks("EUR/USD", [dec!(50)]));
        desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap();

        let report = desk.tick(Utc::now()).await.unwrap();
        assert_eq!(report, TickReport::default());
        assert_eq!(desk.ledger().open_count(), 1);
    }

    #[tokio::test]
    async fn test_tick_auto_closes_at_take_profit() {
        let (mut desk, _store) = desk(ReplayFeed::new().with_marks("EUR/USD", [dec!(103), dec!(105)]));
        desk.set_automation(true).await.unwrap();
        let id = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap().unwrap().id;

        let first = desk.tick(Utc::now()).await.unwrap();
        assert_eq!(first.marked, 1);
        assert!(first.closed.is_empty());
        assert_eq!(desk.ledger().get(&id).unwrap().current_price, dec!(103));

        let second = desk.tick(Utc::now()).await.unwrap();
        assert_eq!(second.closed.len(), 1);
        let closed = desk.ledger().get(&id).unwrap();
        assert!(closed.is_auto_closed);
        assert_eq!(closed.pnl, dec!(400));
        assert_eq!(desk.ledger().realized_profit(), dec!(400));
        assert_eq!(desk.notifications().latest().unwrap().severity, Severity::Success);
    }

    #[tokio::test]
    async fn test_threshold_mode_survives_config_flip() {
        let (mut desk, _store) = desk(ReplayFeed::new().with_marks("EUR/USD", [dec!(98)]));
        desk.set_automation(true).await.unwrap();
        let id = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap().unwrap().id;

        let risk = RiskConfig {
            is_percentage: false,
            ..desk.risk().clone()
        };
        desk.update_risk(risk).await.unwrap();

        // Read as a price level, a stop at 2 would never trigger at 98
        desk.tick(Utc::now()).await.unwrap();
        let position = desk.ledger().get(&id).unwrap();
        assert_eq!(position.threshold_mode, ThresholdMode::Percentage);
        assert_eq!(position.status, PositionStatus::Closed);
        assert_eq!(position.close_reason, Some(CloseReason::StopLoss));
    }

    #[tokio::test]
    async fn test_scanner_opens_on_first_tick_only() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(EngineConfig::default(), connected(&["oanda"]), ReplayFeed::new(), store);
        desk.set_automation(true).await.unwrap();

        let start = Utc::now();
        let first = desk.tick(start).await.unwrap();
        assert!(first.scanned.is_some());
        assert_eq!(desk.ledger().open_count(), 1);

        let second = desk.tick(start + chrono::Duration::seconds(3)).await.unwrap();
        assert!(second.scanned.is_none());

        let later = desk.tick(start + chrono::Duration::seconds(46)).await.unwrap();
        assert!(later.scanned.is_some() || desk.notifications().iter().any(|n| n.title == "Exposure Block"));
    }

    #[tokio::test]
    async fn test_scanner_needs_a_connected_broker() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(EngineConfig::default(), BrokerRegistry::from_catalog(), ReplayFeed::new(), store);
        desk.set_automation(true).await.unwrap();

        let report = desk.tick(Utc::now()).await.unwrap();
        assert!(report.scanned.is_none());
        // Skipped scans leave no failure notification
        assert!(desk.notifications().iter().all(|n| n.severity != Severity::Error));
    }

    #[tokio::test]
    async fn test_automation_notifications() {
        let (mut desk, _store) = desk(ReplayFeed::new());

        assert!(desk.toggle_automation().await.unwrap());
        let on = desk.notifications().latest().unwrap().clone();
        assert_eq!((on.title.as_str(), on.severity), ("GIX Neural On", Severity::Success));

        assert!(!desk.set_automation(true).await.unwrap());
        assert_eq!(desk.notifications().len(), 1);

        assert!(!desk.toggle_automation().await.unwrap());
        let off = desk.notifications().latest().unwrap();
        assert_eq!((off.title.as_str(), off.severity), ("GIX Neural Off", Severity::Warning));
    }

    #[tokio::test]
    async fn test_update_risk_clamps_and_validates() {
        let (mut desk, _store) = desk(ReplayFeed::new());

        let risk = desk
            .update_risk(RiskConfig { max_leverage: 500, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(risk.max_leverage, MAX_LEVERAGE_LIMIT);
        let note = desk.notifications().latest().unwrap();
        assert_eq!((note.title.as_str(), note.severity), ("Risk Profile Updated", Severity::Info));

        let risk = desk
            .update_risk(RiskConfig { max_leverage: 0, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(risk.max_leverage, 1);

        let err = desk
            .update_risk(RiskConfig { default_stop_loss: Decimal::ZERO, ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));
        assert_eq!(desk.risk().max_leverage, 1);
        assert_eq!(desk.notifications().len(), 2);
    }

    #[tokio::test]
    async fn test_authorization_and_disconnect() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(quiet_engine(), BrokerRegistry::from_catalog(), ReplayFeed::new(), store);

        let broker = desk.apply_authorization("kraken", "abcdefgh", "123456789012").await.unwrap();
        assert_eq!(broker.status, BrokerStatus::Connected);
        assert!(broker.metrics.balance >= dec!(2000));
        assert_eq!(desk.notifications().len(), 1);
        let note = desk.notifications().latest().unwrap();
        assert_eq!(note.severity, Severity::Success);
        assert!(note.message.contains(&broker.name));

        let rejected = desk.apply_authorization("oanda", "short", "x").await.unwrap();
        assert_eq!(rejected.status, BrokerStatus::Error);
        assert!(rejected.error_message.is_some());
        assert_eq!(desk.notifications().len(), 2);
        let note = desk.notifications().latest().unwrap();
        assert_eq!(note.severity, Severity::Error);
        assert!(note.title.contains(&rejected.name));
        assert_eq!(note.message, crate::broker::HANDSHAKE_ERROR);

        let broker = desk.disconnect_broker("kraken").await.unwrap();
        assert_eq!(broker.status, BrokerStatus::Disconnected);
        assert!(!desk.brokers().any_connected());
        assert_eq!(desk.notifications().len(), 3);
        let note = desk.notifications().latest().unwrap();
        assert_eq!((note.title.as_str(), note.severity), ("Broker Disconnected", Severity::Info));

        assert!(matches!(
            desk.disconnect_broker("nope").await,
            Err(BotError::BrokerNotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_broker_waits_out_handshake() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(quiet_engine(), BrokerRegistry::from_catalog(), ReplayFeed::new(), store);

        let started = tokio::time::Instant::now();
        let broker = desk.connect_broker("binance", "abcdefgh", "123456789012").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1800));
        assert!(broker.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_broker_refuses_empty_credentials_up_front() {
        let store = Arc::new(MemoryStore::new());
        let mut desk = desk_with(quiet_engine(), BrokerRegistry::from_catalog(), ReplayFeed::new(), Arc::clone(&store));

        let started = tokio::time::Instant::now();
        let err = desk.connect_broker("binance", "", "123456789012").await.unwrap_err();
        assert!(matches!(err, BotError::InvalidInput(_)));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(desk.brokers().get("binance").unwrap().status, BrokerStatus::Disconnected);
        assert!(desk.notifications().is_empty());
        assert_eq!(store.get(crate::storage::BROKERS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_memory_and_next_write_catches_up() {
        let store = Arc::new(FlakyStore::default());
        let state = PersistedState {
            brokers: connected(&["oanda"]),
            ..Default::default()
        };
        let mut desk = Desk::new(
            quiet_engine(),
            state,
            Arc::clone(&store) as Arc<dyn KvStore>,
            Box::new(ReplayFeed::new()),
            StdRng::seed_from_u64(42),
        );

        store.failing.store(true, Ordering::SeqCst);
        let err = desk.execute_signal(&buy("EUR/USD"), Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::Io(_)));
        let id = desk.ledger().positions()[0].id.clone();
        assert!(desk.ledger().get(&id).unwrap().is_open());
        assert_eq!(store.get(TRADES_KEY).await.unwrap(), None);

        store.failing.store(false, Ordering::SeqCst);
        desk.close_position(&id, Utc::now()).await.unwrap().unwrap();
        let saved = store.get(TRADES_KEY).await.unwrap().unwrap();
        assert!(saved.contains(&id));
        assert!(saved.contains("CLOSED"));
    }

    #[tokio::test]
    async fn test_execute_report_uses_quote_and_price_mode() {
        let feed = ReplayFeed::new().with_quote(AssetClass::Forex, dec!(200));
        let (mut desk, _store) = desk(feed);
        desk.update_risk(RiskConfig { is_percentage: false, ..Default::default() })
            .await
            .unwrap();

        let report = AnalysisReport {
            signal: TradeSignal::Sell,
            sentiment: Sentiment::Bearish,
            confidence: 77.0,
            indicators: None,
            summary: "Dollar strength".into(),
            suggested_sl: Some(dec!(1)),
            suggested_tp: Some(dec!(3)),
            headlines: vec![],
            sources: vec![],
        };

        let position = desk
            .execute_report(&report, "GBP/USD", AssetClass::Forex, None, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.side, Side::Sell);
        assert_eq!(position.entry_price, dec!(200));
        assert_eq!(position.stop_loss, dec!(202));
        assert_eq!(position.take_profit, dec!(194));
        assert_eq!(position.threshold_mode, ThresholdMode::Price);

        let hold = AnalysisReport { signal: TradeSignal::Hold, ..report };
        let none = desk
            .execute_report(&hold, "USD/JPY", AssetClass::Forex, None, Utc::now())
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_reload_restores_state() {
        let store = Arc::new(MemoryStore::new());
        let (ledger, brokers, risk) = {
            let mut desk = desk_with(
                quiet_engine(),
                connected(&["oanda"]),
                ReplayFeed::new(),
                Arc::clone(&store),
            );
            let id = desk.execute_signal(&buy("BTC"), Utc::now()).await.unwrap().unwrap().id;
            desk.execute_signal(&buy("ETH"), Utc::now()).await.unwrap();
            desk.close_position(&id, Utc::now()).await.unwrap();
            desk.update_risk(RiskConfig { max_leverage: 20, ..Default::default() })
                .await
                .unwrap();
            (desk.ledger().clone(), desk.brokers().clone(), desk.risk().clone())
        };

        let config = Config::default();
        let reopened = Desk::open(&config, store, Box::new(ReplayFeed::new()), Some(1)).await.unwrap();
        assert_eq!(reopened.ledger(), &ledger);
        assert_eq!(reopened.brokers(), &brokers);
        assert_eq!(reopened.risk(), &risk);
        // Notifications are session-only
        assert!(reopened.notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_serializes_commands_and_ticks() {
        let feed = ReplayFeed::new().with_marks("EUR/USD", [dec!(101), dec!(102), dec!(105)]);
        let (desk, _store) = desk(feed);
        let (handle, task) = spawn(desk);

        let position = handle.execute(buy("EUR/USD")).await.unwrap().unwrap();
        assert!(handle.set_automation(true).await.unwrap());

        // Three ticks at 3s each walk the script to take-profit
        tokio::time::sleep(Duration::from_millis(9_500)).await;
        let snapshot = handle.snapshot().await.unwrap();
        let closed = snapshot.positions.iter().find(|p| p.id == position.id).unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_eq!(snapshot.realized_profit, dec!(400));
        assert_eq!(snapshot.metrics.closed_positions, 1);

        handle.shutdown().await.unwrap();
        let desk = task.await.unwrap();
        assert!(desk.automation_enabled());
        assert!(matches!(handle.snapshot().await, Err(BotError::Shutdown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_does_not_tick_while_disabled() {
        let feed = ReplayFeed::new().with_marks("EUR/USD", [dec!(50)]);
        let (desk, _store) = desk(feed);
        let (handle, _task) = spawn(desk);

        handle.execute(buy("EUR/USD")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.metrics.open_positions, 1);
        assert_eq!(snapshot.positions[0].current_price, dec!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_connect_runs_handshake_outside_actor() {
        let store = Arc::new(MemoryStore::new());
        let desk = desk_with(quiet_engine(), BrokerRegistry::from_catalog(), ReplayFeed::new(), store);
        let (handle, _task) = spawn(desk);

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.connect_broker("ig", "abcdefgh", "123456789012").await }
        });
        tokio::task::yield_now().await;

        // The actor still answers while the handshake is pending
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.metrics.connected_brokers, 0);

        let broker = pending.await.unwrap().unwrap();
        assert!(broker.is_connected());
        assert_eq!(handle.snapshot().await.unwrap().metrics.connected_brokers, 1);

        assert!(matches!(
            handle.connect_broker("ig", "", "").await,
            Err(BotError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_round_trips_every_command() {
        let feed = ReplayFeed::new().with_quote(AssetClass::Stocks, dec!(250));
        let (desk, store) = desk(feed);
        let (handle, task) = spawn(desk);

        assert_eq!(handle.quote(AssetClass::Stocks).await.unwrap(), dec!(250));

        let report = AnalysisReport {
            signal: TradeSignal::Buy,
            sentiment: Sentiment::Bullish,
            confidence: 90.0,
            indicators: None,
            summary: "Breakout".into(),
            suggested_sl: None,
            suggested_tp: None,
            headlines: vec![],
            sources: vec![],
        };
        let position = handle
            .execute_report(report, "NVDA", AssetClass::Stocks, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.entry_price, dec!(250));

        let update = PositionUpdate {
            leverage: Some(4),
            ..Default::default()
        };
        assert_eq!(handle.update(&position.id, update).await.unwrap().leverage, 4);

        let risk = handle
            .update_risk(RiskConfig { max_leverage: 30, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(risk.max_leverage, 30);

        assert!(handle.toggle_automation().await.unwrap());
        assert!(handle.close(&position.id).await.unwrap().is_some());
        assert!(handle.close(&position.id).await.unwrap().is_none());
        assert!(!handle.disconnect_broker("oanda").await.unwrap().is_connected());

        handle.shutdown().await.unwrap();
        let desk = task.await.unwrap();
        assert!(!desk.brokers().any_connected());
        assert_eq!(desk.ledger().closed_positions().count(), 1);

        let reloaded = PersistedState::load(store.as_ref(), &RiskConfig::default(), false).await.unwrap();
        assert_eq!(reloaded.risk.max_leverage, 30);
        assert!(reloaded.risk.trading_enabled);
    }
}
