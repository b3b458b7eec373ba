//! Autonomous signal scanner
//!
//! While automation is on, the desk asks the scanner on every tick whether a
//! scan is due. A due scan draws a random asset, direction and price; it
//! bypasses the analysis provider entirely.


use crate::config::{EngineConfig, MAX_SCAN_INTERVAL_MS};
use crate::market::catalog;
use crate::types::{AssetClass, Side, SignalOrder};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::prelude::*;

#[derive(Debug, Clone)]
pub struct SignalScanner {
    interval: Duration,
    max_open: usize,
    last_scan: Option<DateTime<Utc>>,
}

impl SignalScanner {
    pub fn new(interval: Duration, max_open: usize) -> Self {
        Self {
            interval,
            max_open,
            last_scan: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::milliseconds(config.scan_interval_ms.min(MAX_SCAN_INTERVAL_MS) as i64),
            config.scan_max_open,
        )
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.last_scan
    }

    /// The first call is always due
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_scan {
            None => true,
            Some(last) => now - last > self.interval,
        }
    }

    /// Run a scan if one is due. The scan clock restarts whether or not the
    /// drawn signal is tradable; `None` means no scan or no trade.
    pub fn poll<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        open_positions: usize,
        any_connected: bool,
        rng: &mut R,
    ) -> Option<SignalOrder> {
        if !self.is_due(now) {
            return None;
        }
        self.last_scan = Some(now);

        let order = draw_signal(rng);
        if open_positions >= self.max_open || !any_connected {
            tracing::debug!(
                "Scan drew {} {} but skipped (open={}, connected={})",
                order.side,
                order.symbol,
                open_positions,
                any_connected
            );
            return None;
        }

        tracing::debug!("Scan signal: {} {} @ {}", order.side, order.symbol, order.price);
        Some(order)
    }
}

/// Random category, asset, direction and a price in a wide plausible range
pub fn draw_signal<R: Rng + ?Sized>(rng: &mut R) -> SignalOrder {
    let class = AssetClass::ALL[rng.random_range(0..AssetClass::ALL.len())];
    let symbols = catalog::symbols(class);
    let symbol = symbols[rng.random_range(0..symbols.len())];
    let side = if rng.random::<f64>() > 0.5 { Side::Buy } else { Side::Sell };
    let price = Decimal::from_f64(100.0 + rng.random::<f64>() * 50_000.0)
        .unwrap_or(Decimal::ONE_HUNDRED)
        .round_dp(2);
    SignalOrder::new(side, symbol, price)
}
