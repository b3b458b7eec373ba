//! Market data
//!
//! Prices are synthetic. The risk engine only sees the [`PriceFeed`] trait,
//! so the random walk can be swapped for a recorded or live feed.

pub mod catalog;


use crate::config::EngineConfig;
use crate::types::AssetClass;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};

/// Decimal places kept on simulated prices
pub const PRICE_DP: u32 = 8;

/// Source of prices for open positions and trade tickets
pub trait PriceFeed: Send + Sync {
    /// Next mark for `symbol`, given its current price
    fn next_price(&mut self, symbol: &str, current: Decimal) -> Decimal;

    /// Indicative price for a fresh ticket in `class`
    fn quote(&mut self, class: AssetClass) -> Decimal;

    fn name(&self) -> &str;
}

/// Multiplicative random walk with a configurable drift center
pub struct RandomWalkFeed {
    rng: StdRng,
    volatility: f64,
    drift_center: f64,
}

impl RandomWalkFeed {
    pub fn new(volatility: f64, drift_center: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, volatility, drift_center }
    }

    pub fn from_config(config: &EngineConfig, seed: Option<u64>) -> Self {
        Self::new(config.volatility, config.drift_center, seed)
    }

    /// One multiplicative step: `(u - center) * volatility`, u in [0, 1)
    pub fn drift(&mut self) -> f64 {
        (self.rng.random::<f64>() - self.drift_center) * self.volatility
    }

    /// Mean of the per-step drift; negative when the center sits above 0.5
    pub fn expected_drift(&self) -> f64 {
        (0.5 - self.drift_center) * self.volatility
    }
}

impl PriceFeed for RandomWalkFeed {
    fn next_price(&mut self, _symbol: &str, current: Decimal) -> Decimal {
        let drift = Decimal::from_f64(self.drift()).unwrap_or_default();
        // Holds the last mark if the step would overflow
        current
            .checked_mul(Decimal::ONE + drift)
            .unwrap_or(current)
            .round_dp(PRICE_DP)
    }

    fn quote(&mut self, class: AssetClass) -> Decimal {
        let u = self.rng.random::<f64>();
        let raw = match class {
            AssetClass::Crypto => 50_000.0 + u * 5_000.0,
            AssetClass::Forex | AssetClass::Stocks => 1.0 + u * 100.0,
        };
        Decimal::from_f64(raw).unwrap_or(Decimal::ONE_HUNDRED).round_dp(PRICE_DP)
    }

    fn name(&self) -> &str {
        "random-walk"
    }
}

/// Plays back scripted marks per symbol; holds the last price once a
/// script runs out
#[derive(Debug, Default)]
pub struct ReplayFeed {
    marks: HashMap<String, VecDeque<Decimal>>,
    quotes: HashMap<AssetClass, Decimal>,
}

impl ReplayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marks(mut self, symbol: &str, marks: impl IntoIterator<Item = Decimal>) -> Self {
        self.push_marks(symbol, marks);
        self
    }

    pub fn with_quote(mut self, class: AssetClass, price: Decimal) -> Self {
        self.quotes.insert(class, price);
        self
    }

    pub fn push_marks(&mut self, symbol: &str, marks: impl IntoIterator<Item = Decimal>) {
        self.marks.entry(symbol.to_string()).or_default().extend(marks);
    }

    pub fn remaining(&self, symbol: &str) -> usize {
        self.marks.get(symbol).map(VecDeque::len).unwrap_or(0)
    }
}

impl PriceFeed for ReplayFeed {
    fn next_price(&mut self, symbol: &str, current: Decimal) -> Decimal {
        self.marks
            .get_mut(symbol)
            .and_then(VecDeque::pop_front)
            .unwrap_or(current)
    }

    fn quote(&mut self, class: AssetClass) -> Decimal {
        self.quotes.get(&class).copied().unwrap_or(dec!(100))
    }

    fn name(&self) -> &str {
        "replay"
    }
}
