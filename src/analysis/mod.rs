//! Market analysis
//!
//! An external LLM produces a sentiment/signal report for a symbol. The
//! desk only reads the signal and the suggested thresholds; everything else
//! is for display. Provider failures never reach the caller as errors: they
//! are logged and reported as "unavailable".

pub mod llm;


pub use llm::LlmAnalyst;

use crate::config::RiskConfig;
use crate::error::Result;
use crate::types::{AssetClass, Side, SignalOrder, ThresholdMode};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

/// Recommended action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSignal {
    Buy,
    Sell,
    Hold,
}

impl TradeSignal {
    pub fn side(&self) -> Option<Side> {
        match self {
            TradeSignal::Buy => Some(Side::Buy),
            TradeSignal::Sell => Some(Side::Sell),
            TradeSignal::Hold => None,
        }
    }
}

impl FromStr for TradeSignal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeSignal::Buy),
            "SELL" | "SHORT" => Ok(TradeSignal::Sell),
            "HOLD" | "NEUTRAL" | "WAIT" => Ok(TradeSignal::Hold),
            other => Err(format!("unknown signal '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for TradeSignal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BULLISH" => Ok(Sentiment::Bullish),
            "BEARISH" => Ok(Sentiment::Bearish),
            "NEUTRAL" | "MIXED" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub macd: Option<String>,
}

/// A web source the analysis was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub uri: String,
    #[serde(default)]
    pub title: String,
}

/// Structured report returned by an analysis provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub signal: TradeSignal,
    pub sentiment: Sentiment,
    /// 0-100
    pub confidence: f64,
    #[serde(default)]
    pub indicators: Option<Indicators>,
    pub summary: String,
    /// Stop-loss magnitude, percent
    #[serde(default, rename = "suggestedSL")]
    pub suggested_sl: Option<Decimal>,
    /// Take-profit magnitude, percent
    #[serde(default, rename = "suggestedTP")]
    pub suggested_tp: Option<Decimal>,
    #[serde(default)]
    pub headlines: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

impl AnalysisReport {
    /// Build a trade ticket at `price`. `side` overrides the report's own
    /// signal; without an override a HOLD produces no ticket.
    ///
    /// Suggested thresholds are magnitudes in percent. They pass through as-is
    /// in percentage mode and become direction-aware price levels otherwise.
    pub fn ticket(&self, symbol: &str, price: Decimal, side: Option<Side>, risk: &RiskConfig) -> Option<SignalOrder> {
        let side = side.or_else(|| self.signal.side())?;
        let (stop_loss, take_profit) = match ThresholdMode::from_flag(risk.is_percentage) {
            ThresholdMode::Percentage => (self.suggested_sl, self.suggested_tp),
            ThresholdMode::Price => (
                self.suggested_sl.map(|sl| level(price, side, -sl)),
                self.suggested_tp.map(|tp| level(price, side, tp)),
            ),
        };
        Some(SignalOrder::new(side, symbol, price).with_thresholds(stop_loss, take_profit))
    }
}

/// Price `pct` percent in the favorable direction from `price`
fn level(price: Decimal, side: Side, pct: Decimal) -> Decimal {
    price * (Decimal::ONE + side.sign() * pct / Decimal::ONE_HUNDRED)
}

/// Source of market analysis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, symbol: &str, class: AssetClass) -> Result<AnalysisReport>;

    fn name(&self) -> &str;
}

/// What a caller gets back from the analysis desk
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Ready(AnalysisReport),
    /// Provider failed; render a neutral state
    Unavailable,
    /// A request for this symbol is already outstanding
    Busy,
}

impl AnalysisOutcome {
    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisOutcome::Ready(report) => Some(report),
            _ => None,
        }
    }
}

/// Front for an analysis provider that refuses overlapping requests for
/// the same symbol
pub struct AnalysisDesk {
    provider: Arc<dyn AnalysisProvider>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl AnalysisDesk {
    pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
        Self {
            provider,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_analyzing(&self, symbol: &str) -> bool {
        self.in_flight.lock().contains(symbol)
    }

    /// Run one analysis. Dropping the returned future releases the symbol
    /// and discards whatever the provider would have returned.
    pub async fn request(&self, symbol: &str, class: AssetClass) -> AnalysisOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight, symbol) else {
            tracing::debug!("Analysis for {} already in flight", symbol);
            return AnalysisOutcome::Busy;
        };

        tracing::info!("Analyzing {} ({}) via {}", symbol, class, self.provider.name());
        match self.provider.analyze(symbol, class).await {
            Ok(report) => {
                tracing::info!(
                    "{}: {} / {} ({:.0}% confidence)",
                    symbol,
                    match report.signal {
                        TradeSignal::Buy => "BUY",
                        TradeSignal::Sell => "SELL",
                        TradeSignal::Hold => "HOLD",
                    },
                    match report.sentiment {
                        Sentiment::Bullish => "📈 bullish",
                        Sentiment::Bearish => "📉 bearish",
                        Sentiment::Neutral => "➡️ neutral",
                    },
                    report.confidence
                );
                AnalysisOutcome::Ready(report)
            }
            Err(e) => {
                tracing::error!("Analysis failed for {}: {}", symbol, e);
                AnalysisOutcome::Unavailable
            }
        }
    }
}

struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    symbol: String,
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, symbol: &str) -> Option<Self> {
        if !set.lock().insert(symbol.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            symbol: symbol.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.lock().remove(&self.symbol);
    }
}
