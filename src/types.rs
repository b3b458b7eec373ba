//! Core types shared across the desk

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for BUY, -1 for SELL. Multiplies a raw price change so that a
    /// favorable move is always positive.
    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" | "LONG" => Ok(Side::Buy),
            "SELL" | "SHORT" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}'", other)),
        }
    }
}

/// Asset class a broker serves and a symbol belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    Forex,
    Crypto,
    Stocks,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Forex, AssetClass::Stocks, AssetClass::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Forex => "FOREX",
            AssetClass::Crypto => "CRYPTO",
            AssetClass::Stocks => "STOCKS",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FOREX" | "FX" => Ok(AssetClass::Forex),
            "CRYPTO" => Ok(AssetClass::Crypto),
            "STOCKS" | "STOCK" | "EQUITY" => Ok(AssetClass::Stocks),
            other => Err(format!("unknown asset class '{}'", other)),
        }
    }
}

/// How stop-loss / take-profit values are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThresholdMode {
    /// Magnitudes in percent of the entry price
    Percentage,
    /// Absolute price levels
    Price,
}

impl ThresholdMode {
    pub fn from_flag(is_percentage: bool) -> Self {
        if is_percentage {
            ThresholdMode::Percentage
        } else {
            ThresholdMode::Price
        }
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMode::Percentage => write!(f, "%"),
            ThresholdMode::Price => write!(f, "px"),
        }
    }
}

/// A request to open a position, as handed to the execution rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalOrder {
    pub side: Side,
    pub symbol: String,
    pub price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl SignalOrder {
    pub fn new(side: Side, symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            side,
            symbol: symbol.into(),
            price,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn with_thresholds(mut self, stop_loss: Option<Decimal>, take_profit: Option<Decimal>) -> Self {
        self.stop_loss = stop_loss;
        self.take_profit = take_profit;
        self
    }
}
