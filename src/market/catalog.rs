//! Tradable symbols per asset class

use crate::types::AssetClass;

pub const FOREX: &[&str] = &[
    "EUR/USD", "GBP/USD", "USD/JPY", "AUD/USD", "USD/CAD",
    "USD/CHF", "NZD/USD", "EUR/GBP", "EUR/JPY", "GBP/JPY",
    "AUD/JPY", "EUR/AUD", "EUR/CAD", "GBP/CAD", "AUD/NZD",
];

pub const STOCKS: &[&str] = &[
    "AAPL", "TSLA", "NVDA", "AMZN", "MSFT",
    "GOOGL", "META", "AMD", "NFLX", "BRK.B",
    "V", "JPM", "UNH", "WMT", "DIS",
];

pub const CRYPTO: &[&str] = &[
    "BTC", "ETH", "SOL", "BNB", "XRP",
    "ADA", "DOT", "DOGE", "AVAX", "LINK",
    "SHIB", "MATIC", "TRX", "LTC", "UNI",
];

pub fn symbols(class: AssetClass) -> &'static [&'static str] {
    match class {
        AssetClass::Forex => FOREX,
        AssetClass::Stocks => STOCKS,
        AssetClass::Crypto => CRYPTO,
    }
}

/// Catalog category of a symbol, if it is listed
pub fn asset_class_of(symbol: &str) -> Option<AssetClass> {
    AssetClass::ALL
        .into_iter()
        .find(|class| symbols(*class).iter().any(|s| s.eq_ignore_ascii_case(symbol)))
}
