//! Static broker catalog

use crate::types::AssetClass;

pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub asset_class: AssetClass,
}

pub const BROKERS: &[CatalogEntry] = &[
    CatalogEntry { id: "oanda", name: "OANDA", asset_class: AssetClass::Forex },
    CatalogEntry { id: "pepperstone", name: "Pepperstone", asset_class: AssetClass::Forex },
    CatalogEntry { id: "fxtm", name: "FXTM", asset_class: AssetClass::Forex },
    CatalogEntry { id: "ig", name: "IG Group", asset_class: AssetClass::Forex },
    CatalogEntry { id: "ib", name: "Interactive Brokers", asset_class: AssetClass::Stocks },
    CatalogEntry { id: "xm", name: "XM", asset_class: AssetClass::Forex },
    CatalogEntry { id: "fxcm", name: "FXCM", asset_class: AssetClass::Forex },
    CatalogEntry { id: "exness", name: "Exness", asset_class: AssetClass::Forex },
    CatalogEntry { id: "luno", name: "Luno", asset_class: AssetClass::Crypto },
    CatalogEntry { id: "binance", name: "Binance", asset_class: AssetClass::Crypto },
    CatalogEntry { id: "kucoin", name: "KuCoin", asset_class: AssetClass::Crypto },
    CatalogEntry { id: "kraken", name: "Kraken", asset_class: AssetClass::Crypto },
    CatalogEntry { id: "tradier", name: "Tradier", asset_class: AssetClass::Stocks },
];
