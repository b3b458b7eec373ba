//! Gentle GIX trading desk
//!
//! A simulated multi-broker desk: brokers are authorized by a mock
//! handshake, positions are paper positions walked by a random-walk risk
//! engine, and an LLM provides optional market analysis.
//!
//! ## Architecture
//!
//! ```text
//! Scanner / CLI / Analysis → Executor → Ledger ← AutoTrader (tick) ← PriceFeed
//!                               ↑                      ↓
//!                        BrokerRegistry        NotificationLog
//!                               └──── Desk (actor) ───→ KvStore
//! ```

pub mod analysis;
pub mod broker;
pub mod config;
pub mod desk;
pub mod error;
pub mod executor;
pub mod market;
pub mod monitor;
pub mod notify;
pub mod paper;
pub mod scanner;
pub mod storage;
pub mod types;

#[cfg(test)]
mod config_tests;
