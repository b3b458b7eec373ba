//! Paper trading
//!
//! Simulated positions, the ledger that owns them, and the risk engine
//! that marks them to a synthetic feed.

mod auto_trader;
mod ledger;
mod position;


pub use auto_trader::{AutoCloseResult, AutoTrader};
pub use ledger::{validate_thresholds, Ledger, PositionUpdate};
pub use position::{CloseReason, Mark, Position, PositionStatus, PNL_DP};
