//! Equity curve points.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Account state at the end of one bar.
///
/// `equity` is realized equity: it only moves when a trade (or partial slice)
/// closes. `mark_to_market` adds the unrealized PnL of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub mark_to_market: f64,
    pub used_margin: f64,
}

impl EquityPoint {
    /// Capital not tied up as margin.
    pub fn free_capital(&self) -> f64 {
        self.equity - self.used_margin
    }
}
