//! Trade: an immutable record of a closed (or partially closed) position.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::order::ExitReason;
use super::position::PositionSide;

/// Costs attached to one realized slice of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeCosts {
    pub commission: f64,
    pub slippage: f64,
    /// Remaining margin forfeited on liquidation. Zero for every other exit.
    pub liquidation_fee: f64,
}

impl TradeCosts {
    pub fn total(&self) -> f64 {
        self.commission + self.slippage + self.liquidation_fee
    }
}

/// Realized PnL of a slice: `(gross, net)`.
///
/// `gross = side × (exit − entry) × size`, `net = gross − costs`. Every caller
/// (engine, partial closes, liquidations) goes through this one function.
pub fn realized_pnl(
    side: PositionSide,
    entry_price: f64,
    exit_price: f64,
    size: f64,
    costs: &TradeCosts,
) -> (f64, f64) {
    let gross = side.sign() * (exit_price - entry_price) * size;
    (gross, gross - costs.total())
}

/// A complete round-trip (or partial) trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub side: PositionSide,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    /// Size-weighted average entry price at the time of exit.
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// True when the position stayed open after this slice was realized.
    pub partial: bool,

    // ── Size ──
    pub size: f64,
    pub leverage: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub commission: f64,
    pub slippage: f64,
    pub liquidation_fee: f64,
    pub net_pnl: f64,

    // ── Duration ──
    pub bars_held: usize,

    // ── Excursion ──
    /// Maximum adverse excursion (worst unrealized PnL, <= 0) on this slice.
    pub mae: f64,
    /// Maximum favorable excursion (best unrealized PnL, >= 0) on this slice.
    pub mfe: f64,
}

impl Trade {
    /// Return on the margin committed to this slice.
    pub fn return_on_margin(&self) -> f64 {
        let margin = self.entry_price * self.size / self.leverage.max(1e-12);
        if margin <= 0.0 {
            return 0.0;
        }
        self.net_pnl / margin
    }

    /// Notional at entry.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.size
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }

    /// Strictly negative net PnL. Breakeven trades are neither.
    pub fn is_loser(&self) -> bool {
        self.net_pnl < 0.0
    }

    pub fn pnl_before_costs(&self) -> f64 {
        self.gross_pnl
    }
}
