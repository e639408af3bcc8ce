//! Orders: ephemeral intents derived from position rules and signals.
//!
//! An order is created and consumed within the bar that triggers it. Nothing
//! rests in a book between bars except the single pending next-open action
//! carried by the engine state.

use serde::{Deserialize, Serialize};

use super::position::PositionSide;

/// Why a position (or a slice of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Breakeven,
    TimeExit,
    PartialClose,
    Liquidation,
    Signal,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::Breakeven => "breakeven",
            ExitReason::TimeExit => "time_exit",
            ExitReason::PartialClose => "partial_close",
            ExitReason::Liquidation => "liquidation",
            ExitReason::Signal => "signal",
            ExitReason::EndOfData => "end_of_data",
        }
    }

    /// Protective exits that rest at a price level (stop family).
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            ExitReason::StopLoss | ExitReason::TrailingStop | ExitReason::Breakeven
        )
    }
}

/// What an order does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Open a new position.
    Entry(PositionSide),
    /// Add to an open position (DCA).
    ScaleIn,
    /// Reduce or close the open position.
    Exit(ExitReason),
}

/// An order ready to fill at `price` for `fraction` of the current size
/// (entries carry the absolute `size` instead).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub kind: OrderKind,
    pub price: f64,
    /// Fraction of the open size to close (exits): 1.0 closes everything.
    pub fraction: f64,
    /// Absolute size to open (entries and scale-ins).
    pub size: f64,
}

impl Order {
    pub fn exit(reason: ExitReason, price: f64) -> Self {
        Self {
            kind: OrderKind::Exit(reason),
            price,
            fraction: 1.0,
            size: 0.0,
        }
    }

    pub fn partial_exit(price: f64, fraction: f64) -> Self {
        Self {
            kind: OrderKind::Exit(ExitReason::PartialClose),
            price,
            fraction: fraction.clamp(0.0, 1.0),
            size: 0.0,
        }
    }

    pub fn entry(side: PositionSide, price: f64, size: f64) -> Self {
        Self {
            kind: OrderKind::Entry(side),
            price,
            fraction: 1.0,
            size,
        }
    }

    pub fn scale_in(price: f64, size: f64) -> Self {
        Self {
            kind: OrderKind::ScaleIn,
            price,
            fraction: 1.0,
            size,
        }
    }

    pub fn is_full_exit(&self) -> bool {
        matches!(self.kind, OrderKind::Exit(_)) && self.fraction >= 1.0
    }
}
