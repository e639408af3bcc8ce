//! Fill prices for resting levels.
//!
//! A level fills at its own price, unless the bar opens beyond it: a gapped
//! stop fills at the (worse) open, a gapped target at the (better) open.

use crate::domain::{Bar, PositionSide};

/// Exit fill for a stop-family level (stop-loss, breakeven, trailing).
pub fn stop_fill_price(side: PositionSide, level: f64, bar: &Bar) -> f64 {
    match side {
        PositionSide::Long if bar.open < level => bar.open,
        PositionSide::Short if bar.open > level => bar.open,
        _ => level,
    }
}

/// Exit fill for a profit target (take-profit, profit partials).
pub fn target_fill_price(side: PositionSide, level: f64, bar: &Bar) -> f64 {
    match side {
        PositionSide::Long if bar.open > level => bar.open,
        PositionSide::Short if bar.open < level => bar.open,
        _ => level,
    }
}
