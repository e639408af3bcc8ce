//! Path policy: resolve bars whose range reaches both the stop and the target.
//!
//! Bar data carries no intrabar path, so the tie is settled by
//! `ExitPriority`. A level the bar *opens* beyond always wins: the path
//! starts at the open.

use crate::config::ExitPriority;
use crate::domain::{Bar, PositionSide};

/// Which protective level the bar reached first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitHit {
    Stop,
    Target,
}

fn stop_reached(side: PositionSide, level: f64, high: f64, low: f64) -> bool {
    match side {
        PositionSide::Long => low <= level,
        PositionSide::Short => high >= level,
    }
}

fn target_reached(side: PositionSide, level: f64, high: f64, low: f64) -> bool {
    match side {
        PositionSide::Long => high >= level,
        PositionSide::Short => low <= level,
    }
}

/// Decide which (if any) of the stop and target levels fires on `bar`.
pub fn resolve_exit(
    priority: ExitPriority,
    side: PositionSide,
    bar: &Bar,
    stop: Option<f64>,
    target: Option<f64>,
) -> Option<ExitHit> {
    let stop_hit = stop.is_some_and(|s| stop_reached(side, s, bar.high, bar.low));
    let target_hit = target.is_some_and(|t| target_reached(side, t, bar.high, bar.low));

    match (stop_hit, target_hit) {
        (false, false) => None,
        (true, false) => Some(ExitHit::Stop),
        (false, true) => Some(ExitHit::Target),
        (true, true) => {
            if stop.is_some_and(|s| stop_reached(side, s, bar.open, bar.open)) {
                return Some(ExitHit::Stop);
            }
            if target.is_some_and(|t| target_reached(side, t, bar.open, bar.open)) {
                return Some(ExitHit::Target);
            }
            Some(match priority {
                ExitPriority::StopLossFirst => ExitHit::Stop,
                ExitPriority::TakeProfitFirst => ExitHit::Target,
                ExitPriority::OhlcPath => {
                    // Open → High → Low → Close when the open sits closer to the high.
                    let high_first = (bar.open - bar.high).abs() <= (bar.open - bar.low).abs();
                    match (side, high_first) {
                        (PositionSide::Long, true) | (PositionSide::Short, false) => ExitHit::Target,
                        (PositionSide::Long, false) | (PositionSide::Short, true) => ExitHit::Stop,
                    }
                }
            })
        }
    }
}
