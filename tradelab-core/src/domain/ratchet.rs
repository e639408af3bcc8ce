//! Ratchet invariant enforcement.
//!
//! **Core rule:** stops may tighten, never loosen.

use super::position::PositionSide;

/// Ratchet state for a protective stop level.
///
/// - Long positions: the level can only rise.
/// - Short positions: the level can only fall.
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    current_level: Option<f64>,
    side: PositionSide,
}

impl RatchetState {
    pub fn new(side: PositionSide) -> Self {
        Self {
            current_level: None,
            side,
        }
    }

    pub fn with_initial_level(side: PositionSide, initial_level: f64) -> Self {
        Self {
            current_level: Some(initial_level),
            side,
        }
    }

    /// Apply the ratchet to a proposed level and return the effective level.
    ///
    /// # Example
    /// ```
    /// use tradelab_core::domain::{PositionSide, RatchetState};
    ///
    /// let mut ratchet = RatchetState::with_initial_level(PositionSide::Long, 95.0);
    /// assert_eq!(ratchet.apply(100.0), 100.0); // tighten
    /// assert_eq!(ratchet.apply(90.0), 100.0); // loosening blocked
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let level = match self.current_level {
            None => proposed,
            Some(current) => match self.side {
                PositionSide::Long => current.max(proposed),
                PositionSide::Short => current.min(proposed),
            },
        };
        self.current_level = Some(level);
        level
    }

    pub fn current_level(&self) -> Option<f64> {
        self.current_level
    }

    /// Re-seed the level. Only used while the stop is still in its initial
    /// phase (scale-in recomputes the stop from the new average entry).
    pub(crate) fn reset(&mut self, level: Option<f64>) {
        self.current_level = level;
    }
}
