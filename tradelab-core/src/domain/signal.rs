//! Signals: timestamp-aligned trade direction produced by a strategy.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Bar;

/// Desired exposure emitted by a strategy at a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalDirection {
    Long,
    Short,
    Flat,
}

impl SignalDirection {
    /// +1 for long, -1 for short, 0 for flat.
    pub fn sign(self) -> f64 {
        match self {
            SignalDirection::Long => 1.0,
            SignalDirection::Short => -1.0,
            SignalDirection::Flat => 0.0,
        }
    }
}

/// A single signal aligned to a bar timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: NaiveDateTime,
    pub direction: SignalDirection,
    /// Optional conviction in `[0, 1]`. NaN strength degrades to "no signal".
    pub strength: Option<f64>,
}

impl Signal {
    pub fn new(timestamp: NaiveDateTime, direction: SignalDirection) -> Self {
        Self {
            timestamp,
            direction,
            strength: None,
        }
    }

    pub fn with_strength(mut self, strength: f64) -> Self {
        self.strength = Some(strength);
        self
    }

    /// A signal is usable when its strength (if any) is a finite number.
    pub fn is_usable(&self) -> bool {
        self.strength.map_or(true, f64::is_finite)
    }
}

/// Pluggable strategy component that turns a bar series into signals.
///
/// Implementations must only look at `bars[..=i]` when emitting the signal
/// for bar `i`. The engine executes at that bar's close or the next bar's
/// open, never earlier.
pub trait SignalGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Bars needed before the first meaningful signal.
    fn warmup_bars(&self) -> usize {
        0
    }

    /// Produce the signal stream for `bars`. Bars with no opinion may be
    /// omitted; omitted bars are treated as "no signal".
    fn generate(&self, bars: &[Bar]) -> Vec<Signal>;
}

/// Generator that never emits anything. Useful as a baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSignal;

impl SignalGenerator for NullSignal {
    fn name(&self) -> &str {
        "null"
    }

    fn generate(&self, _bars: &[Bar]) -> Vec<Signal> {
        Vec::new()
    }
}
