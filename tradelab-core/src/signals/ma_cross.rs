//! Moving average crossover signal: golden cross and death cross detection.
//!
//! Emits Long when the fast SMA crosses above the slow SMA and Short (or Flat
//! in long-only mode) when it crosses below. Bars without a cross emit nothing.

use crate::domain::{Bar, Signal, SignalDirection, SignalGenerator};
use crate::error::ConfigError;
use crate::indicators::{Indicator, Sma};

/// Moving average crossover signal generator.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: Sma,
    slow: Sma,
    emit_short: bool,
}

impl MaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, ConfigError> {
        if fast_period < 1 {
            return Err(ConfigError::invalid("fast_period", "must be >= 1"));
        }
        if slow_period <= fast_period {
            return Err(ConfigError::invalid(
                "slow_period",
                format!("must be > fast_period ({fast_period}), got {slow_period}"),
            ));
        }
        Ok(Self {
            fast: Sma::new(fast_period),
            slow: Sma::new(slow_period),
            emit_short: true,
        })
    }

    /// Emit Flat instead of Short on a death cross.
    pub fn long_only(mut self) -> Self {
        self.emit_short = false;
        self
    }

    pub fn fast_period(&self) -> usize {
        self.fast.period()
    }

    pub fn slow_period(&self) -> usize {
        self.slow.period()
    }
}

impl SignalGenerator for MaCrossover {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn warmup_bars(&self) -> usize {
        self.slow.period()
    }

    fn generate(&self, bars: &[Bar]) -> Vec<Signal> {
        let fast = self.fast.compute(bars);
        let slow = self.slow.compute(bars);
        let bearish = if self.emit_short {
            SignalDirection::Short
        } else {
            SignalDirection::Flat
        };

        let mut signals = Vec::new();
        for t in 1..bars.len() {
            let (fp, sp, fc, sc) = (fast[t - 1], slow[t - 1], fast[t], slow[t]);
            if [fp, sp, fc, sc].iter().any(|v| v.is_nan()) {
                continue;
            }
            let direction = if fp <= sp && fc > sc {
                SignalDirection::Long
            } else if fp >= sp && fc < sc {
                bearish
            } else {
                continue;
            };
            signals.push(Signal::new(bars[t].timestamp, direction));
        }
        signals
    }
}
