//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Lookback: period (TR[0] has no previous close and is skipped).

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    /// `period` is clamped to at least 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Compute the True Range series from bars.
/// TR[0] = high[0] - low[0] (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let hl = bar.high - bar.low;
        let value = match i.checked_sub(1).map(|p| bars[p].close) {
            Some(pc) => hl.max((bar.high - pc).abs()).max((bar.low - pc).abs()),
            None => hl,
        };
        // f64::max ignores NaN operands, so propagate explicitly.
        let any_nan = bar.high.is_nan()
            || bar.low.is_nan()
            || (i > 0 && bars[i - 1].close.is_nan());
        tr.push(if any_nan { f64::NAN } else { value });
    }
    tr
}

/// Wilder smoothing with alpha = 1/period.
///
/// The seed is the mean of the first `period` consecutive valid values. A NaN
/// resets the state and the series reseeds after `period` fresh values.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if period == 0 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut prev: Option<f64> = None;
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            prev = None;
            seed_sum = 0.0;
            seed_count = 0;
            continue;
        }
        match prev {
            Some(p) => {
                let smoothed = alpha * v + (1.0 - alpha) * p;
                result[i] = smoothed;
                prev = Some(smoothed);
            }
            None => {
                seed_sum += v;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    result[i] = seed;
                    prev = Some(seed);
                }
            }
        }
    }

    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut tr = true_range(bars);
        if let Some(first) = tr.first_mut() {
            *first = f64::NAN;
        }
        wilder_smooth(&tr, self.period)
    }
}
