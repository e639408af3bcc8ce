//! Input validation: bar ordering, gap policy and signal alignment.
//!
//! Runs once before the bar loop. Structural problems fail fast with a
//! `DataError`; per-bar numeric holes degrade to "no signal" when the gap
//! policy allows it.

use crate::config::GapPolicy;
use crate::domain::{Bar, Signal};
use crate::error::DataError;

/// How the engine treats one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarStatus {
    Valid,
    /// NaN OHLC: no exits, no entries, equity carried forward.
    Void,
    /// First bar after an interval gap: prices are usable, its signal is not.
    AfterGap,
}

impl BarStatus {
    pub fn is_tradable(self) -> bool {
        !matches!(self, BarStatus::Void)
    }

    pub fn accepts_signal(self) -> bool {
        matches!(self, BarStatus::Valid)
    }
}

/// Validate bar ordering and sanity, and classify each bar under `policy`.
pub fn validate_bars(
    bars: &[Bar],
    policy: GapPolicy,
    max_interval_secs: Option<i64>,
) -> Result<Vec<BarStatus>, DataError> {
    let mut statuses = Vec::with_capacity(bars.len());

    for (index, bar) in bars.iter().enumerate() {
        let mut status = BarStatus::Valid;

        if let Some(prev) = index.checked_sub(1).map(|p| &bars[p]) {
            if bar.timestamp == prev.timestamp {
                return Err(DataError::DuplicateTimestamp {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if bar.timestamp < prev.timestamp {
                return Err(DataError::NonMonotonicTimestamp {
                    index,
                    previous: prev.timestamp,
                    current: bar.timestamp,
                });
            }
            if let Some(max) = max_interval_secs {
                let elapsed = (bar.timestamp - prev.timestamp).num_seconds();
                if elapsed > max {
                    match policy {
                        GapPolicy::Reject => {
                            return Err(DataError::Gap {
                                index,
                                reason: format!("{elapsed}s since previous bar exceeds {max}s"),
                            })
                        }
                        GapPolicy::PassThrough => status = BarStatus::AfterGap,
                    }
                }
            }
        }

        if bar.is_void() {
            match policy {
                GapPolicy::Reject => {
                    return Err(DataError::Gap {
                        index,
                        reason: "void bar (NaN price)".into(),
                    })
                }
                GapPolicy::PassThrough => status = BarStatus::Void,
            }
        } else if !bar.is_sane() {
            return Err(DataError::MalformedBar {
                index,
                reason: format!(
                    "inconsistent OHLCV o={} h={} l={} c={} v={}",
                    bar.open, bar.high, bar.low, bar.close, bar.volume
                ),
            });
        }

        statuses.push(status);
    }

    Ok(statuses)
}

/// Align a signal stream to the bar series by timestamp.
///
/// Signals must be strictly increasing and each must match a bar exactly.
/// Bars without a signal get `None`; signals with a NaN strength degrade to
/// `None` as well.
pub fn align_signals(bars: &[Bar], signals: &[Signal]) -> Result<Vec<Option<Signal>>, DataError> {
    let mut aligned = vec![None; bars.len()];
    let mut cursor = 0usize;

    for (index, signal) in signals.iter().enumerate() {
        if index > 0 && signal.timestamp <= signals[index - 1].timestamp {
            return Err(DataError::NonMonotonicSignal { index });
        }
        while cursor < bars.len() && bars[cursor].timestamp < signal.timestamp {
            cursor += 1;
        }
        match bars.get(cursor) {
            Some(bar) if bar.timestamp == signal.timestamp => {
                if signal.is_usable() {
                    aligned[cursor] = Some(signal.clone());
                }
            }
            _ => {
                return Err(DataError::UnalignedSignal {
                    timestamp: signal.timestamp,
                })
            }
        }
    }

    Ok(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalDirection;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn ts(day: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day)
    }

    fn bar(day: i64, close: f64) -> Bar {
        Bar::new(ts(day), close, close + 1.0, close - 1.0, close, 100.0)
    }

    #[test]
    fn duplicate_and_backwards_timestamps() {
        let bars = vec![bar(0, 10.0), bar(0, 11.0)];
        assert!(matches!(
            validate_bars(&bars, GapPolicy::Reject, None),
            Err(DataError::DuplicateTimestamp { index: 1, .. })
        ));
        let bars = vec![bar(1, 10.0), bar(0, 11.0)];
        assert!(matches!(
            validate_bars(&bars, GapPolicy::Reject, None),
            Err(DataError::NonMonotonicTimestamp { index: 1, .. })
        ));
    }

    #[test]
    fn malformed_bar_fails_fast() {
        let mut bad = bar(1, 10.0);
        bad.high = 5.0;
        assert!(matches!(
            validate_bars(&[bar(0, 10.0), bad], GapPolicy::PassThrough, None),
            Err(DataError::MalformedBar { index: 1, .. })
        ));
    }

    #[test]
    fn void_bar_policy() {
        let mut void = bar(1, 10.0);
        void.close = f64::NAN;
        let bars = vec![bar(0, 10.0), void, bar(2, 10.0)];
        assert!(matches!(
            validate_bars(&bars, GapPolicy::Reject, None),
            Err(DataError::Gap { index: 1, .. })
        ));
        let statuses = validate_bars(&bars, GapPolicy::PassThrough, None).unwrap();
        assert_eq!(statuses, vec![BarStatus::Valid, BarStatus::Void, BarStatus::Valid]);
    }

    #[test]
    fn interval_gap_policy() {
        let bars = vec![bar(0, 10.0), bar(1, 10.0), bar(5, 10.0)];
        let day = 86_400;
        assert!(validate_bars(&bars, GapPolicy::Reject, Some(day)).is_err());
        let statuses = validate_bars(&bars, GapPolicy::PassThrough, Some(day)).unwrap();
        assert_eq!(statuses[2], BarStatus::AfterGap);
        assert!(statuses[2].is_tradable());
        assert!(!statuses[2].accepts_signal());
    }

    #[test]
    fn signals_align_by_timestamp() {
        let bars: Vec<Bar> = (0..5).map(|d| bar(d, 10.0)).collect();
        let signals = vec![
            Signal::new(ts(1), SignalDirection::Long),
            Signal::new(ts(3), SignalDirection::Flat).with_strength(f64::NAN),
            Signal::new(ts(4), SignalDirection::Short),
        ];
        let aligned = align_signals(&bars, &signals).unwrap();
        assert!(aligned[0].is_none());
        assert_eq!(aligned[1].as_ref().map(|s| s.direction), Some(SignalDirection::Long));
        // NaN strength degrades to no signal.
        assert!(aligned[3].is_none());
        assert_eq!(aligned[4].as_ref().map(|s| s.direction), Some(SignalDirection::Short));
    }

    #[test]
    fn unaligned_and_unordered_signals_rejected() {
        let bars: Vec<Bar> = (0..3).map(|d| bar(d * 2, 10.0)).collect();
        assert!(matches!(
            align_signals(&bars, &[Signal::new(ts(1), SignalDirection::Long)]),
            Err(DataError::UnalignedSignal { .. })
        ));
        let unordered = vec![
            Signal::new(ts(2), SignalDirection::Long),
            Signal::new(ts(0), SignalDirection::Flat),
        ];
        assert!(matches!(
            align_signals(&bars, &unordered),
            Err(DataError::NonMonotonicSignal { index: 1 })
        ));
    }
}
