//! Walk-forward optimization: in-sample grid search, out-of-sample replay.
//!
//! The bar series is cut into temporally ordered windows. For each window
//! the grid optimizer runs on the in-sample (IS) part, and the top-ranked
//! parameters are replayed unmodified on the out-of-sample (OOS) part that
//! follows it. OOS segments never overlap and always start at or after the
//! end of their own IS segment.
//!
//! Window geometry (`window_len` covers IS + OOS):
//! - Rolling: window `i` spans `[i·step, i·step + window_len)`.
//! - Anchored: IS always starts at bar 0; the window end advances by `step`.
//!
//! Window count = `(bars - window_len) / step + 1`.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tradelab_core::domain::{Bar, EquityPoint, Trade};
use tradelab_core::{ConfigError, EngineConfig, ParamSet, RunResult};

use crate::cancel::CancelToken;
use crate::grid::{GridConfig, GridOptimizer};
use crate::metrics::{mean_f64, PerformanceMetrics};
use crate::runner::run_combination;
use crate::scoring::Scorer;
use crate::strategy::StrategyFactory;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WindowMode {
    #[default]
    Rolling,
    Anchored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    pub mode: WindowMode,
    /// Bars per window, IS + OOS.
    pub window_len: usize,
    pub step: usize,
    /// OOS bars per window. Defaults to `step`; may not exceed it.
    pub oos_len: Option<usize>,
    /// Bars of history before the OOS segment that the strategy may use
    /// for indicator warmup. Defaults to the strategy's own warmup.
    pub oos_warmup_bars: Option<usize>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            mode: WindowMode::Rolling,
            window_len: 252,
            step: 63,
            oos_len: None,
            oos_warmup_bars: None,
        }
    }
}

impl WalkForwardConfig {
    pub fn oos_len(&self) -> usize {
        self.oos_len.unwrap_or(self.step)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::invalid("walk_forward.step", "must be > 0"));
        }
        let oos = self.oos_len();
        if oos == 0 {
            return Err(ConfigError::invalid("walk_forward.oos_len", "must be > 0"));
        }
        if oos > self.step {
            return Err(ConfigError::invalid(
                "walk_forward.oos_len",
                format!("{oos} exceeds step {}: out-of-sample segments would overlap", self.step),
            ));
        }
        if oos >= self.window_len {
            return Err(ConfigError::invalid(
                "walk_forward.window_len",
                format!("{} leaves no in-sample bars with oos_len {oos}", self.window_len),
            ));
        }
        Ok(())
    }

    /// Number of windows that fit in `total_bars`.
    pub fn window_count(&self, total_bars: usize) -> usize {
        if self.step == 0 || total_bars < self.window_len {
            return 0;
        }
        (total_bars - self.window_len) / self.step + 1
    }

    /// Window geometry for `total_bars`. Assumes a validated config.
    pub fn windows(&self, total_bars: usize) -> Vec<WindowSpec> {
        let oos = self.oos_len();
        (0..self.window_count(total_bars))
            .map(|index| {
                let start = index * self.step;
                let end = start + self.window_len;
                let is_start = match self.mode {
                    WindowMode::Rolling => start,
                    WindowMode::Anchored => 0,
                };
                WindowSpec {
                    index,
                    in_sample: BarRange::new(is_start, end - oos),
                    out_of_sample: BarRange::new(end - oos, end),
                }
            })
            .collect()
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Half-open bar index range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRange {
    pub start: usize,
    pub end: usize,
}

impl BarRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub index: usize,
    pub in_sample: BarRange,
    pub out_of_sample: BarRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WindowStatus {
    Completed,
    /// No in-sample combination passed the validity filters.
    NoValidParams,
    Failed { reason: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    pub index: usize,
    pub in_sample: BarRange,
    pub out_of_sample: BarRange,
    pub selected_params: Option<ParamSet>,
    pub is_score: Option<f64>,
    pub is_metrics: Option<PerformanceMetrics>,
    pub oos_score: Option<f64>,
    pub oos_metrics: Option<PerformanceMetrics>,
    pub status: WindowStatus,
}

/// How the IS → OOS efficiency ratio was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DegradationFlag {
    /// Mean IS score >= 0.1, ratio computed normally.
    Normal,
    /// Mean IS score in [0, 0.1): reports the difference OOS - IS instead.
    LowIsScore,
    /// Mean IS score negative: ratio skipped.
    NegativeIsScore,
    /// Positive IS but negative OOS: ratio clamped to 0.0.
    FailedOos,
    /// No completed window to compare.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WalkForwardStatus {
    Completed,
    /// Fewer bars than one window needs. Not an error.
    InsufficientData { bars: usize, required: usize },
    /// Every window failed or had no valid parameters.
    NoValidWindows,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub strategy: String,
    pub config: WalkForwardConfig,
    pub status: WalkForwardStatus,
    pub windows: Vec<WalkForwardWindow>,
    /// Metrics over the stitched OOS trades and equity.
    pub oos_metrics: Option<PerformanceMetrics>,
    /// OOS trades of all windows; bar indices refer to the full series.
    pub oos_trades: Vec<Trade>,
    /// OOS equity of all windows, each window's PnL added to the previous
    /// windows' running total.
    pub oos_equity: Vec<EquityPoint>,
    pub mean_is_score: f64,
    pub mean_oos_score: f64,
    /// Walk-forward efficiency: mean OOS score / mean IS score.
    pub efficiency: Option<f64>,
    pub degradation_flag: DegradationFlag,
    /// Fraction of completed windows with positive OOS net profit.
    pub profitable_windows: f64,
}

impl WalkForwardReport {
    pub fn completed_windows(&self) -> impl Iterator<Item = &WalkForwardWindow> {
        self.windows
            .iter()
            .filter(|w| w.status == WindowStatus::Completed)
    }
}

// ─── Orchestration ───────────────────────────────────────────────────

/// OOS run of one completed window, kept until the report is stitched.
struct OosSegment {
    range: BarRange,
    run: RunResult,
}

pub struct WalkForwardOptimizer<'a> {
    factory: &'a dyn StrategyFactory,
    base: &'a EngineConfig,
    grid: &'a GridConfig,
    config: &'a WalkForwardConfig,
    scorer: Option<&'a dyn Scorer>,
    cancel: CancelToken,
}

impl<'a> WalkForwardOptimizer<'a> {
    pub fn new(
        factory: &'a dyn StrategyFactory,
        base: &'a EngineConfig,
        grid: &'a GridConfig,
        config: &'a WalkForwardConfig,
    ) -> Self {
        Self {
            factory,
            base,
            grid,
            config,
            scorer: None,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_scorer(mut self, scorer: &'a dyn Scorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn scorer(&self) -> &dyn Scorer {
        self.scorer.unwrap_or(&self.grid.scoring)
    }

    /// Run every window in order. Cancellation is checked between windows
    /// and inside each in-sample sweep.
    pub fn run(&self, bars: &[Bar]) -> Result<WalkForwardReport, ConfigError> {
        self.config.validate()?;
        self.grid.validate()?;
        self.base.validate()?;

        let specs = self.config.windows(bars.len());
        if specs.is_empty() {
            warn!(
                bars = bars.len(),
                required = self.config.window_len,
                "walk-forward: insufficient data"
            );
            let status = WalkForwardStatus::InsufficientData {
                bars: bars.len(),
                required: self.config.window_len,
            };
            return Ok(self.report(status, Vec::new(), Vec::new()));
        }
        info!(
            strategy = self.factory.name(),
            windows = specs.len(),
            mode = ?self.config.mode,
            "walk-forward started"
        );

        let mut windows = Vec::with_capacity(specs.len());
        let mut segments = Vec::new();
        let mut cancelled = false;
        for spec in &specs {
            if !cancelled && self.cancel.is_cancelled() {
                cancelled = true;
            }
            if cancelled {
                windows.push(empty_window(spec, WindowStatus::Cancelled));
                continue;
            }
            let (window, segment) = self.run_window(bars, spec);
            if window.status == WindowStatus::Cancelled {
                cancelled = true;
            }
            segments.extend(segment);
            windows.push(window);
        }

        let status = if cancelled {
            warn!(strategy = self.factory.name(), "walk-forward cancelled");
            WalkForwardStatus::Cancelled
        } else if segments.is_empty() {
            WalkForwardStatus::NoValidWindows
        } else {
            WalkForwardStatus::Completed
        };
        let report = self.report(status, windows, segments);
        info!(
            strategy = self.factory.name(),
            efficiency = ?report.efficiency,
            flag = ?report.degradation_flag,
            "walk-forward finished"
        );
        Ok(report)
    }

    fn run_window(&self, bars: &[Bar], spec: &WindowSpec) -> (WalkForwardWindow, Option<OosSegment>) {
        let mut window = empty_window(spec, WindowStatus::NoValidParams);

        let mut optimizer = GridOptimizer::new(self.factory, self.base, self.grid)
            .with_cancel(self.cancel.clone());
        if let Some(scorer) = self.scorer {
            optimizer = optimizer.with_scorer(scorer);
        }
        let grid = match optimizer.run(&bars[spec.in_sample.as_range()]) {
            Ok(report) => report,
            Err(e) => {
                window.status = WindowStatus::Failed {
                    reason: e.to_string(),
                };
                return (window, None);
            }
        };
        if grid.cancelled {
            window.status = WindowStatus::Cancelled;
            return (window, None);
        }
        let Some(best) = grid.best() else {
            warn!(window = spec.index, "walk-forward: no valid in-sample parameters");
            return (window, None);
        };
        window.selected_params = Some(best.params.clone());
        window.is_score = best.score;
        window.is_metrics = best.metrics.clone();

        match run_combination(
            bars,
            spec.out_of_sample.as_range(),
            self.config.oos_warmup_bars,
            self.factory,
            self.base,
            &best.params,
            &self.grid.metrics,
        ) {
            Ok(result) => {
                window.oos_score = Some(self.scorer().score(&result.metrics));
                window.oos_metrics = Some(result.metrics);
                window.status = WindowStatus::Completed;
                let segment = OosSegment {
                    range: spec.out_of_sample,
                    run: result.run,
                };
                (window, Some(segment))
            }
            Err(e) => {
                warn!(window = spec.index, error = %e, "walk-forward: out-of-sample run failed");
                window.status = WindowStatus::Failed {
                    reason: e.to_string(),
                };
                (window, None)
            }
        }
    }

    fn report(
        &self,
        status: WalkForwardStatus,
        windows: Vec<WalkForwardWindow>,
        segments: Vec<OosSegment>,
    ) -> WalkForwardReport {
        let (oos_trades, oos_equity) = stitch(&segments);
        let oos_metrics = (!segments.is_empty()).then(|| {
            PerformanceMetrics::compute(
                &oos_trades,
                &oos_equity,
                self.base.initial_capital,
                &self.grid.metrics,
            )
        });

        let completed: Vec<&WalkForwardWindow> = windows
            .iter()
            .filter(|w| w.status == WindowStatus::Completed)
            .collect();
        let is_scores: Vec<f64> = completed.iter().filter_map(|w| w.is_score).collect();
        let oos_scores: Vec<f64> = completed.iter().filter_map(|w| w.oos_score).collect();
        let mean_is_score = mean_f64(&is_scores);
        let mean_oos_score = mean_f64(&oos_scores);
        let (efficiency, degradation_flag) = if completed.is_empty() {
            (None, DegradationFlag::InsufficientData)
        } else {
            efficiency_ratio(mean_is_score, mean_oos_score)
        };
        let profitable_windows = if completed.is_empty() {
            0.0
        } else {
            let profitable = completed
                .iter()
                .filter(|w| w.oos_metrics.as_ref().is_some_and(|m| m.net_profit > 0.0))
                .count();
            profitable as f64 / completed.len() as f64
        };

        WalkForwardReport {
            strategy: self.factory.name().to_string(),
            config: *self.config,
            status,
            windows,
            oos_metrics,
            oos_trades,
            oos_equity,
            mean_is_score,
            mean_oos_score,
            efficiency,
            degradation_flag,
            profitable_windows,
        }
    }
}

fn empty_window(spec: &WindowSpec, status: WindowStatus) -> WalkForwardWindow {
    WalkForwardWindow {
        index: spec.index,
        in_sample: spec.in_sample,
        out_of_sample: spec.out_of_sample,
        selected_params: None,
        is_score: None,
        is_metrics: None,
        oos_score: None,
        oos_metrics: None,
        status,
    }
}

/// Concatenate OOS runs into one trade list and equity series.
///
/// Every segment starts from the same initial capital, so each one is
/// shifted by the net PnL accumulated in earlier segments. Bar indices are
/// moved from segment-local to full-series positions.
fn stitch(segments: &[OosSegment]) -> (Vec<Trade>, Vec<EquityPoint>) {
    let mut trades = Vec::new();
    let mut equity = Vec::new();
    let mut carried = 0.0;
    for segment in segments {
        let offset = segment.range.start;
        trades.extend(segment.run.trades.iter().map(|t| Trade {
            entry_bar: t.entry_bar + offset,
            exit_bar: t.exit_bar + offset,
            ..t.clone()
        }));
        equity.extend(segment.run.equity_curve.iter().map(|p| EquityPoint {
            bar_index: p.bar_index + offset,
            equity: p.equity + carried,
            mark_to_market: p.mark_to_market + carried,
            ..*p
        }));
        carried += segment.run.net_profit();
    }
    (trades, equity)
}

/// Walk-forward efficiency (mean OOS score / mean IS score).
///
/// - IS < 0: skipped, `NegativeIsScore`.
/// - 0 <= IS < 0.1: the ratio is unstable, reports OOS - IS instead.
/// - IS >= 0.1 and OOS < 0: clamped to 0.0, `FailedOos`.
pub fn efficiency_ratio(is_score: f64, oos_score: f64) -> (Option<f64>, DegradationFlag) {
    if !is_score.is_finite() || !oos_score.is_finite() {
        return (None, DegradationFlag::InsufficientData);
    }
    if is_score < 0.0 {
        (None, DegradationFlag::NegativeIsScore)
    } else if is_score < 0.1 {
        (Some(oos_score - is_score), DegradationFlag::LowIsScore)
    } else if oos_score < 0.0 {
        (Some(0.0), DegradationFlag::FailedOos)
    } else {
        (Some(oos_score / is_score), DegradationFlag::Normal)
    }
}
