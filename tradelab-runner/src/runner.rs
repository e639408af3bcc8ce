//! Backtest runner: wires together strategy, engine and metrics.
//!
//! Two entry points:
//! - `run_single()`: a ready-made signal generator and engine config.
//! - `run_combination()`: one parameter combination built through a
//!   [`StrategyFactory`]. Used by the grid and walk-forward optimizers.
//!
//! `run_segment()` runs a sub-range of the bar series while letting the
//! strategy see preceding history for indicator warmup.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tradelab_core::domain::{Bar, Signal, SignalGenerator};
use tradelab_core::engine::run_backtest;
use tradelab_core::params::fingerprint;
use tradelab_core::{ConfigError, EngineConfig, EngineError, ParamSet, RunResult};

use crate::metrics::{MetricsConfig, PerformanceMetrics};
use crate::strategy::StrategyFactory;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: String,
    pub params: ParamSet,
    pub param_fingerprint: String,
    pub metrics: PerformanceMetrics,
    pub run: RunResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    fn new(strategy: &str, params: &ParamSet, run: RunResult, metrics_config: &MetricsConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            strategy: strategy.to_string(),
            params: params.clone(),
            param_fingerprint: fingerprint(params),
            metrics: PerformanceMetrics::from_run(&run, metrics_config),
            run,
        }
    }
}

/// Run one backtest over the full series.
pub fn run_single(
    bars: &[Bar],
    generator: &dyn SignalGenerator,
    config: &EngineConfig,
    metrics_config: &MetricsConfig,
) -> Result<BacktestResult, EngineError> {
    let run = run_segment(bars, 0..bars.len(), 0, generator, config)?;
    Ok(BacktestResult::new(
        generator.name(),
        &ParamSet::new(),
        run,
        metrics_config,
    ))
}

/// Build the strategy and engine config for `params`, then run it on
/// `range` (with up to `warmup` bars of preceding history for signals).
pub fn run_combination(
    bars: &[Bar],
    range: Range<usize>,
    warmup: Option<usize>,
    factory: &dyn StrategyFactory,
    base: &EngineConfig,
    params: &ParamSet,
    metrics_config: &MetricsConfig,
) -> Result<BacktestResult, EngineError> {
    let config = factory.engine_config(base, params)?;
    let generator = factory.build(params)?;
    let warmup = warmup.unwrap_or_else(|| generator.warmup_bars());
    let run = run_segment(bars, range, warmup, generator.as_ref(), &config)?;
    Ok(BacktestResult::new(factory.name(), params, run, metrics_config))
}

/// Run the engine on `bars[range]`.
///
/// Signals are generated on `bars[range.start - warmup .. range.end]` and
/// only those stamped inside `range` reach the engine, so no trade can
/// open before `range.start`. The engine itself only ever sees the range.
pub fn run_segment(
    bars: &[Bar],
    range: Range<usize>,
    warmup: usize,
    generator: &dyn SignalGenerator,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    if range.start > range.end || range.end > bars.len() {
        return Err(ConfigError::invalid(
            "range",
            format!("{range:?} outside 0..{}", bars.len()),
        )
        .into());
    }
    let segment = &bars[range.clone()];
    let Some(first) = segment.first() else {
        return run_backtest(segment, &[], config);
    };

    let history = &bars[range.start.saturating_sub(warmup)..range.end];
    let signals: Vec<Signal> = generator
        .generate(history)
        .into_iter()
        .filter(|s| s.timestamp >= first.timestamp)
        .collect();
    run_backtest(segment, &signals, config)
}
