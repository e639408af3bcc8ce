//! Grid search: runs every parameter combination and ranks the results.
//!
//! Each combination builds its own strategy and engine and is evaluated
//! independently; results are merged by a single ordered `collect`, so the
//! output is identical with or without parallelism.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tradelab_core::domain::Bar;
use tradelab_core::params::{describe, fingerprint};
use tradelab_core::{ConfigError, EngineConfig, ParamSet};

use crate::cancel::CancelToken;
use crate::metrics::{MetricsConfig, PerformanceMetrics};
use crate::param::ParamSpace;
use crate::runner::run_combination;
use crate::scoring::{FitnessMetric, Scorer};
use crate::strategy::StrategyFactory;

// ─── Configuration ───────────────────────────────────────────────────

/// Validity filters. Combinations that fail one are kept in the report but
/// excluded from ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultFilters {
    pub min_trades: usize,
    /// Drawdown ceiling as a positive fraction (0.3 = 30%).
    pub max_drawdown: Option<f64>,
}

impl Default for ResultFilters {
    fn default() -> Self {
        Self {
            min_trades: 1,
            max_drawdown: None,
        }
    }
}

impl ResultFilters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dd) = self.max_drawdown {
            if !(dd > 0.0 && dd <= 1.0) {
                return Err(ConfigError::invalid(
                    "filters.max_drawdown",
                    format!("must be in (0, 1], got {dd}"),
                ));
            }
        }
        Ok(())
    }

    fn check(&self, metrics: &PerformanceMetrics, score: f64) -> ResultStatus {
        if metrics.trade_count < self.min_trades {
            return ResultStatus::Rejected {
                reason: RejectionReason::TooFewTrades {
                    trades: metrics.trade_count,
                    min: self.min_trades,
                },
            };
        }
        if let Some(limit) = self.max_drawdown {
            let drawdown = metrics.max_drawdown.abs();
            if drawdown > limit {
                return ResultStatus::Rejected {
                    reason: RejectionReason::DrawdownExceeded { drawdown, limit },
                };
            }
        }
        if !score.is_finite() {
            return ResultStatus::Rejected {
                reason: RejectionReason::NonFiniteScore,
            };
        }
        ResultStatus::Valid
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub space: ParamSpace,
    pub scoring: FitnessMetric,
    pub filters: ResultFilters,
    pub metrics: MetricsConfig,
    pub parallel: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            space: ParamSpace::default(),
            scoring: FitnessMetric::default(),
            filters: ResultFilters::default(),
            metrics: MetricsConfig::default(),
            parallel: true,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.space.validate()?;
        self.filters.validate()?;
        self.metrics.validate()
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    TooFewTrades { trades: usize, min: usize },
    DrawdownExceeded { drawdown: f64, limit: f64 },
    NonFiniteScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultStatus {
    Valid,
    Rejected { reason: RejectionReason },
    /// Strategy construction or the simulation failed for this combination.
    Failed { reason: String },
    /// Skipped because the sweep was cancelled first.
    Cancelled,
}

impl ResultStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ResultStatus::Valid)
    }

    /// Short code for tables and CSV export.
    pub fn code(&self) -> &'static str {
        match self {
            ResultStatus::Valid => "valid",
            ResultStatus::Rejected { reason } => match reason {
                RejectionReason::TooFewTrades { .. } => "too_few_trades",
                RejectionReason::DrawdownExceeded { .. } => "drawdown_exceeded",
                RejectionReason::NonFiniteScore => "non_finite_score",
            },
            ResultStatus::Failed { .. } => "failed",
            ResultStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Position in the Cartesian product.
    pub index: usize,
    pub params: ParamSet,
    pub fingerprint: String,
    pub metrics: Option<PerformanceMetrics>,
    pub score: Option<f64>,
    pub status: ResultStatus,
    /// 1-based rank among valid results.
    pub rank: Option<usize>,
}

/// Progress notification, sent after each combination completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridProgress {
    pub completed: usize,
    pub total: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReport {
    pub strategy: String,
    pub scorer: String,
    /// All combinations in product order.
    pub results: Vec<OptimizationResult>,
    /// Indices into `results`, best first. Valid results only.
    pub ranking: Vec<usize>,
    pub cancelled: bool,
}

impl GridReport {
    pub fn ranked(&self) -> impl Iterator<Item = &OptimizationResult> {
        self.ranking.iter().map(|&i| &self.results[i])
    }

    pub fn best(&self) -> Option<&OptimizationResult> {
        self.ranked().next()
    }

    pub fn valid_count(&self) -> usize {
        self.ranking.len()
    }

    pub fn failed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.status, ResultStatus::Failed { .. }))
            .count()
    }
}

// ─── Optimizer ───────────────────────────────────────────────────────

type ProgressFn<'a> = dyn Fn(GridProgress) + Send + Sync + 'a;

/// Grid search over one strategy factory.
///
/// ```no_run
/// use tradelab_core::EngineConfig;
/// use tradelab_runner::grid::{GridConfig, GridOptimizer};
/// use tradelab_runner::param::{ParamRange, ParamSpace};
/// use tradelab_runner::strategy::MaCrossoverFactory;
///
/// # let bars = Vec::new();
/// let config = GridConfig {
///     space: ParamSpace::new()
///         .with("fast", ParamRange::Int { min: 5, max: 20, step: 5 })
///         .with("slow", ParamRange::Int { min: 30, max: 90, step: 30 }),
///     ..GridConfig::default()
/// };
/// let factory = MaCrossoverFactory::default();
/// let base = EngineConfig::new(10_000.0);
/// let report = GridOptimizer::new(&factory, &base, &config).run(&bars)?;
/// # Ok::<(), tradelab_core::ConfigError>(())
/// ```
pub struct GridOptimizer<'a> {
    factory: &'a dyn StrategyFactory,
    base: &'a EngineConfig,
    config: &'a GridConfig,
    scorer: Option<&'a dyn Scorer>,
    cancel: CancelToken,
    progress: Option<&'a ProgressFn<'a>>,
}

impl<'a> GridOptimizer<'a> {
    pub fn new(
        factory: &'a dyn StrategyFactory,
        base: &'a EngineConfig,
        config: &'a GridConfig,
    ) -> Self {
        Self {
            factory,
            base,
            config,
            scorer: None,
            cancel: CancelToken::default(),
            progress: None,
        }
    }

    /// Score with `scorer` instead of `config.scoring`.
    pub fn with_scorer(mut self, scorer: &'a dyn Scorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn scorer(&self) -> &dyn Scorer {
        self.scorer.unwrap_or(&self.config.scoring)
    }

    /// Evaluate every combination on `bars` and rank the valid ones.
    ///
    /// Configuration problems fail before any run. Per-combination failures
    /// are recorded in the report and never abort the sweep.
    pub fn run(&self, bars: &[Bar]) -> Result<GridReport, ConfigError> {
        self.config.validate()?;
        self.base.validate()?;

        let combinations = self.config.space.combinations();
        let total = combinations.len();
        let completed = AtomicUsize::new(0);
        info!(
            strategy = self.factory.name(),
            combinations = total,
            bars = bars.len(),
            parallel = self.config.parallel,
            "grid search started"
        );

        let evaluate = |(index, params): (usize, ParamSet)| {
            let result = self.evaluate(bars, index, params);
            if let Some(progress) = self.progress {
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                progress(GridProgress {
                    completed: done,
                    total,
                    index,
                });
            }
            result
        };
        let mut results: Vec<OptimizationResult> = if self.config.parallel {
            combinations.into_par_iter().enumerate().map(evaluate).collect()
        } else {
            combinations.into_iter().enumerate().map(evaluate).collect()
        };

        let ranking = rank(&mut results);
        let cancelled = results
            .iter()
            .any(|r| r.status == ResultStatus::Cancelled);
        if cancelled {
            warn!(strategy = self.factory.name(), "grid search cancelled");
        }
        info!(
            strategy = self.factory.name(),
            valid = ranking.len(),
            total,
            "grid search finished"
        );

        Ok(GridReport {
            strategy: self.factory.name().to_string(),
            scorer: self.scorer().name().to_string(),
            results,
            ranking,
            cancelled,
        })
    }

    fn evaluate(&self, bars: &[Bar], index: usize, params: ParamSet) -> OptimizationResult {
        let mut result = OptimizationResult {
            index,
            fingerprint: fingerprint(&params),
            params,
            metrics: None,
            score: None,
            status: ResultStatus::Cancelled,
            rank: None,
        };
        if self.cancel.is_cancelled() {
            return result;
        }

        match run_combination(
            bars,
            0..bars.len(),
            Some(0),
            self.factory,
            self.base,
            &result.params,
            &self.config.metrics,
        ) {
            Ok(run) => {
                let score = self.scorer().score(&run.metrics);
                result.status = self.config.filters.check(&run.metrics, score);
                result.score = Some(score);
                result.metrics = Some(run.metrics);
            }
            Err(e) => {
                warn!(
                    index,
                    params = %describe(&result.params),
                    error = %e,
                    "combination failed"
                );
                result.status = ResultStatus::Failed {
                    reason: e.to_string(),
                };
            }
        }
        result
    }
}

/// Stable ranking: score descending, ties broken by combination index.
/// Writes 1-based ranks into `results` and returns the ranked indices.
fn rank(results: &mut [OptimizationResult]) -> Vec<usize> {
    let mut ranking: Vec<usize> = results
        .iter()
        .filter(|r| r.status.is_valid())
        .map(|r| r.index)
        .collect();
    ranking.sort_by(|&a, &b| {
        let (sa, sb) = (
            results[a].score.unwrap_or(f64::NEG_INFINITY),
            results[b].score.unwrap_or(f64::NEG_INFINITY),
        );
        sb.total_cmp(&sa).then(a.cmp(&b))
    });
    for (position, &i) in ranking.iter().enumerate() {
        results[i].rank = Some(position + 1);
    }
    ranking
}
