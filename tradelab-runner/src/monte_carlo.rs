//! Monte-Carlo trade bootstrap: resamples a trade PnL sequence with
//! replacement to estimate the distribution of outcomes.
//!
//! Every resample keeps the original trade count and draws from its own RNG
//! (sub-seed of the master seed and the resample index), so the report is
//! bit-identical for any thread count.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tradelab_core::domain::Trade;
use tradelab_core::rng::RngHierarchy;
use tradelab_core::ConfigError;

use crate::cancel::CancelToken;
use crate::metrics::{max_drawdown, mean_f64, percentile_sorted, pnl_returns, sharpe_ratio, std_dev};

const RESAMPLE_STREAM: &str = "resample";

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_resamples: usize,
    pub seed: u64,
    /// Trade count below which results are flagged as unreliable.
    pub min_trades: usize,
    /// Drawdown (positive fraction) that counts as ruin.
    pub ruin_drawdown: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_resamples: 1_000,
            seed: 42,
            min_trades: 30,
            ruin_drawdown: 0.5,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_resamples == 0 {
            return Err(ConfigError::invalid("monte_carlo.n_resamples", "must be > 0"));
        }
        if !(self.ruin_drawdown > 0.0 && self.ruin_drawdown <= 1.0) {
            return Err(ConfigError::invalid(
                "monte_carlo.ruin_drawdown",
                format!("must be in (0, 1], got {}", self.ruin_drawdown),
            ));
        }
        Ok(())
    }
}

// ─── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SampleValidity {
    Sufficient,
    /// Fewer trades than `min_trades`; the distribution is computed but
    /// should not be trusted.
    BelowMinimum { min: usize, actual: usize },
    /// No trades at all; nothing was resampled.
    Insufficient,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileTable {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl PercentileTable {
    /// Percentiles of an ascending slice.
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p5: percentile_sorted(sorted, 5.0),
            p25: percentile_sorted(sorted, 25.0),
            p50: percentile_sorted(sorted, 50.0),
            p75: percentile_sorted(sorted, 75.0),
            p95: percentile_sorted(sorted, 95.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloReport {
    pub config: MonteCarloConfig,
    pub validity: SampleValidity,
    pub trade_count: usize,
    pub initial_capital: f64,
    /// Resamples actually run; below `n_resamples` only when cancelled.
    pub completed_resamples: usize,
    pub cancelled: bool,
    pub terminal_return: PercentileTable,
    /// Negative fractions, like `PerformanceMetrics::max_drawdown`.
    pub max_drawdown: PercentileTable,
    /// Per-trade, not annualized.
    pub sharpe: PercentileTable,
    pub mean_terminal_return: f64,
    pub std_terminal_return: f64,
    pub probability_of_profit: f64,
    pub probability_of_ruin: f64,
    pub original_terminal_return: f64,
    /// Share of resamples below the original terminal return (ties count half).
    pub original_percentile_rank: f64,
}

impl MonteCarloReport {
    fn empty(config: MonteCarloConfig, initial_capital: f64) -> Self {
        Self {
            config,
            validity: SampleValidity::Insufficient,
            trade_count: 0,
            initial_capital,
            completed_resamples: 0,
            cancelled: false,
            terminal_return: PercentileTable::default(),
            max_drawdown: PercentileTable::default(),
            sharpe: PercentileTable::default(),
            mean_terminal_return: 0.0,
            std_terminal_return: 0.0,
            probability_of_profit: 0.0,
            probability_of_ruin: 0.0,
            original_terminal_return: 0.0,
            original_percentile_rank: 0.0,
        }
    }
}

/// Statistics of one equity path.
#[derive(Debug, Clone, Copy)]
struct PathStats {
    terminal_return: f64,
    max_drawdown: f64,
    sharpe: f64,
    ruined: bool,
}

fn path_stats(pnls: &[f64], initial_capital: f64, ruin_drawdown: f64) -> PathStats {
    let mut equity = Vec::with_capacity(pnls.len() + 1);
    equity.push(initial_capital);
    let mut running = initial_capital;
    for pnl in pnls {
        running += pnl;
        equity.push(running);
    }
    let dd = max_drawdown(&equity);
    let returns = pnl_returns(pnls.iter().copied(), initial_capital);
    PathStats {
        terminal_return: (running - initial_capital) / initial_capital,
        max_drawdown: dd,
        sharpe: sharpe_ratio(&returns, 0.0, 1.0),
        ruined: equity.iter().any(|&e| e <= 0.0) || dd.abs() >= ruin_drawdown,
    }
}

// ─── Simulator ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
    cancel: CancelToken,
}

impl MonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bootstrap the net PnL of `trades`, in order.
    pub fn run_trades(
        &self,
        trades: &[Trade],
        initial_capital: f64,
    ) -> Result<MonteCarloReport, ConfigError> {
        let pnls: Vec<f64> = trades.iter().map(|t| t.net_pnl).collect();
        self.run(&pnls, initial_capital)
    }

    pub fn run(&self, pnls: &[f64], initial_capital: f64) -> Result<MonteCarloReport, ConfigError> {
        self.config.validate()?;
        if !(initial_capital > 0.0 && initial_capital.is_finite()) {
            return Err(ConfigError::NonPositiveCapital(initial_capital));
        }
        if let Some(bad) = pnls.iter().find(|p| !p.is_finite()) {
            return Err(ConfigError::invalid("pnls", format!("non-finite trade PnL {bad}")));
        }

        let n = pnls.len();
        if n == 0 {
            warn!("monte-carlo: no trades to resample");
            return Ok(MonteCarloReport::empty(self.config, initial_capital));
        }
        let validity = if n < self.config.min_trades {
            warn!(trades = n, min = self.config.min_trades, "monte-carlo: few trades");
            SampleValidity::BelowMinimum {
                min: self.config.min_trades,
                actual: n,
            }
        } else {
            SampleValidity::Sufficient
        };
        info!(
            trades = n,
            resamples = self.config.n_resamples,
            seed = self.config.seed,
            "monte-carlo started"
        );

        let hierarchy = RngHierarchy::new(self.config.seed);
        let paths: Vec<Option<PathStats>> = (0..self.config.n_resamples)
            .into_par_iter()
            .map(|i| {
                if self.cancel.is_cancelled() {
                    return None;
                }
                let sample = resample(pnls, &hierarchy, i);
                Some(path_stats(&sample, initial_capital, self.config.ruin_drawdown))
            })
            .collect();
        let paths: Vec<PathStats> = paths.into_iter().flatten().collect();
        let cancelled = paths.len() < self.config.n_resamples;
        if cancelled {
            warn!(
                completed = paths.len(),
                requested = self.config.n_resamples,
                "monte-carlo cancelled"
            );
        }

        let original = path_stats(pnls, initial_capital, self.config.ruin_drawdown);
        let mut report = MonteCarloReport {
            validity,
            trade_count: n,
            completed_resamples: paths.len(),
            cancelled,
            original_terminal_return: original.terminal_return,
            ..MonteCarloReport::empty(self.config, initial_capital)
        };
        if paths.is_empty() {
            return Ok(report);
        }

        let count = paths.len() as f64;
        let mut terminal: Vec<f64> = paths.iter().map(|p| p.terminal_return).collect();
        report.mean_terminal_return = mean_f64(&terminal);
        report.std_terminal_return = std_dev(&terminal);
        report.probability_of_profit =
            paths.iter().filter(|p| p.terminal_return > 0.0).count() as f64 / count;
        report.probability_of_ruin = paths.iter().filter(|p| p.ruined).count() as f64 / count;
        report.original_percentile_rank = percentile_rank(&terminal, original.terminal_return);

        terminal.sort_by(f64::total_cmp);
        report.terminal_return = PercentileTable::from_sorted(&terminal);
        let mut drawdowns: Vec<f64> = paths.iter().map(|p| p.max_drawdown).collect();
        drawdowns.sort_by(f64::total_cmp);
        report.max_drawdown = PercentileTable::from_sorted(&drawdowns);
        let mut sharpes: Vec<f64> = paths.iter().map(|p| p.sharpe).collect();
        sharpes.sort_by(f64::total_cmp);
        report.sharpe = PercentileTable::from_sorted(&sharpes);

        info!(
            mean_return = report.mean_terminal_return,
            p_profit = report.probability_of_profit,
            p_ruin = report.probability_of_ruin,
            "monte-carlo finished"
        );
        Ok(report)
    }
}

/// One bootstrap draw: `pnls.len()` picks with replacement from resample
/// `index`'s own RNG.
fn resample(pnls: &[f64], hierarchy: &RngHierarchy, index: usize) -> Vec<f64> {
    let n = pnls.len();
    let mut rng = hierarchy.rng_for(RESAMPLE_STREAM, index as u64);
    (0..n).map(|_| pnls[rng.gen_range(0..n)]).collect()
}

/// Fraction of `values` below `x`, counting ties as half.
fn percentile_rank(values: &[f64], x: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let below = values.iter().filter(|&&v| v < x).count() as f64;
    let ties = values.iter().filter(|&&v| v == x).count() as f64;
    (below + 0.5 * ties) / values.len() as f64
}
