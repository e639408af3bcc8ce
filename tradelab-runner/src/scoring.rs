//! Scoring: turns a metrics record into the single number the optimizer
//! ranks by.

use serde::{Deserialize, Serialize};

use crate::metrics::PerformanceMetrics;

/// Drawdown used in the composite score when a run never drew down.
pub const MIN_DRAWDOWN_FLOOR: f64 = 0.01;

/// Pluggable scoring function. Higher scores rank first.
///
/// Implemented by [`FitnessMetric`] and by any
/// `Fn(&PerformanceMetrics) -> f64 + Send + Sync` closure.
pub trait Scorer: Send + Sync {
    fn score(&self, metrics: &PerformanceMetrics) -> f64;

    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> Scorer for F
where
    F: Fn(&PerformanceMetrics) -> f64 + Send + Sync,
{
    fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        self(metrics)
    }
}

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    Cagr,
    TotalReturn,
    WinRate,
    ProfitFactor,
    Expectancy,
    MaxDrawdown,
    /// `(return / |drawdown|) × Sharpe × sqrt(win_rate)`.
    Composite,
}

impl FitnessMetric {
    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::Calmar => metrics.calmar,
            Self::Cagr => metrics.cagr,
            Self::TotalReturn => metrics.total_return,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor.value(),
            Self::Expectancy => metrics.expectancy,
            // Negative fraction: less negative (smaller drawdown) ranks higher.
            Self::MaxDrawdown => metrics.max_drawdown,
            Self::Composite => composite_score(metrics),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::Calmar => "calmar",
            Self::Cagr => "cagr",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::Expectancy => "expectancy",
            Self::MaxDrawdown => "max_drawdown",
            Self::Composite => "composite",
        }
    }
}

impl Scorer for FitnessMetric {
    fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        self.extract(metrics)
    }

    fn name(&self) -> &str {
        self.as_str()
    }
}

/// `(total_return / |max_drawdown|) × sharpe × sqrt(win_rate)`.
///
/// The product of two negatives would rank a losing strategy above a
/// winning one, so when return or Sharpe is non-positive the score is the
/// sum of the negative parts instead: always <= 0, lower for worse runs.
pub fn composite_score(metrics: &PerformanceMetrics) -> f64 {
    let ret = metrics.total_return;
    let sharpe = metrics.sharpe;
    if ret <= 0.0 || sharpe <= 0.0 {
        return ret.min(0.0) + sharpe.min(0.0);
    }
    let drawdown = metrics.max_drawdown.abs().max(MIN_DRAWDOWN_FLOOR);
    (ret / drawdown) * sharpe * metrics.win_rate.max(0.0).sqrt()
}
