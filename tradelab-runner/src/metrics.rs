//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity series and/or trade list in,
//! scalar out. Empty, single-point and zero-variance inputs return 0.0 (or an
//! explicit sentinel), never NaN.

use serde::{Deserialize, Serialize};
use tradelab_core::domain::{EquityPoint, ExitReason, Trade};
use tradelab_core::{ConfigError, RunResult};

/// Seconds in a 365-day year. Use for markets that trade around the clock.
pub const CALENDAR_SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Seconds in 252 sessions of 6.5 hours (US equities).
pub const EQUITY_SESSION_SECONDS_PER_YEAR: f64 = 252.0 * 6.5 * 3_600.0;

/// Profit factor cap used when the ratio is fed to a scorer.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

// ─── Configuration ───────────────────────────────────────────────────

/// Which return series the risk-adjusted ratios are computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnBasis {
    /// Bar-to-bar changes of the equity series.
    #[default]
    PerBar,
    /// Net PnL of each trade over the realized equity before it.
    PerTrade,
}

/// Which equity series drawdown and per-bar returns are computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EquityBasis {
    /// Realized equity: moves only when trades close.
    Realized,
    /// Realized equity plus unrealized PnL of the open position.
    #[default]
    MarkToMarket,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Bars per year; the annualization factor for per-bar returns.
    pub periods_per_year: f64,
    pub return_basis: ReturnBasis,
    /// Annual risk-free rate, converted to a per-period rate.
    pub risk_free_rate: f64,
    pub equity_basis: EquityBasis,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            return_basis: ReturnBasis::PerBar,
            risk_free_rate: 0.0,
            equity_basis: EquityBasis::MarkToMarket,
        }
    }
}

impl MetricsConfig {
    /// Derive the annualization factor from the bar interval.
    ///
    /// ```
    /// use tradelab_runner::metrics::{MetricsConfig, CALENDAR_SECONDS_PER_YEAR};
    ///
    /// let hourly = MetricsConfig::for_interval(3_600, CALENDAR_SECONDS_PER_YEAR).unwrap();
    /// assert_eq!(hourly.periods_per_year, 8_760.0);
    /// ```
    pub fn for_interval(
        interval_secs: i64,
        trading_seconds_per_year: f64,
    ) -> Result<Self, ConfigError> {
        if interval_secs <= 0 {
            return Err(ConfigError::invalid(
                "interval_secs",
                format!("must be positive, got {interval_secs}"),
            ));
        }
        if !(trading_seconds_per_year.is_finite() && trading_seconds_per_year > 0.0) {
            return Err(ConfigError::invalid(
                "trading_seconds_per_year",
                "must be positive and finite",
            ));
        }
        Ok(Self {
            periods_per_year: trading_seconds_per_year / interval_secs as f64,
            ..Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(ConfigError::invalid(
                "periods_per_year",
                format!("must be positive, got {}", self.periods_per_year),
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::invalid("risk_free_rate", "must be finite"));
        }
        Ok(())
    }
}

// ─── Profit factor ───────────────────────────────────────────────────

/// Gross profit ÷ gross loss, with the degenerate cases spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfitFactor {
    Ratio { value: f64 },
    /// Winners but no losing trade: the ratio is unbounded.
    NoLosses,
    NoTrades,
}

impl ProfitFactor {
    /// Numeric value for scoring and ranking, capped at `PROFIT_FACTOR_CAP`.
    pub fn value(&self) -> f64 {
        match self {
            ProfitFactor::Ratio { value } => value.min(PROFIT_FACTOR_CAP),
            ProfitFactor::NoLosses => PROFIT_FACTOR_CAP,
            ProfitFactor::NoTrades => 0.0,
        }
    }
}

// ─── Aggregate ───────────────────────────────────────────────────────

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub net_profit: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Peak-to-trough decline as a negative fraction (-0.15 = 15%).
    pub max_drawdown: f64,
    /// Peak-to-trough decline in account currency (negative).
    pub max_drawdown_abs: f64,
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: ProfitFactor,
    pub expectancy: f64,
    pub avg_win: f64,
    /// Mean net PnL of losing trades (negative).
    pub avg_loss: f64,
    pub payoff_ratio: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub total_liquidation_fees: f64,
    pub liquidation_count: usize,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a trade list and equity series.
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        config: &MetricsConfig,
    ) -> Self {
        let equity = equity_series(equity_curve, initial_capital, config.equity_basis);
        let bar_count = equity_curve.len();
        let returns = match config.return_basis {
            ReturnBasis::PerBar => period_returns(&equity),
            ReturnBasis::PerTrade => trade_returns(trades, initial_capital),
        };
        let periods = annualization_periods(config, bar_count, returns.len());
        let rf = if periods > 0.0 {
            config.risk_free_rate / periods
        } else {
            0.0
        };

        let cagr = cagr(&equity, bar_count, config.periods_per_year);
        let max_drawdown = max_drawdown(&equity);
        let final_equity = equity.last().copied().unwrap_or(initial_capital);

        let winners: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_winner())
            .map(|t| t.net_pnl)
            .collect();
        let losers: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_loser())
            .map(|t| t.net_pnl)
            .collect();
        let avg_win = mean_f64(&winners);
        let avg_loss = mean_f64(&losers);

        Self {
            total_return: total_return(&equity),
            net_profit: final_equity - initial_capital,
            cagr,
            sharpe: sharpe_ratio(&returns, rf, periods),
            sortino: sortino_ratio(&returns, rf, periods),
            calmar: calmar_ratio(cagr, max_drawdown),
            max_drawdown,
            max_drawdown_abs: max_drawdown_abs(&equity),
            trade_count: trades.len(),
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            expectancy: expectancy(trades),
            avg_win,
            avg_loss,
            payoff_ratio: if avg_loss < 0.0 { avg_win / avg_loss.abs() } else { 0.0 },
            max_consecutive_wins: max_consecutive(trades, true),
            max_consecutive_losses: max_consecutive(trades, false),
            avg_bars_held: mean_f64(
                &trades.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>(),
            ),
            total_commission: trades.iter().map(|t| t.commission).sum(),
            total_slippage: trades.iter().map(|t| t.slippage).sum(),
            total_liquidation_fees: trades.iter().map(|t| t.liquidation_fee).sum(),
            liquidation_count: trades
                .iter()
                .filter(|t| t.exit_reason == ExitReason::Liquidation)
                .count(),
            final_equity,
        }
    }

    pub fn from_run(run: &RunResult, config: &MetricsConfig) -> Self {
        Self::compute(&run.trades, &run.equity_curve, run.initial_capital, config)
    }
}

// ─── Series helpers ──────────────────────────────────────────────────

/// Equity values prefixed with the initial capital, so the first bar's move
/// is a return like any other.
pub fn equity_series(points: &[EquityPoint], initial_capital: f64, basis: EquityBasis) -> Vec<f64> {
    std::iter::once(initial_capital)
        .chain(points.iter().map(|p| match basis {
            EquityBasis::Realized => p.equity,
            EquityBasis::MarkToMarket => p.mark_to_market,
        }))
        .collect()
}

/// Simple returns between consecutive equity values.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    if equity.len() < 2 {
        return Vec::new();
    }
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Each trade's net PnL over the realized equity just before it closed.
pub fn trade_returns(trades: &[Trade], initial_capital: f64) -> Vec<f64> {
    pnl_returns(trades.iter().map(|t| t.net_pnl), initial_capital)
}

/// Returns of a PnL sequence compounded onto `initial_capital`.
pub fn pnl_returns(pnls: impl IntoIterator<Item = f64>, initial_capital: f64) -> Vec<f64> {
    let mut equity = initial_capital;
    pnls.into_iter()
        .map(|pnl| {
            let r = if equity > 0.0 { pnl / equity } else { 0.0 };
            equity += pnl;
            r
        })
        .collect()
}

/// Periods per year for the active return basis. Per-trade returns are
/// annualized by the observed trade frequency.
fn annualization_periods(config: &MetricsConfig, bar_count: usize, n_returns: usize) -> f64 {
    match config.return_basis {
        ReturnBasis::PerBar => config.periods_per_year,
        ReturnBasis::PerTrade => {
            let years = bar_count as f64 / config.periods_per_year;
            if years > 0.0 {
                n_returns as f64 / years
            } else {
                0.0
            }
        }
    }
}

// ─── Individual metric functions ─────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth rate. A wiped-out account reports -1.0.
pub fn cagr(equity: &[f64], bar_count: usize, periods_per_year: f64) -> f64 {
    let (Some(&initial), Some(&last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    let years = bar_count as f64 / periods_per_year;
    if bar_count < 2 || initial <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    if last <= 0.0 {
        return -1.0;
    }
    (last / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe: mean(excess) / std(excess) × sqrt(periods).
///
/// Returns 0.0 for fewer than 2 returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], rf_per_period: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let excess: Vec<f64> = returns.iter().map(|r| r - rf_per_period).collect();
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * annualizer(periods_per_year)
}

/// Annualized Sortino: like Sharpe, but the denominator only counts
/// below-zero excess returns.
pub fn sortino_ratio(returns: &[f64], rf_per_period: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let excess: Vec<f64> = returns.iter().map(|r| r - rf_per_period).collect();
    let downside_sq: f64 = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq == 0.0 {
        return 0.0; // No downside → ratio undefined
    }
    let downside_std = (downside_sq / excess.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / downside_std * annualizer(periods_per_year)
}

fn annualizer(periods_per_year: f64) -> f64 {
    if periods_per_year > 0.0 {
        periods_per_year.sqrt()
    } else {
        1.0
    }
}

/// Calmar ratio: CAGR / |max_drawdown|. 0.0 without a drawdown.
pub fn calmar_ratio(cagr: f64, max_drawdown: f64) -> f64 {
    if max_drawdown >= 0.0 {
        return 0.0;
    }
    cagr / max_drawdown.abs()
}

/// Maximum drawdown as a negative fraction of the running peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Maximum drawdown in account currency (negative).
pub fn max_drawdown_abs(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        max_dd = max_dd.min(eq - peak);
    }
    max_dd
}

/// Win rate: fraction of trades with positive net PnL.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn profit_factor(trades: &[Trade]) -> ProfitFactor {
    if trades.is_empty() {
        return ProfitFactor::NoTrades;
    }
    let gross_profit: f64 = trades.iter().map(|t| t.net_pnl.max(0.0)).sum();
    let gross_loss: f64 = trades.iter().map(|t| (-t.net_pnl).max(0.0)).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 {
            ProfitFactor::NoLosses
        } else {
            ProfitFactor::Ratio { value: 0.0 }
        };
    }
    ProfitFactor::Ratio {
        value: gross_profit / gross_loss,
    }
}

/// Average net PnL per trade.
pub fn expectancy(trades: &[Trade]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.net_pnl).collect::<Vec<_>>())
}

pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_consecutive(trades, true)
}

pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_consecutive(trades, false)
}

/// Breakeven trades end both kinds of streak, matching the winner and loser
/// counts.
fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        let hit = if winners { trade.is_winner() } else { trade.is_loser() };
        if hit {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Statistics ──────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), Welford's update. Identical inputs
/// give exactly zero.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut mean = 0.0;
    let mut m2 = 0.0;
    for (i, &v) in values.iter().enumerate() {
        let delta = v - mean;
        mean += delta / (i + 1) as f64;
        m2 += delta * (v - mean);
    }
    (m2 / (values.len() - 1) as f64).max(0.0).sqrt()
}

/// Linear-interpolated percentile of an ascending slice, `p` in 0..=100.
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use tradelab_core::domain::{EquityPoint, ExitReason, PositionSide, Trade};

    pub fn ts(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i as i64)
    }

    pub fn make_trade(net_pnl: f64) -> Trade {
        Trade {
            side: PositionSide::Long,
            entry_bar: 0,
            entry_time: ts(0),
            entry_price: 100.0,
            exit_bar: 5,
            exit_time: ts(5),
            exit_price: 100.0 + net_pnl / 50.0,
            exit_reason: ExitReason::Signal,
            partial: false,
            size: 50.0,
            leverage: 1.0,
            gross_pnl: net_pnl,
            commission: 0.0,
            slippage: 0.0,
            liquidation_fee: 0.0,
            net_pnl,
            bars_held: 5,
            mae: 0.0,
            mfe: 0.0,
        }
    }

    pub fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                bar_index: i,
                timestamp: ts(i),
                equity: v,
                unrealized_pnl: 0.0,
                mark_to_market: v,
                used_margin: 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{curve, make_trade};
    use super::*;

    // ── Total return / CAGR ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 101_000.0, 110_000.0];
        assert!((total_return(&eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_degenerate() {
        assert_eq!(total_return(&[100_000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn cagr_one_year() {
        let mut eq = vec![100_000.0];
        for i in 1..=252 {
            eq.push(eq[i - 1] * 1.1_f64.powf(1.0 / 252.0));
        }
        let c = cagr(&eq, 252, 252.0);
        assert!((c - 0.1).abs() < 1e-9, "CAGR should be 10%, got {c}");
    }

    #[test]
    fn cagr_wiped_out() {
        assert_eq!(cagr(&[100.0, 50.0, 0.0], 2, 252.0), -1.0);
    }

    // ── Sharpe / Sortino ──

    #[test]
    fn sharpe_zero_variance_is_zero() {
        assert_eq!(sharpe_ratio(&[0.001; 100], 0.0, 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.0; 100], 0.0, 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 0.0, 252.0), 0.0);
    }

    #[test]
    fn sharpe_known_value() {
        // mean 0.01, sample std sqrt(2 × 0.0001 / 1) = 0.014142...
        let s = sharpe_ratio(&[0.0, 0.02], 0.0, 4.0);
        let expected = 0.01 / (0.0002_f64).sqrt() * 2.0;
        assert!((s - expected).abs() < 1e-12);
    }

    #[test]
    fn sortino_no_downside_is_zero() {
        assert_eq!(sortino_ratio(&[0.01, 0.02, 0.03], 0.0, 252.0), 0.0);
    }

    #[test]
    fn sortino_with_downside() {
        let s = sortino_ratio(&[0.02, -0.01, 0.02, 0.01], 0.0, 252.0);
        assert!(s > 0.0);
    }

    // ── Drawdown ──

    #[test]
    fn max_drawdown_known() {
        let eq = vec![100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (90_000.0 - 110_000.0) / 110_000.0;
        assert!((max_drawdown(&eq) - expected).abs() < 1e-12);
        assert_eq!(max_drawdown_abs(&eq), -20_000.0);
    }

    #[test]
    fn max_drawdown_monotonic() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(max_drawdown(&eq), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn calmar_requires_drawdown() {
        assert_eq!(calmar_ratio(0.2, 0.0), 0.0);
        assert!((calmar_ratio(0.2, -0.1) - 2.0).abs() < 1e-12);
    }

    // ── Trade statistics ──

    #[test]
    fn win_rate_mixed() {
        let trades = vec![
            make_trade(500.0),
            make_trade(-200.0),
            make_trade(300.0),
            make_trade(-100.0),
        ];
        assert!((win_rate(&trades) - 0.5).abs() < 1e-10);
        assert_eq!(win_rate(&[]), 0.0);
    }

    #[test]
    fn profit_factor_cases() {
        let mixed = vec![make_trade(500.0), make_trade(-200.0), make_trade(300.0)];
        assert_eq!(profit_factor(&mixed), ProfitFactor::Ratio { value: 4.0 });

        let all_winners = vec![make_trade(500.0), make_trade(300.0)];
        assert_eq!(profit_factor(&all_winners), ProfitFactor::NoLosses);
        assert_eq!(profit_factor(&all_winners).value(), PROFIT_FACTOR_CAP);

        let all_losers = vec![make_trade(-500.0)];
        assert_eq!(profit_factor(&all_losers), ProfitFactor::Ratio { value: 0.0 });

        assert_eq!(profit_factor(&[]), ProfitFactor::NoTrades);
        assert_eq!(ProfitFactor::NoTrades.value(), 0.0);
    }

    #[test]
    fn profit_factor_serializes_with_type_tag() {
        let json = serde_json::to_string(&ProfitFactor::NoLosses).unwrap();
        assert_eq!(json, r#"{"type":"NO_LOSSES"}"#);
    }

    #[test]
    fn consecutive_streaks() {
        let trades = vec![
            make_trade(100.0),
            make_trade(200.0),
            make_trade(300.0),
            make_trade(-100.0),
            make_trade(-50.0),
            make_trade(200.0),
        ];
        assert_eq!(max_consecutive_wins(&trades), 3);
        assert_eq!(max_consecutive_losses(&trades), 2);
    }

    #[test]
    fn breakeven_trades_break_losing_streaks() {
        let trades = vec![
            make_trade(-100.0),
            make_trade(0.0),
            make_trade(-50.0),
            make_trade(0.0),
        ];
        let m = PerformanceMetrics::compute(&trades, &[], 10_000.0, &MetricsConfig::default());
        assert_eq!(m.losing_trades, 2);
        assert_eq!(m.winning_trades, 0);
        assert_eq!(m.max_consecutive_losses, 1);
        assert_eq!(m.max_consecutive_wins, 0);
    }

    #[test]
    fn std_dev_of_identical_values_is_exactly_zero() {
        for value in [150.0 / 10_000.0, 0.0123456, -3.3, 1e6 + 0.1] {
            let values = vec![value; 5_000];
            assert_eq!(std_dev(&values), 0.0);
        }
        let spread = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((spread - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn trade_returns_compound() {
        let trades = vec![make_trade(100.0), make_trade(-110.0)];
        let r = trade_returns(&trades, 1_000.0);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
    }

    // ── Configuration ──

    #[test]
    fn for_interval_daily_equities() {
        let c = MetricsConfig::for_interval(23_400, EQUITY_SESSION_SECONDS_PER_YEAR).unwrap();
        assert!((c.periods_per_year - 252.0).abs() < 1e-9);
        assert!(MetricsConfig::for_interval(0, CALENDAR_SECONDS_PER_YEAR).is_err());
    }

    // ── Aggregate ──

    #[test]
    fn no_trades_flat_equity_is_all_zero() {
        let m = PerformanceMetrics::compute(
            &[],
            &curve(&[10_000.0; 50]),
            10_000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(m.trade_count, 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.sortino, 0.0);
        assert_eq!(m.calmar, 0.0);
        assert_eq!(m.expectancy, 0.0);
        assert_eq!(m.payoff_ratio, 0.0);
        assert_eq!(m.profit_factor, ProfitFactor::NoTrades);
        assert_eq!(m.final_equity, 10_000.0);
    }

    #[test]
    fn empty_run_is_safe() {
        let m = PerformanceMetrics::compute(&[], &[], 10_000.0, &MetricsConfig::default());
        assert_eq!(m.final_equity, 10_000.0);
        assert_eq!(m.cagr, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
    }

    #[test]
    fn aggregate_with_trades() {
        let trades = vec![make_trade(500.0), make_trade(-200.0), make_trade(300.0)];
        let m = PerformanceMetrics::compute(
            &trades,
            &curve(&[10_000.0, 10_500.0, 10_300.0, 10_600.0]),
            10_000.0,
            &MetricsConfig::default(),
        );
        assert_eq!(m.trade_count, 3);
        assert_eq!(m.winning_trades, 2);
        assert_eq!(m.losing_trades, 1);
        assert!((m.expectancy - 200.0).abs() < 1e-9);
        assert!((m.avg_win - 400.0).abs() < 1e-9);
        assert!((m.avg_loss + 200.0).abs() < 1e-9);
        assert!((m.payoff_ratio - 2.0).abs() < 1e-9);
        assert!((m.net_profit - 600.0).abs() < 1e-9);
        assert!((m.total_return - 0.06).abs() < 1e-12);
        assert!(m.max_drawdown < 0.0);
        assert!(m.sharpe.is_finite() && m.sortino.is_finite() && m.calmar.is_finite());
    }

    #[test]
    fn per_trade_basis_uses_trade_returns() {
        let trades = vec![make_trade(100.0), make_trade(-50.0), make_trade(200.0)];
        let config = MetricsConfig {
            return_basis: ReturnBasis::PerTrade,
            ..MetricsConfig::default()
        };
        let m = PerformanceMetrics::compute(
            &trades,
            &curve(&[10_000.0; 252]),
            10_000.0,
            &config,
        );
        // One year of bars → annualized by 3 trades per year.
        let r = trade_returns(&trades, 10_000.0);
        let expected = mean_f64(&r) / std_dev(&r) * 3.0_f64.sqrt();
        assert!((m.sharpe - expected).abs() < 1e-12);
    }
}
