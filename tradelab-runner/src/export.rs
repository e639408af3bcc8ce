//! Export: JSON and CSV artifacts.
//!
//! - **JSON**: full round-trip serialization with schema versioning, plus
//!   plain JSON for grid, walk-forward and Monte-Carlo reports.
//! - **CSV**: trade tape, equity curve and optimization table. Column names
//!   and order are part of the public contract (`*_COLUMNS`).
//!
//! Persisted backtest results carry a `schema_version`; newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tradelab_core::domain::{EquityPoint, Trade};
use tradelab_core::params::describe;

use crate::grid::GridReport;
use crate::metrics::PerformanceMetrics;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

pub const TRADE_COLUMNS: [&str; 19] = [
    "side",
    "entry_bar",
    "entry_time",
    "entry_price",
    "exit_bar",
    "exit_time",
    "exit_price",
    "exit_reason",
    "partial",
    "size",
    "leverage",
    "gross_pnl",
    "commission",
    "slippage",
    "liquidation_fee",
    "net_pnl",
    "bars_held",
    "mae",
    "mfe",
];

pub const EQUITY_COLUMNS: [&str; 6] = [
    "bar_index",
    "timestamp",
    "equity",
    "unrealized_pnl",
    "mark_to_market",
    "used_margin",
];

pub const OPTIMIZATION_COLUMNS: [&str; 12] = [
    "index",
    "rank",
    "status",
    "score",
    "params",
    "fingerprint",
    "total_return",
    "sharpe",
    "max_drawdown",
    "trade_count",
    "win_rate",
    "profit_factor",
];

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Pretty JSON for any report (`GridReport`, `WalkForwardReport`,
/// `MonteCarloReport`, ...).
pub fn export_report_json<T: Serialize>(report: &T) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Trade tape, one row per (possibly partial) trade. Columns: [`TRADE_COLUMNS`].
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side),
            &t.entry_bar.to_string(),
            &t.entry_time.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:?}", t.exit_reason),
            &t.partial.to_string(),
            &format!("{:.6}", t.size),
            &format!("{:.2}", t.leverage),
            &format!("{:.2}", t.gross_pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.slippage),
            &format!("{:.2}", t.liquidation_fee),
            &format!("{:.2}", t.net_pnl),
            &t.bars_held.to_string(),
            &format!("{:.2}", t.mae),
            &format!("{:.2}", t.mfe),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Bar-by-bar equity. Columns: [`EQUITY_COLUMNS`].
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(EQUITY_COLUMNS)?;
    for p in equity_curve {
        wtr.write_record([
            &p.bar_index.to_string(),
            &p.timestamp.to_string(),
            &format!("{:.2}", p.equity),
            &format!("{:.2}", p.unrealized_pnl),
            &format!("{:.2}", p.mark_to_market),
            &format!("{:.2}", p.used_margin),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Grid results in rank order, then unranked results in product order.
/// Columns: [`OPTIMIZATION_COLUMNS`]. Metric cells are empty for failed or
/// cancelled combinations.
pub fn export_optimization_csv(report: &GridReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(OPTIMIZATION_COLUMNS)?;

    let unranked = report.results.iter().filter(|r| r.rank.is_none());
    for r in report.ranked().chain(unranked) {
        let m = r.metrics.as_ref();
        wtr.write_record([
            r.index.to_string(),
            r.rank.map(|n| n.to_string()).unwrap_or_default(),
            r.status.code().to_string(),
            r.score.map(|s| format!("{s:.6}")).unwrap_or_default(),
            describe(&r.params),
            r.fingerprint.clone(),
            cell(m, |m| format!("{:.6}", m.total_return)),
            cell(m, |m| format!("{:.4}", m.sharpe)),
            cell(m, |m| format!("{:.6}", m.max_drawdown)),
            cell(m, |m| m.trade_count.to_string()),
            cell(m, |m| format!("{:.4}", m.win_rate)),
            cell(m, |m| format!("{:.4}", m.profit_factor.value())),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

fn cell(metrics: Option<&PerformanceMetrics>, f: impl Fn(&PerformanceMetrics) -> String) -> String {
    metrics.map(f).unwrap_or_default()
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for a single backtest run.
///
/// Creates `{strategy}_{fingerprint prefix}/` under `output_dir` containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `trades.csv`: trade tape
/// - `equity.csv`: bar-by-bar equity
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = result.param_fingerprint.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.strategy, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.run.trades)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&result.run.equity_curve)?,
    )?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::{curve, make_trade};
    use crate::metrics::MetricsConfig;
    use chrono::{Duration, NaiveDate};
    use tradelab_core::domain::{Bar, NullSignal};
    use tradelab_core::EngineConfig;

    fn bars(n: usize) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Bar::new(base + Duration::days(i as i64), close, close + 1.0, close - 1.0, close, 500.0)
            })
            .collect()
    }

    fn header(csv: &str) -> Vec<&str> {
        csv.lines().next().unwrap().split(',').collect()
    }

    #[test]
    fn trade_csv_columns() {
        let csv = export_trades_csv(&[make_trade(25.0), make_trade(-10.0)]).unwrap();
        assert_eq!(header(&csv), TRADE_COLUMNS);
        assert_eq!(csv.lines().count(), 3);
        let row: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(row.len(), TRADE_COLUMNS.len());
        assert_eq!(row[0], "Long");
        assert_eq!(row[15], "25.00");
    }

    #[test]
    fn equity_csv_columns() {
        let csv = export_equity_csv(&curve(&[100.0, 101.5])).unwrap();
        assert_eq!(header(&csv), EQUITY_COLUMNS);
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(2).unwrap().ends_with("101.50,0.00"));
    }

    #[test]
    fn json_round_trip_and_version_guard() {
        let bars = bars(30);
        let result = crate::runner::run_single(
            &bars,
            &NullSignal,
            &EngineConfig::new(10_000.0),
            &MetricsConfig::default(),
        )
        .unwrap();
        let json = export_json(&result).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.metrics, result.metrics);
        assert_eq!(back.run.bar_count, 30);

        let newer = json.replacen(
            &format!("\"schema_version\": {SCHEMA_VERSION}"),
            &format!("\"schema_version\": {}", SCHEMA_VERSION + 1),
            1,
        );
        assert!(import_json(&newer).is_err());
    }

    #[test]
    fn trade_prices_reload_bit_exact() {
        let mut trade = make_trade(25.0);
        trade.entry_price = 100.93665204840624;
        trade.exit_price = 0.1 + 0.2;
        trade.mae = -1.0 / 3.0;
        trade.mfe = 2.0_f64.sqrt();
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entry_price.to_bits(), trade.entry_price.to_bits());
        assert_eq!(back.exit_price.to_bits(), trade.exit_price.to_bits());
        assert_eq!(back, trade);
    }

    #[test]
    fn metrics_serialize_as_report_json() {
        let m = PerformanceMetrics::compute(
            &[make_trade(10.0)],
            &curve(&[1_000.0, 1_010.0]),
            1_000.0,
            &MetricsConfig::default(),
        );
        let json = export_report_json(&m).unwrap();
        assert!(json.contains("\"trade_count\": 1"));
    }
}
