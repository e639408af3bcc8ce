//! Integration tests for the engine event loop.
//!
//! Covers:
//! 1. Cash-flow arithmetic on a plain round trip
//! 2. Liquidation ordering and terminal state
//! 3. Exit priority, gap-through fills, trailing and breakeven stops
//! 4. Scale-in, partial closes, time exits, end-of-data closes
//! 5. Next-bar-open timing and void bar pass-through
//! 6. Input validation errors

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tradelab_core::config::{
    BreakevenConfig, ExitPriority, GapPolicy, PartialTarget, PartialTrigger, ScaleInConfig,
    SignalTiming, SlippageModel, TradingMode, TrailingConfig,
};
use tradelab_core::domain::{Bar, ExitReason, PositionSide, Signal, SignalDirection};
use tradelab_core::engine::{run_backtest, EngineStateKind, RunResult};
use tradelab_core::error::{DataError, EngineError};
use tradelab_core::risk::{MarginTierTable, RejectReason, SizingMode};
use tradelab_core::EngineConfig;

// ── Helpers ──────────────────────────────────────────────────────────

fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(ts(i), open, high, low, close, 1_000.0)
}

/// Quiet bar around `close`.
fn calm(i: usize, close: f64) -> Bar {
    bar(i, close, close + 0.5, close - 0.5, close)
}

fn sig(i: usize, direction: SignalDirection) -> Signal {
    Signal::new(ts(i), direction)
}

/// 10k capital, frictionless, one unit per 100 of notional.
fn base_config() -> EngineConfig {
    let mut config = EngineConfig::new(10_000.0);
    config.sizing = SizingMode::FixedNotional { amount: 100.0 };
    config
}

fn run(bars: &[Bar], signals: &[Signal], config: &EngineConfig) -> RunResult {
    run_backtest(bars, signals, config).unwrap()
}

fn assert_approx(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ── 1. Round trip ────────────────────────────────────────────────────

#[test]
fn long_round_trip_commission_example() {
    let mut config = base_config();
    config.commission_rate = 0.0007;
    let bars = vec![
        bar(0, 100.0, 101.0, 99.0, 100.0),
        bar(1, 105.0, 111.0, 104.0, 110.0),
    ];
    let signals = vec![
        sig(0, SignalDirection::Long),
        sig(1, SignalDirection::Flat),
    ];

    let result = run(&bars, &signals, &config);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_approx(trade.size, 1.0);
    assert_approx(trade.gross_pnl, 10.0);
    assert_approx(trade.commission, 0.147);
    assert_approx(trade.net_pnl, 9.853);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    assert_approx(result.final_equity, 10_009.853);
    assert_eq!(result.final_state, EngineStateKind::Flat);
}

#[test]
fn slippage_is_a_cost_not_a_price() {
    let mut config = base_config();
    config.slippage = SlippageModel::PerUnit { amount: 0.05 };
    let bars = vec![calm(0, 100.0), calm(1, 102.0)];
    let signals = vec![sig(0, SignalDirection::Short), sig(1, SignalDirection::Flat)];

    let trade = &run(&bars, &signals, &config).trades[0];
    assert_eq!(trade.entry_price, 100.0);
    assert_eq!(trade.exit_price, 102.0);
    assert_approx(trade.gross_pnl, -2.0);
    assert_approx(trade.slippage, 0.1);
    assert_approx(trade.net_pnl, -2.1);
}

#[test]
fn all_flat_signals_produce_no_trades() {
    let bars: Vec<Bar> = (0..30).map(|i| calm(i, 100.0 + i as f64)).collect();
    let signals: Vec<Signal> = (0..30).map(|i| sig(i, SignalDirection::Flat)).collect();
    let result = run(&bars, &signals, &base_config());
    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), 30);
    assert!(result.equity_curve.iter().all(|p| p.equity == 10_000.0));
}

#[test]
fn realized_equity_moves_only_at_closes() {
    let bars: Vec<Bar> = (0..6).map(|i| calm(i, 100.0 + 2.0 * i as f64)).collect();
    let signals = vec![sig(1, SignalDirection::Long), sig(4, SignalDirection::Flat)];
    let result = run(&bars, &signals, &base_config());

    let size = 100.0 / 102.0;
    let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
    assert_eq!(equity[..4], [10_000.0; 4]);
    assert_approx(equity[4], 10_000.0 + 6.0 * size);
    // Mark-to-market follows the open position.
    assert_approx(result.equity_curve[3].unrealized_pnl, 4.0 * size);
    assert_approx(result.equity_curve[3].used_margin, 100.0);
    assert_approx(
        result.equity_curve[3].mark_to_market,
        10_000.0 + 4.0 * size,
    );
}

// ── 2. Liquidation ───────────────────────────────────────────────────

#[test]
fn liquidation_fires_before_stop_loss() {
    let mut config = base_config();
    config.leverage = 50.0;
    config.margin_tiers = MarginTierTable::flat(0.01).unwrap();
    config.sizing = SizingMode::FixedNotional { amount: 1_000.0 };
    config.exits.stop_loss_pct = Some(0.015);

    let bars = vec![
        bar(0, 100.0, 101.0, 99.0, 100.0),
        // 2% adverse move: liquidation at 99 and stop at 98.5 both inside the range.
        bar(1, 100.0, 100.5, 98.0, 98.5),
        bar(2, 98.5, 99.0, 98.0, 98.5),
    ];
    let signals = vec![sig(0, SignalDirection::Long), sig(2, SignalDirection::Long)];

    let result = run(&bars, &signals, &config);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Liquidation);
    assert_approx(trade.exit_price, 99.0);
    assert_approx(trade.gross_pnl, -10.0);
    // Remaining isolated margin (20 − 10) is forfeited.
    assert_approx(trade.liquidation_fee, 10.0);
    assert_approx(trade.net_pnl, -20.0);
    assert_approx(result.final_equity, 9_980.0);
    assert!(result.liquidated());
    // No re-entry after liquidation.
    assert!(result.rejected_entries.is_empty());
    assert_eq!(result.equity_curve.len(), 3);
}

#[test]
fn no_liquidation_without_leverage() {
    let mut config = base_config();
    config.margin_tiers = MarginTierTable::flat(0.01).unwrap();
    let bars = vec![calm(0, 100.0), bar(1, 100.0, 100.5, 60.0, 70.0)];
    let signals = vec![sig(0, SignalDirection::Long)];
    let result = run(&bars, &signals, &config);
    assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
    assert!(!result.liquidated());
}

#[test]
fn cross_margin_liquidation_never_goes_negative() {
    let mut config = EngineConfig::new(100.0);
    config.leverage = 10.0;
    config.margin_mode = tradelab_core::domain::MarginMode::Cross;
    config.margin_tiers = MarginTierTable::flat(0.005).unwrap();
    config.sizing = SizingMode::FixedFraction { fraction: 1.0 };
    let bars = vec![calm(0, 100.0), bar(1, 100.0, 100.5, 80.0, 85.0)];
    let signals = vec![sig(0, SignalDirection::Long)];

    let result = run(&bars, &signals, &config);
    assert!(result.liquidated());
    assert!(result.final_equity >= 0.0);
    assert!(result.final_equity < 1e-9);
}

// ── 3. Protective exits ──────────────────────────────────────────────

fn bracket_config(priority: ExitPriority) -> EngineConfig {
    let mut config = base_config();
    config.exits.stop_loss_pct = Some(0.05);
    config.exits.take_profit_pct = Some(0.05);
    config.exits.priority = priority;
    config
}

#[test]
fn same_bar_stop_and_target_follow_priority() {
    let bars = vec![calm(0, 100.0), bar(1, 100.0, 106.0, 94.0, 100.0)];
    let signals = vec![sig(0, SignalDirection::Long)];

    let sl_first = run(&bars, &signals, &bracket_config(ExitPriority::StopLossFirst));
    assert_eq!(sl_first.trades[0].exit_reason, ExitReason::StopLoss);
    assert_approx(sl_first.trades[0].exit_price, 95.0);

    let tp_first = run(&bars, &signals, &bracket_config(ExitPriority::TakeProfitFirst));
    assert_eq!(tp_first.trades[0].exit_reason, ExitReason::TakeProfit);
    assert_approx(tp_first.trades[0].exit_price, 105.0);
}

#[test]
fn ohlc_path_uses_distance_from_open() {
    let config = bracket_config(ExitPriority::OhlcPath);
    // Open closer to the high: high visited first, target wins.
    let up_first = vec![calm(0, 100.0), bar(1, 101.0, 106.0, 94.0, 100.0)];
    let result = run(&up_first, &[sig(0, SignalDirection::Long)], &config);
    assert_eq!(result.trades[0].exit_reason, ExitReason::TakeProfit);

    let down_first = vec![calm(0, 100.0), bar(1, 99.0, 106.0, 94.0, 100.0)];
    let result = run(&down_first, &[sig(0, SignalDirection::Long)], &config);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
}

#[test]
fn gapped_stop_fills_at_open() {
    let mut config = base_config();
    config.exits.stop_loss_pct = Some(0.05);
    let bars = vec![calm(0, 100.0), bar(1, 90.0, 92.0, 89.0, 91.0)];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_approx(trade.exit_price, 90.0);
    assert!(trade.pnl_before_costs() < 0.0);
}

#[test]
fn short_stop_sits_above_entry() {
    let mut config = base_config();
    config.exits.stop_loss_pct = Some(0.05);
    let bars = vec![calm(0, 100.0), bar(1, 101.0, 106.0, 100.5, 104.0)];
    let result = run(&bars, &[sig(0, SignalDirection::Short)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Short);
    assert_approx(trade.exit_price, 105.0);
    assert_approx(trade.gross_pnl, -5.0);
}

#[test]
fn trailing_stop_ratchets_and_exits() {
    let mut config = base_config();
    config.exits.trailing = Some(TrailingConfig {
        activation_pct: 0.0,
        trail_pct: 0.05,
    });
    let bars = vec![
        calm(0, 100.0),
        bar(1, 100.0, 110.0, 99.0, 109.0),
        // Lower high does not loosen the 104.5 trail.
        bar(2, 108.0, 108.0, 103.0, 104.0),
    ];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
    assert_approx(trade.exit_price, 104.5);
    assert_approx(trade.mfe, 10.0);
    assert_eq!(trade.exit_bar, 2);
}

#[test]
fn trailing_waits_for_activation() {
    let mut config = base_config();
    config.exits.trailing = Some(TrailingConfig {
        activation_pct: 0.2,
        trail_pct: 0.02,
    });
    let bars = vec![
        calm(0, 100.0),
        bar(1, 100.0, 110.0, 99.0, 109.0),
        bar(2, 108.0, 108.0, 100.0, 101.0),
    ];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    // Never armed: the position survives until end of data.
    assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
}

#[test]
fn breakeven_lock_then_exit() {
    let mut config = base_config();
    config.exits.stop_loss_pct = Some(0.05);
    config.exits.breakeven = Some(BreakevenConfig {
        trigger_pct: 0.03,
        buffer_pct: 0.001,
    });
    let bars = vec![
        calm(0, 100.0),
        bar(1, 100.0, 104.0, 99.0, 103.0),
        bar(2, 102.0, 102.5, 99.5, 100.0),
    ];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::Breakeven);
    assert_approx(trade.exit_price, 100.1);
    assert!(trade.gross_pnl > 0.0);
}

#[test]
fn stop_adjustments_take_effect_next_bar() {
    let mut config = base_config();
    config.exits.trailing = Some(TrailingConfig {
        activation_pct: 0.0,
        trail_pct: 0.01,
    });
    // Bar 1 rallies to 110 then dips to 102: the 108.9 trail computed from
    // that high only applies from bar 2.
    let bars = vec![
        calm(0, 100.0),
        bar(1, 103.0, 110.0, 102.0, 104.0),
        calm(2, 104.0),
    ];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_bar, 2);
    assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
    // Bar 2 opens below the trail: gap fill at the open.
    assert_approx(trade.exit_price, 104.0);
}

#[test]
fn time_exit_closes_at_bar_close() {
    let mut config = base_config();
    config.exits.time_exit_bars = Some(2);
    let bars: Vec<Bar> = (0..5).map(|i| calm(i, 100.0 + i as f64)).collect();
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TimeExit);
    assert_eq!(trade.exit_bar, 2);
    assert_eq!(trade.bars_held, 2);
    assert_approx(trade.exit_price, 102.0);
}

// ── 4. Position shaping ──────────────────────────────────────────────

#[test]
fn scale_in_averages_entry_and_respects_cap() {
    let mut config = base_config();
    config.scale_in = Some(ScaleInConfig {
        max_entries: 2,
        step_pct: Some(0.02),
        size_multiplier: 1.0,
    });
    let bars = vec![
        calm(0, 100.0),
        // 1% adverse: below the step, ignored.
        calm(1, 99.0),
        calm(2, 97.0),
        calm(3, 90.0),
        calm(4, 100.0),
    ];
    let signals = vec![
        sig(0, SignalDirection::Long),
        sig(1, SignalDirection::Long),
        sig(2, SignalDirection::Long),
        sig(3, SignalDirection::Long),
        sig(4, SignalDirection::Flat),
    ];
    let result = run(&bars, &signals, &config);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    let added = 100.0 / 97.0;
    assert_approx(trade.size, 1.0 + added);
    assert_approx(trade.entry_price, 200.0 / (1.0 + added));
    assert_eq!(trade.entry_bar, 0);
}

#[test]
fn scale_in_disabled_after_breakeven() {
    let mut config = base_config();
    config.scale_in = Some(ScaleInConfig {
        max_entries: 3,
        step_pct: None,
        size_multiplier: 1.0,
    });
    config.exits.breakeven = Some(BreakevenConfig {
        trigger_pct: 0.01,
        buffer_pct: 0.0,
    });
    let bars = vec![calm(0, 100.0), calm(1, 102.0), calm(2, 102.0), calm(3, 103.0)];
    let signals = vec![
        sig(0, SignalDirection::Long),
        sig(2, SignalDirection::Long),
        sig(3, SignalDirection::Flat),
    ];
    let result = run(&bars, &signals, &config);
    assert_approx(result.trades[0].size, 1.0);
}

#[test]
fn partial_close_realizes_slice_once() {
    let mut config = base_config();
    config.exits.partial_targets = vec![PartialTarget {
        trigger: PartialTrigger::ProfitPct { pct: 0.05 },
        fraction: 0.5,
    }];
    let bars = vec![
        calm(0, 100.0),
        bar(1, 100.0, 106.0, 99.0, 104.0),
        bar(2, 104.0, 107.0, 103.0, 104.0),
    ];
    let signals = vec![sig(0, SignalDirection::Long), sig(2, SignalDirection::Flat)];
    let result = run(&bars, &signals, &config);

    assert_eq!(result.trades.len(), 2);
    let partial = &result.trades[0];
    assert!(partial.partial);
    assert_eq!(partial.exit_reason, ExitReason::PartialClose);
    assert_approx(partial.size, 0.5);
    assert_approx(partial.exit_price, 105.0);
    assert_approx(partial.gross_pnl, 2.5);

    let rest = &result.trades[1];
    assert!(!rest.partial);
    assert_approx(rest.size, 0.5);
    assert_approx(rest.gross_pnl, 2.0);
    assert_approx(result.final_equity, 10_004.5);
}

#[test]
fn bars_held_partial_fills_at_close() {
    let mut config = base_config();
    config.exits.partial_targets = vec![PartialTarget {
        trigger: PartialTrigger::BarsHeld { bars: 1 },
        fraction: 0.25,
    }];
    let bars = vec![calm(0, 100.0), calm(1, 101.0), calm(2, 102.0)];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    assert_eq!(result.trades.len(), 2);
    assert_approx(result.trades[0].exit_price, 101.0);
    assert_approx(result.trades[0].size, 0.25);
    assert_eq!(result.trades[1].exit_reason, ExitReason::EndOfData);
    assert_approx(result.trades[1].size, 0.75);
}

#[test]
fn opposite_signal_reverses() {
    let bars: Vec<Bar> = (0..4).map(|i| calm(i, 100.0 + i as f64)).collect();
    let signals = vec![sig(0, SignalDirection::Long), sig(2, SignalDirection::Short)];
    let result = run(&bars, &signals, &base_config());
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].side, PositionSide::Long);
    assert_eq!(result.trades[0].exit_reason, ExitReason::Signal);
    assert_eq!(result.trades[1].side, PositionSide::Short);
    assert_eq!(result.trades[1].entry_bar, 2);
    assert_eq!(result.trades[1].exit_reason, ExitReason::EndOfData);
}

#[test]
fn long_only_mode_rejects_short_entries() {
    let mut config = base_config();
    config.trading_mode = TradingMode::LongOnly;
    let bars: Vec<Bar> = (0..4).map(|i| calm(i, 100.0)).collect();
    let signals = vec![
        sig(0, SignalDirection::Long),
        sig(1, SignalDirection::Short),
        sig(2, SignalDirection::Short),
    ];
    let result = run(&bars, &signals, &config);
    // Short signal closes the long without reversing.
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_bar, 1);
    assert_eq!(result.rejected_entries.len(), 1);
    assert_eq!(result.rejected_entries[0].bar_index, 2);
    assert_eq!(
        result.rejected_entries[0].reason,
        RejectReason::DirectionNotAllowed
    );
}

#[test]
fn open_position_kept_when_close_at_end_disabled() {
    let mut config = base_config();
    config.close_at_end = false;
    let bars: Vec<Bar> = (0..3).map(|i| calm(i, 100.0 + i as f64)).collect();
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    assert!(result.trades.is_empty());
    assert_eq!(result.final_state, EngineStateKind::Open);
    assert_approx(result.equity_curve[2].unrealized_pnl, 2.0);
}

// ── 5. Timing and gaps ───────────────────────────────────────────────

#[test]
fn next_bar_open_fills_at_following_open() {
    let mut config = base_config();
    config.signal_timing = SignalTiming::NextBarOpen;
    let bars = vec![
        calm(0, 100.0),
        bar(1, 102.0, 103.0, 101.0, 102.5),
        calm(2, 103.0),
        bar(3, 105.0, 105.5, 104.0, 104.5),
    ];
    let signals = vec![sig(0, SignalDirection::Long), sig(2, SignalDirection::Flat)];
    let result = run(&bars, &signals, &config);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_bar, 1);
    assert_approx(trade.entry_price, 102.0);
    assert_eq!(trade.exit_bar, 3);
    assert_approx(trade.exit_price, 105.0);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
}

#[test]
fn pending_entry_on_last_bar_is_dropped() {
    let mut config = base_config();
    config.signal_timing = SignalTiming::NextBarOpen;
    let bars: Vec<Bar> = (0..3).map(|i| calm(i, 100.0)).collect();
    let result = run(&bars, &[sig(2, SignalDirection::Long)], &config);
    assert!(result.trades.is_empty());
    assert_eq!(result.final_state, EngineStateKind::Flat);
}

#[test]
fn next_bar_open_skips_void_bars() {
    let mut config = base_config();
    config.signal_timing = SignalTiming::NextBarOpen;
    config.gap_policy = GapPolicy::PassThrough;
    let mut void = calm(1, 100.0);
    void.open = f64::NAN;
    void.high = f64::NAN;
    void.low = f64::NAN;
    void.close = f64::NAN;
    let bars = vec![calm(0, 100.0), void, bar(2, 101.0, 102.0, 100.5, 101.5), calm(3, 102.0)];
    let result = run(&bars, &[sig(0, SignalDirection::Long)], &config);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_bar, 2);
    assert_approx(trade.entry_price, 101.0);
    assert_eq!(result.void_bars, 1);
}

#[test]
fn void_bar_carries_equity_forward() {
    let mut config = base_config();
    config.gap_policy = GapPolicy::PassThrough;
    let mut void = calm(2, 0.0);
    void.open = f64::NAN;
    void.high = f64::NAN;
    void.low = f64::NAN;
    void.close = f64::NAN;
    let bars = vec![calm(0, 100.0), calm(1, 103.0), void, calm(3, 104.0)];
    let signals = vec![sig(0, SignalDirection::Long)];
    let result = run(&bars, &signals, &config);

    let at_void = &result.equity_curve[2];
    assert_eq!(at_void.equity, 10_000.0);
    assert_approx(at_void.unrealized_pnl, 3.0);
    assert_approx(result.void_bar_rate(), 0.25);
    assert_eq!(result.trades[0].exit_bar, 3);
}

#[test]
fn interval_gap_suppresses_signal_only() {
    let mut config = base_config();
    config.gap_policy = GapPolicy::PassThrough;
    config.max_bar_interval_secs = Some(86_400);
    let bars = vec![calm(0, 100.0), calm(1, 100.0), calm(5, 100.0), calm(6, 100.0)];
    let signals = vec![sig(5, SignalDirection::Long), sig(6, SignalDirection::Long)];
    let result = run(&bars, &signals, &config);
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].entry_bar, 3);
}

// ── 6. Validation errors ─────────────────────────────────────────────

#[test]
fn duplicate_timestamp_is_data_error() {
    let bars = vec![calm(0, 100.0), calm(0, 101.0)];
    let err = run_backtest(&bars, &[], &base_config()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Data(DataError::DuplicateTimestamp { index: 1, .. })
    ));
}

#[test]
fn void_bar_rejected_by_default() {
    let mut void = calm(1, 100.0);
    void.close = f64::NAN;
    let bars = vec![calm(0, 100.0), void];
    let err = run_backtest(&bars, &[], &base_config()).unwrap_err();
    assert!(matches!(err, EngineError::Data(DataError::Gap { index: 1, .. })));
}

#[test]
fn unaligned_signal_is_data_error() {
    let bars = vec![calm(0, 100.0), calm(2, 100.0)];
    let err = run_backtest(&bars, &[sig(1, SignalDirection::Long)], &base_config()).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Data(DataError::UnalignedSignal { .. })
    ));
}

#[test]
fn nan_strength_signal_is_ignored() {
    let bars: Vec<Bar> = (0..3).map(|i| calm(i, 100.0)).collect();
    let signals = vec![sig(0, SignalDirection::Long).with_strength(f64::NAN)];
    let result = run(&bars, &signals, &base_config());
    assert!(result.trades.is_empty());
}

#[test]
fn empty_input_is_a_safe_run() {
    let result = run(&[], &[], &base_config());
    assert_eq!(result.bar_count, 0);
    assert!(result.equity_curve.is_empty());
    assert_eq!(result.final_equity, 10_000.0);
}
