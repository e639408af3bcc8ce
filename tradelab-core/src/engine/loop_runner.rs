//! Bar-by-bar event loop: the heart of the backtesting engine.
//!
//! Per tradable bar, in fixed order:
//! 1. Pending next-open action fills at the open
//! 2. Liquidation check against the adverse extreme
//! 3. Protective exits: stop family, take-profit, time exit
//! 4. Scheduled partial closes
//! 5. Signal step: exit, reverse, scale-in, entry
//! 6. Maintenance: excursions, breakeven lock, trailing ratchet
//! 7. End-of-data close on the last tradable bar
//! 8. Equity point
//!
//! Void bars only carry the equity point forward at the last valid close.

use tracing::debug;

use crate::config::{EngineConfig, PartialTrigger, SignalTiming};
use crate::domain::{
    Bar, Entry, EquityPoint, ExitReason, MarginMode, Order, OrderKind, Position, PositionSide,
    Signal, SignalDirection, SignalGenerator, Trade,
};
use crate::error::{EngineError, SimulationError};
use crate::indicators::{Atr, Indicator};
use crate::risk::{
    is_liquidated, liquidation_price, LiquidationInput, RejectReason, RejectedEntry, RiskState,
    SizingRequest,
};

use super::accounting::{settle_slice, ExitFill, Ledger};
use super::data::{align_signals, validate_bars, BarStatus};
use super::execution::{resolve_exit, stop_fill_price, target_fill_price, CostModel, ExitHit};
use super::state::{EngineStateKind, Lifecycle, RunResult};

/// Action decided at a bar's close and filled at the next tradable open.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingAction {
    Enter {
        side: PositionSide,
        strength: Option<f64>,
        signal_bar: usize,
    },
    Exit {
        reason: ExitReason,
    },
    Reverse {
        side: PositionSide,
        strength: Option<f64>,
        signal_bar: usize,
    },
    ScaleIn {
        strength: Option<f64>,
        signal_bar: usize,
    },
}

/// Run a backtest on a bar series and a precomputed signal stream.
///
/// The configuration is validated first, then bars and signals; any of the
/// three can fail fast before the loop starts. A `SimulationError` raised
/// inside the loop aborts this run only.
pub fn run_backtest(
    bars: &[Bar],
    signals: &[Signal],
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    config.validate()?;
    let statuses = validate_bars(bars, config.gap_policy, config.max_bar_interval_secs)?;
    let mut aligned = align_signals(bars, signals)?;
    for (slot, status) in aligned.iter_mut().zip(&statuses) {
        if !status.accepts_signal() {
            *slot = None;
        }
    }

    let result = Engine::new(bars, &statuses, config).run(&aligned)?;
    debug!(
        bars = result.bar_count,
        trades = result.trades.len(),
        rejected = result.rejected_entries.len(),
        final_equity = result.final_equity,
        "backtest complete"
    );
    Ok(result)
}

/// Generate signals with `generator`, then run the backtest.
pub fn run_strategy(
    bars: &[Bar],
    generator: &dyn SignalGenerator,
    config: &EngineConfig,
) -> Result<RunResult, EngineError> {
    let signals = generator.generate(bars);
    debug!(
        generator = generator.name(),
        signals = signals.len(),
        "signals generated"
    );
    run_backtest(bars, &signals, config)
}

struct Engine<'a> {
    bars: &'a [Bar],
    statuses: &'a [BarStatus],
    config: &'a EngineConfig,
    costs: CostModel,
    atr: Option<Vec<f64>>,
    lifecycle: Lifecycle,
    position: Option<Position>,
    pending: Option<PendingAction>,
    /// Bar at whose close the current position was opened, if any.
    close_fill_bar: Option<usize>,
    ledger: Ledger,
    risk: RiskState,
    trades: Vec<Trade>,
    rejected: Vec<RejectedEntry>,
    equity_curve: Vec<EquityPoint>,
    last_close: Option<f64>,
    void_bars: usize,
}

impl<'a> Engine<'a> {
    fn new(bars: &'a [Bar], statuses: &'a [BarStatus], config: &'a EngineConfig) -> Self {
        let atr = config
            .sizing
            .atr_period()
            .map(|period| Atr::new(period).compute(bars));
        Self {
            bars,
            statuses,
            config,
            costs: CostModel::from_config(config),
            atr,
            lifecycle: Lifecycle::default(),
            position: None,
            pending: None,
            close_fill_bar: None,
            ledger: Ledger::new(config.initial_capital),
            risk: RiskState::new(config.risk_limits.clone(), config.initial_capital),
            trades: Vec::new(),
            rejected: Vec::new(),
            equity_curve: Vec::with_capacity(bars.len()),
            last_close: None,
            void_bars: 0,
        }
    }

    fn run(mut self, signals: &[Option<Signal>]) -> Result<RunResult, SimulationError> {
        let bars = self.bars;
        let last_tradable = self.statuses.iter().rposition(|s| s.is_tradable());

        for t in 0..bars.len() {
            if !self.statuses[t].is_tradable() {
                self.void_bars += 1;
                self.push_equity(t);
                continue;
            }

            self.fill_pending(t)?;
            if self.lifecycle.is(EngineStateKind::Open) {
                self.check_liquidation(t)?;
            }
            if self.lifecycle.is(EngineStateKind::Open) {
                self.protective_exits(t)?;
            }
            if self.lifecycle.is(EngineStateKind::Open) {
                self.partial_closes(t)?;
            }
            if let Some(signal) = &signals[t] {
                if !self.lifecycle.is(EngineStateKind::Liquidated) {
                    self.on_signal(t, signal)?;
                }
            }
            self.maintain(t);
            if last_tradable == Some(t) {
                self.end_of_data(t)?;
            }

            self.last_close = Some(bars[t].close);
            self.push_equity(t);
        }

        Ok(RunResult {
            trades: self.trades,
            equity_curve: self.equity_curve,
            rejected_entries: self.rejected,
            initial_capital: self.ledger.initial_capital(),
            final_equity: self.ledger.balance(),
            bar_count: bars.len(),
            void_bars: self.void_bars,
            final_state: self.lifecycle.kind(),
            config_fingerprint: self.config.fingerprint(),
        })
    }

    // ─── Phase 1: pending next-open fills ───

    fn fill_pending(&mut self, t: usize) -> Result<(), SimulationError> {
        let Some(action) = self.pending.take() else {
            return Ok(());
        };
        let open = self.bars[t].open;
        match action {
            PendingAction::Enter {
                side,
                strength,
                signal_bar,
            } => self.enter(t, side, open, strength, signal_bar, false),
            PendingAction::Exit { reason } => self.close_all(t, open, reason),
            PendingAction::Reverse {
                side,
                strength,
                signal_bar,
            } => {
                self.close_all(t, open, ExitReason::Signal)?;
                self.enter(t, side, open, strength, signal_bar, false)
            }
            PendingAction::ScaleIn {
                strength,
                signal_bar,
            } => {
                self.scale_in(t, open, strength, signal_bar);
                Ok(())
            }
        }
    }

    // ─── Phase 2: liquidation ───

    fn check_liquidation(&mut self, t: usize) -> Result<(), SimulationError> {
        let bars = self.bars;
        let bar = &bars[t];
        let Some(position) = self.position.as_ref() else {
            return Ok(());
        };
        let side = position.side;
        let input = LiquidationInput {
            side,
            entry_price: position.avg_entry_price(),
            size: position.size(),
            leverage: position.leverage,
            maintenance_rate: self.config.margin_tiers.maintenance_rate(position.notional()),
            margin_mode: position.margin_mode,
            balance: self.ledger.balance(),
        };
        let Some(price) = liquidation_price(&input) else {
            return Ok(());
        };
        if !is_liquidated(side, price, bar.high, bar.low) {
            return Ok(());
        }

        let backing = match position.margin_mode {
            MarginMode::Isolated => position.used_margin(),
            MarginMode::Cross => self.ledger.balance(),
        };
        let Some(mut position) = self.position.take() else {
            return Ok(());
        };
        let gross = side.sign() * (price - position.avg_entry_price()) * position.size();
        let slice = position.reduce(1.0);
        let costs = self.costs.fill_costs(price, slice.size);

        // Forfeit what is left of the backing margin, never more than the
        // balance can absorb after the loss and costs.
        let headroom = self.ledger.balance() + gross
            - slice.entry_commission
            - slice.entry_slippage
            - costs.total();
        if headroom < 0.0 {
            return Err(SimulationError::NegativeEquity {
                bar_index: t,
                equity: headroom,
            });
        }
        let fee = (backing + gross).max(0.0).min(headroom);

        let exit = ExitFill {
            bar_index: t,
            timestamp: bar.timestamp,
            price,
            reason: ExitReason::Liquidation,
            costs,
            liquidation_fee: fee,
        };
        let trade = settle_slice(&position, &slice, &exit, false);
        debug!(bar = t, price, fee, net = trade.net_pnl, "position liquidated");

        self.lifecycle.transition(EngineStateKind::Liquidated, t)?;
        self.book(t, trade, true)
    }

    // ─── Phase 3: protective exits ───

    fn protective_exits(&mut self, t: usize) -> Result<(), SimulationError> {
        let (bars, config) = (self.bars, self.config);
        let bar = &bars[t];
        let exits = &config.exits;
        let Some(position) = self.position.as_ref() else {
            return Ok(());
        };
        let side = position.side;
        let stop = position.stop_level();
        let target = position.take_profit();

        let hit = match resolve_exit(exits.priority, side, bar, stop, target) {
            Some(ExitHit::Stop) => stop.map(|level| {
                (
                    stop_fill_price(side, level, bar),
                    position.stop_phase().exit_reason(),
                )
            }),
            Some(ExitHit::Target) => target
                .map(|level| (target_fill_price(side, level, bar), ExitReason::TakeProfit)),
            None => None,
        };
        let held = position.bars_held(t);
        let exit = hit.or_else(|| {
            exits
                .time_exit_bars
                .filter(|&limit| held >= limit)
                .map(|_| (bar.close, ExitReason::TimeExit))
        });

        match exit {
            Some((price, reason)) => self.close_all(t, price, reason),
            None => Ok(()),
        }
    }

    // ─── Phase 4: partial closes ───

    fn partial_closes(&mut self, t: usize) -> Result<(), SimulationError> {
        let (bars, config) = (self.bars, self.config);
        let bar = &bars[t];
        for (index, target) in config.exits.partial_targets.iter().enumerate() {
            let Some(position) = self.position.as_mut() else {
                break;
            };
            if position.partial_taken(index) {
                continue;
            }
            let side = position.side;
            let price = match target.trigger {
                PartialTrigger::ProfitPct { pct } => {
                    let level = position.avg_entry_price() * (1.0 + side.sign() * pct);
                    let reached = match side {
                        PositionSide::Long => bar.high >= level,
                        PositionSide::Short => bar.low <= level,
                    };
                    if !reached {
                        continue;
                    }
                    target_fill_price(side, level, bar)
                }
                PartialTrigger::BarsHeld { bars } => {
                    if position.bars_held(t) < bars {
                        continue;
                    }
                    bar.close
                }
            };

            position.mark_partial_taken(index);
            let open_size = position.size();
            let size = config.instrument.round_size(open_size * target.fraction);
            if size <= 0.0 {
                continue;
            }
            self.realize(t, Order::partial_exit(price, size / open_size))?;
        }
        Ok(())
    }

    // ─── Phase 5: signal step ───

    fn on_signal(&mut self, t: usize, signal: &Signal) -> Result<(), SimulationError> {
        let close = self.bars[t].close;
        let next_open = self.config.signal_timing == SignalTiming::NextBarOpen;
        let held = self.position.as_ref().map(|p| p.side);

        let side = match signal.direction {
            SignalDirection::Flat => {
                if held.is_none() {
                    return Ok(());
                }
                if next_open {
                    self.lifecycle.transition(EngineStateKind::Exiting, t)?;
                    self.pending = Some(PendingAction::Exit {
                        reason: ExitReason::Signal,
                    });
                    return Ok(());
                }
                return self.close_all(t, close, ExitReason::Signal);
            }
            SignalDirection::Long => PositionSide::Long,
            SignalDirection::Short => PositionSide::Short,
        };

        match held {
            Some(current) if current == side => {
                self.consider_scale_in(t, signal, next_open);
                Ok(())
            }
            Some(_) => {
                let allowed = self.config.allows(side);
                if next_open {
                    self.lifecycle.transition(EngineStateKind::Exiting, t)?;
                    self.pending = Some(if allowed {
                        PendingAction::Reverse {
                            side,
                            strength: signal.strength,
                            signal_bar: t,
                        }
                    } else {
                        PendingAction::Exit {
                            reason: ExitReason::Signal,
                        }
                    });
                    return Ok(());
                }
                self.close_all(t, close, ExitReason::Signal)?;
                if allowed {
                    self.enter(t, side, close, signal.strength, t, true)?;
                }
                Ok(())
            }
            None if !self.config.allows(side) => {
                self.reject(t, side, false, RejectReason::DirectionNotAllowed);
                Ok(())
            }
            None => {
                if next_open {
                    self.lifecycle.transition(EngineStateKind::Entering, t)?;
                    self.pending = Some(PendingAction::Enter {
                        side,
                        strength: signal.strength,
                        signal_bar: t,
                    });
                    return Ok(());
                }
                self.enter(t, side, close, signal.strength, t, true)
            }
        }
    }

    fn consider_scale_in(&mut self, t: usize, signal: &Signal, next_open: bool) {
        let Some(rule) = self.config.scale_in else {
            return;
        };
        let Some(position) = self.position.as_ref() else {
            return;
        };
        if position.entry_count() >= rule.max_entries || !position.can_scale_in() {
            return;
        }
        let close = self.bars[t].close;
        if let Some(step) = rule.step_pct {
            let last = position.last_entry_price();
            let adverse = match position.side {
                PositionSide::Long => close <= last * (1.0 - step),
                PositionSide::Short => close >= last * (1.0 + step),
            };
            if !adverse {
                return;
            }
        }

        if next_open {
            self.pending = Some(PendingAction::ScaleIn {
                strength: signal.strength,
                signal_bar: t,
            });
        } else {
            self.scale_in(t, close, signal.strength, t);
        }
    }

    // ─── Phase 6: maintenance ───

    fn maintain(&mut self, t: usize) {
        let (bars, config) = (self.bars, self.config);
        let bar = &bars[t];
        let exits = &config.exits;
        let Some(position) = self.position.as_mut() else {
            return;
        };

        if self.close_fill_bar == Some(t) {
            position.observe_price(bar.close);
        } else {
            position.observe_range(bar.high, bar.low);
        }

        let best_move = position.favorable_move_pct(position.best_price());
        if let Some(rule) = exits.breakeven {
            if best_move >= rule.trigger_pct && position.lock_breakeven(rule.buffer_pct) {
                debug!(bar = t, level = ?position.stop_level(), "breakeven locked");
            }
        }
        if let Some(rule) = exits.trailing {
            if best_move >= rule.activation_pct {
                let proposed =
                    position.best_price() * (1.0 - position.side.sign() * rule.trail_pct);
                position.trail_to(proposed);
            }
        }
    }

    // ─── Phase 7: end of data ───

    fn end_of_data(&mut self, t: usize) -> Result<(), SimulationError> {
        if let Some(PendingAction::Enter { .. }) = self.pending.take() {
            self.lifecycle.transition(EngineStateKind::Flat, t)?;
        }
        if self.config.close_at_end && self.position.is_some() {
            self.close_all(t, self.bars[t].close, ExitReason::EndOfData)?;
        }
        Ok(())
    }

    // ─── Phase 8: equity ───

    fn push_equity(&mut self, t: usize) {
        let equity = self.ledger.balance();
        let (unrealized_pnl, used_margin) = match &self.position {
            Some(position) => (
                self.last_close
                    .map_or(0.0, |mark| position.unrealized_pnl(mark)),
                position.used_margin(),
            ),
            None => (0.0, 0.0),
        };
        self.equity_curve.push(EquityPoint {
            bar_index: t,
            timestamp: self.bars[t].timestamp,
            equity,
            unrealized_pnl,
            mark_to_market: equity + unrealized_pnl,
            used_margin,
        });
    }

    // ─── Entries ───

    /// Open a new position at `price`. A rejection returns the engine to flat.
    fn enter(
        &mut self,
        t: usize,
        side: PositionSide,
        price: f64,
        strength: Option<f64>,
        signal_bar: usize,
        at_close: bool,
    ) -> Result<(), SimulationError> {
        if self.lifecycle.is(EngineStateKind::Flat) {
            self.lifecycle.transition(EngineStateKind::Entering, t)?;
        }
        let size = match self.size_entry(t, price, strength, signal_bar, false) {
            Ok(size) => size,
            Err(reason) => {
                self.reject(t, side, false, reason);
                return self.lifecycle.transition(EngineStateKind::Flat, t);
            }
        };

        let entry = self.entry_fill(t, Order::entry(side, price, size));
        let exits = &self.config.exits;
        let mut position = Position::open(
            side,
            entry,
            self.config.leverage,
            self.config.margin_mode,
            exits.partial_targets.len(),
        );
        position.set_bracket(exits.stop_loss_pct, exits.take_profit_pct);
        debug!(bar = t, side = ?side, price, size, "position opened");

        self.position = Some(position);
        self.close_fill_bar = at_close.then_some(t);
        self.risk.record_entry(t);
        self.lifecycle.transition(EngineStateKind::Open, t)
    }

    /// Add to the open position. Rejections are logged; the position is kept.
    fn scale_in(&mut self, t: usize, price: f64, strength: Option<f64>, signal_bar: usize) {
        let Some(side) = self.position.as_ref().map(|p| p.side) else {
            return;
        };
        let size = match self.size_entry(t, price, strength, signal_bar, true) {
            Ok(size) => size,
            Err(reason) => {
                self.reject(t, side, true, reason);
                return;
            }
        };
        let entry = self.entry_fill(t, Order::scale_in(price, size));
        let exits = &self.config.exits;
        if let Some(position) = self.position.as_mut() {
            position.add_entry(entry);
            position.set_bracket(exits.stop_loss_pct, exits.take_profit_pct);
            debug!(
                bar = t,
                price,
                size,
                entries = position.entry_count(),
                avg_entry = position.avg_entry_price(),
                "scaled in"
            );
        }
    }

    fn entry_fill(&self, t: usize, order: Order) -> Entry {
        let costs = self.costs.fill_costs(order.price, order.size);
        Entry {
            bar_index: t,
            timestamp: self.bars[t].timestamp,
            price: order.price,
            size: order.size,
            commission: costs.commission,
            slippage: costs.slippage,
        }
    }

    /// Risk checks and sizing for an entry filling at `price` on bar `t`.
    fn size_entry(
        &self,
        t: usize,
        price: f64,
        strength: Option<f64>,
        signal_bar: usize,
        scale_in: bool,
    ) -> Result<f64, RejectReason> {
        self.risk.check_entry(t)?;

        let config = self.config;
        let balance = self.ledger.balance();
        let request = SizingRequest {
            capital: balance,
            price,
            leverage: config.leverage,
            stop_loss_pct: config.exits.stop_loss_pct,
            atr: self.atr.as_ref().and_then(|atr| atr.get(signal_bar).copied()),
            strength,
            scale_by_strength: config.scale_by_strength,
        };
        let mut size = config.sizing.size(&request, &config.instrument)?.size;

        if scale_in {
            let multiplier = config.scale_in.map_or(1.0, |rule| rule.size_multiplier);
            size = config.instrument.round_size(size * multiplier);
            if size <= 0.0 {
                return Err(RejectReason::ZeroSize);
            }
        }

        let used = self.position.as_ref().map_or(0.0, Position::used_margin);
        self.fit_to_capital(size, price, balance - used)
    }

    /// Shrink `size` so margin plus entry costs fit in `available`.
    fn fit_to_capital(&self, size: f64, price: f64, available: f64) -> Result<f64, RejectReason> {
        let per_unit = price / self.config.leverage + self.costs.cost_per_unit(price);
        let required = size * per_unit;
        if required <= available {
            return Ok(size);
        }

        let instrument = &self.config.instrument;
        let fitted = if available > 0.0 {
            instrument.round_size(available / per_unit)
        } else {
            0.0
        };
        if !(fitted > 0.0 && fitted.is_finite()) {
            return Err(RejectReason::InsufficientMargin {
                required,
                available,
            });
        }
        let notional = fitted * price;
        if notional < instrument.min_notional {
            return Err(RejectReason::BelowMinNotional {
                notional,
                min_notional: instrument.min_notional,
            });
        }
        Ok(fitted)
    }

    fn reject(&mut self, t: usize, side: PositionSide, scale_in: bool, reason: RejectReason) {
        debug!(
            bar = t,
            side = ?side,
            scale_in,
            reason = reason.as_str(),
            "entry rejected"
        );
        self.rejected.push(RejectedEntry {
            bar_index: t,
            timestamp: self.bars[t].timestamp,
            side,
            scale_in,
            reason,
        });
    }

    // ─── Exits ───

    fn close_all(&mut self, t: usize, price: f64, reason: ExitReason) -> Result<(), SimulationError> {
        self.realize(t, Order::exit(reason, price))
    }

    /// Fill an exit order against the open position. Moves the lifecycle to
    /// flat when nothing is left.
    fn realize(&mut self, t: usize, order: Order) -> Result<(), SimulationError> {
        let OrderKind::Exit(reason) = order.kind else {
            return Ok(());
        };
        let Some(position) = self.position.as_mut() else {
            return Ok(());
        };
        let price = order.price;
        let slice = position.reduce(order.fraction);
        let exit = ExitFill {
            bar_index: t,
            timestamp: self.bars[t].timestamp,
            price,
            reason,
            costs: self.costs.fill_costs(price, slice.size),
            liquidation_fee: 0.0,
        };
        let closed = position.is_closed();
        let trade = settle_slice(position, &slice, &exit, !closed);
        if closed {
            debug!(
                bar = t,
                price,
                reason = reason.as_str(),
                net = trade.net_pnl,
                "position closed"
            );
            if self.lifecycle.is(EngineStateKind::Open) {
                self.lifecycle.transition(EngineStateKind::Exiting, t)?;
            }
            self.lifecycle.transition(EngineStateKind::Flat, t)?;
        }
        self.book(t, trade, closed)
    }

    fn book(&mut self, t: usize, trade: Trade, closed: bool) -> Result<(), SimulationError> {
        self.ledger.book(&trade);
        self.trades.push(trade);

        let balance = self.ledger.balance();
        if balance < 0.0 {
            return Err(SimulationError::NegativeEquity {
                bar_index: t,
                equity: balance,
            });
        }
        if closed {
            self.position = None;
            self.close_fill_bar = None;
            let net = self.ledger.take_position_net();
            self.risk.record_close(net, t);
        }
        if self.risk.observe_equity(balance) {
            debug!(bar = t, equity = balance, "drawdown kill switch tripped");
        }
        Ok(())
    }
}
