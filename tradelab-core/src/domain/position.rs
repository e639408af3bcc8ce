//! Position aggregate: entries, average price, stop sub-state, excursions.
//!
//! The stop lifecycle is one monotone enum (`StopPhase`) rather than a set of
//! independent flags: `Initial → Breakeven → Trailing`, and the level behind
//! it only ever tightens (see `RatchetState`).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::order::ExitReason;
use super::ratchet::RatchetState;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }
}

/// How collateral backs a leveraged position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginMode {
    /// Only the margin posted for the position is at risk.
    #[default]
    Isolated,
    /// The whole account balance backs the position.
    Cross,
}

/// One fill that added to the position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub commission: f64,
    pub slippage: f64,
}

/// Stop sub-state of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StopPhase {
    /// Fixed stop-loss derived from the average entry (if configured).
    Initial { stop: Option<f64> },
    /// Stop moved to entry ± buffer. Never moved back.
    Breakeven { level: f64 },
    /// Trailing stop active. Ratchets in the favorable direction only.
    Trailing { level: f64 },
}

impl StopPhase {
    pub fn level(&self) -> Option<f64> {
        match *self {
            StopPhase::Initial { stop } => stop,
            StopPhase::Breakeven { level } | StopPhase::Trailing { level } => Some(level),
        }
    }

    pub fn exit_reason(&self) -> ExitReason {
        match self {
            StopPhase::Initial { .. } => ExitReason::StopLoss,
            StopPhase::Breakeven { .. } => ExitReason::Breakeven,
            StopPhase::Trailing { .. } => ExitReason::TrailingStop,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StopPhase::Initial { .. } => 0,
            StopPhase::Breakeven { .. } => 1,
            StopPhase::Trailing { .. } => 2,
        }
    }
}

/// A realized slice taken out of the position by `Position::reduce`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSlice {
    pub size: f64,
    /// Entry commission allocated to this slice.
    pub entry_commission: f64,
    /// Entry slippage allocated to this slice.
    pub entry_slippage: f64,
    pub mae: f64,
    pub mfe: f64,
}

/// Open position owned by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: PositionSide,
    pub leverage: f64,
    pub margin_mode: MarginMode,
    entries: Vec<Entry>,
    size: f64,
    avg_entry_price: f64,
    stop: StopPhase,
    ratchet: RatchetState,
    take_profit: Option<f64>,
    /// Best price seen since the position opened (high for long, low for short).
    best_price: f64,
    /// Worst price seen since the position opened.
    worst_price: f64,
    entry_commission_open: f64,
    entry_slippage_open: f64,
    partials_taken: Vec<bool>,
    trailing_active: bool,
}

impl Position {
    /// Open a position from its first fill.
    pub fn open(
        side: PositionSide,
        entry: Entry,
        leverage: f64,
        margin_mode: MarginMode,
        partial_targets: usize,
    ) -> Self {
        let price = entry.price;
        Self {
            side,
            leverage,
            margin_mode,
            size: entry.size,
            avg_entry_price: price,
            stop: StopPhase::Initial { stop: None },
            ratchet: RatchetState::new(side),
            take_profit: None,
            best_price: price,
            worst_price: price,
            entry_commission_open: entry.commission,
            entry_slippage_open: entry.slippage,
            partials_taken: vec![false; partial_targets],
            trailing_active: false,
            entries: vec![entry],
        }
    }

    /// Set the fixed stop-loss and take-profit distances relative to the
    /// current average entry. Only valid while the stop is in `Initial`.
    pub fn set_bracket(&mut self, stop_loss_pct: Option<f64>, take_profit_pct: Option<f64>) {
        let entry = self.avg_entry_price;
        let sign = self.side.sign();
        self.take_profit = take_profit_pct.map(|pct| entry * (1.0 + sign * pct));
        if let StopPhase::Initial { .. } = self.stop {
            let stop = stop_loss_pct.map(|pct| entry * (1.0 - sign * pct));
            self.ratchet.reset(stop);
            self.stop = StopPhase::Initial { stop };
        }
    }

    /// Add a scale-in fill and recompute the size-weighted average entry.
    pub fn add_entry(&mut self, entry: Entry) {
        let new_size = self.size + entry.size;
        if new_size > 0.0 {
            self.avg_entry_price =
                (self.avg_entry_price * self.size + entry.price * entry.size) / new_size;
        }
        self.size = new_size;
        self.entry_commission_open += entry.commission;
        self.entry_slippage_open += entry.slippage;
        self.observe_price(entry.price);
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn last_entry_price(&self) -> f64 {
        self.entries.last().map_or(self.avg_entry_price, |e| e.price)
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn avg_entry_price(&self) -> f64 {
        self.avg_entry_price
    }

    pub fn opened_bar(&self) -> usize {
        self.entries.first().map_or(0, |e| e.bar_index)
    }

    pub fn opened_at(&self) -> NaiveDateTime {
        self.entries
            .first()
            .map(|e| e.timestamp)
            .unwrap_or_default()
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.opened_bar())
    }

    pub fn notional(&self) -> f64 {
        self.avg_entry_price * self.size
    }

    /// Margin posted for the position: notional ÷ leverage.
    pub fn used_margin(&self) -> f64 {
        self.notional() / self.leverage.max(1e-12)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.avg_entry_price) * self.size
    }

    /// Fraction of favorable move from the average entry at `price`.
    pub fn favorable_move_pct(&self, price: f64) -> f64 {
        if self.avg_entry_price <= 0.0 {
            return 0.0;
        }
        self.side.sign() * (price - self.avg_entry_price) / self.avg_entry_price
    }

    pub fn stop_phase(&self) -> StopPhase {
        self.stop
    }

    pub fn stop_level(&self) -> Option<f64> {
        self.stop.level()
    }

    pub fn take_profit(&self) -> Option<f64> {
        self.take_profit
    }

    pub fn best_price(&self) -> f64 {
        self.best_price
    }

    pub fn worst_price(&self) -> f64 {
        self.worst_price
    }

    pub fn trailing_active(&self) -> bool {
        self.trailing_active
    }

    /// Scale-in is only accepted while the stop is still in its initial phase.
    pub fn can_scale_in(&self) -> bool {
        matches!(self.stop, StopPhase::Initial { .. })
    }

    /// Fold a traded price range into the excursion trackers.
    pub fn observe_range(&mut self, high: f64, low: f64) {
        match self.side {
            PositionSide::Long => {
                self.best_price = self.best_price.max(high);
                self.worst_price = self.worst_price.min(low);
            }
            PositionSide::Short => {
                self.best_price = self.best_price.min(low);
                self.worst_price = self.worst_price.max(high);
            }
        }
    }

    pub fn observe_price(&mut self, price: f64) {
        self.observe_range(price, price);
    }

    /// Move the stop to breakeven (entry ± buffer). No-op unless the stop is
    /// still `Initial`; the resulting level never loosens the current stop.
    pub fn lock_breakeven(&mut self, buffer_pct: f64) -> bool {
        if !matches!(self.stop, StopPhase::Initial { .. }) {
            return false;
        }
        let proposed = self.avg_entry_price * (1.0 + self.side.sign() * buffer_pct);
        let level = self.ratchet.apply(proposed);
        self.advance(StopPhase::Breakeven { level });
        true
    }

    /// Propose a trailing level. The ratchet keeps the tighter of the current
    /// and proposed levels, so the stop never loosens.
    pub fn trail_to(&mut self, proposed: f64) -> f64 {
        self.trailing_active = true;
        let level = self.ratchet.apply(proposed);
        self.advance(StopPhase::Trailing { level });
        level
    }

    fn advance(&mut self, next: StopPhase) {
        if next.rank() >= self.stop.rank() {
            self.stop = next;
        }
    }

    pub fn partial_taken(&self, index: usize) -> bool {
        self.partials_taken.get(index).copied().unwrap_or(true)
    }

    pub fn mark_partial_taken(&mut self, index: usize) {
        if let Some(flag) = self.partials_taken.get_mut(index) {
            *flag = true;
        }
    }

    /// Remove `fraction` of the open size, allocating entry costs and
    /// excursions proportionally.
    pub fn reduce(&mut self, fraction: f64) -> PositionSlice {
        let fraction = fraction.clamp(0.0, 1.0);
        let size = self.size * fraction;
        let entry_commission = self.entry_commission_open * fraction;
        let entry_slippage = self.entry_slippage_open * fraction;
        let sign = self.side.sign();
        let mfe = (sign * (self.best_price - self.avg_entry_price)).max(0.0) * size;
        let mae = (sign * (self.worst_price - self.avg_entry_price)).min(0.0) * size;

        self.size -= size;
        self.entry_commission_open -= entry_commission;
        self.entry_slippage_open -= entry_slippage;
        if fraction >= 1.0 {
            self.size = 0.0;
        }

        PositionSlice {
            size,
            entry_commission,
            entry_slippage,
            mae,
            mfe,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.size <= 1e-12
    }
}
