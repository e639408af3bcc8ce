//! Realization of position slices into trades and balance bookkeeping.
//!
//! The balance is realized equity: it moves only when a slice closes. Entry
//! costs stay attached to the position and are charged pro rata on each
//! slice, so every trade carries its full round-trip cost.

use chrono::NaiveDateTime;

use crate::domain::{realized_pnl, ExitReason, Position, PositionSlice, Trade, TradeCosts};

use super::execution::FillCosts;

/// Exit fill for one slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitFill {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub reason: ExitReason,
    pub costs: FillCosts,
    /// Forfeited margin, non-zero only for liquidations.
    pub liquidation_fee: f64,
}

/// Build the trade record for a slice taken out of `position`.
pub fn settle_slice(
    position: &Position,
    slice: &PositionSlice,
    exit: &ExitFill,
    partial: bool,
) -> Trade {
    let costs = TradeCosts {
        commission: slice.entry_commission + exit.costs.commission,
        slippage: slice.entry_slippage + exit.costs.slippage,
        liquidation_fee: exit.liquidation_fee,
    };
    let entry_price = position.avg_entry_price();
    let (gross_pnl, net_pnl) =
        realized_pnl(position.side, entry_price, exit.price, slice.size, &costs);

    Trade {
        side: position.side,
        entry_bar: position.opened_bar(),
        entry_time: position.opened_at(),
        entry_price,
        exit_bar: exit.bar_index,
        exit_time: exit.timestamp,
        exit_price: exit.price,
        exit_reason: exit.reason,
        partial,
        size: slice.size,
        leverage: position.leverage,
        gross_pnl,
        commission: costs.commission,
        slippage: costs.slippage,
        liquidation_fee: costs.liquidation_fee,
        net_pnl,
        bars_held: position.bars_held(exit.bar_index),
        mae: slice.mae,
        mfe: slice.mfe,
    }
}

const BALANCE_EPSILON: f64 = 1e-9;

/// Realized balance plus the running net of the position currently open.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    initial_capital: f64,
    balance: f64,
    position_net: f64,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            balance: initial_capital,
            position_net: 0.0,
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Book a realized slice.
    pub fn book(&mut self, trade: &Trade) {
        self.balance += trade.net_pnl;
        self.position_net += trade.net_pnl;
        // Float dust left by a full wipeout.
        if self.balance.abs() < BALANCE_EPSILON {
            self.balance = 0.0;
        }
    }

    /// Net PnL accumulated over all slices of the position, then reset.
    pub fn take_position_net(&mut self) -> f64 {
        std::mem::take(&mut self.position_net)
    }
}
