//! Engine lifecycle state machine and run result.
//!
//! `Flat → Entering → Open → Exiting → Flat`, with `Liquidated` reachable only
//! from `Open` and terminal. Every move goes through `Lifecycle::transition`,
//! which rejects anything else as a `SimulationError::IllegalTransition`.

use serde::{Deserialize, Serialize};

use crate::domain::{EquityPoint, Trade};
use crate::error::SimulationError;
use crate::risk::RejectedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineStateKind {
    Flat,
    /// Entry decided, fill pending (next open) or in progress.
    Entering,
    Open,
    /// Exit decided, fill pending (next open) or in progress.
    Exiting,
    Liquidated,
}

impl EngineStateKind {
    pub fn can_transition_to(self, to: EngineStateKind) -> bool {
        use EngineStateKind::*;
        matches!(
            (self, to),
            (Flat, Entering)
                | (Entering, Open)
                | (Entering, Flat)
                | (Open, Exiting)
                | (Open, Liquidated)
                | (Exiting, Flat)
        )
    }
}

/// Current lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    kind: EngineStateKind,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            kind: EngineStateKind::Flat,
        }
    }
}

impl Lifecycle {
    pub fn kind(&self) -> EngineStateKind {
        self.kind
    }

    pub fn is(&self, kind: EngineStateKind) -> bool {
        self.kind == kind
    }

    pub fn transition(
        &mut self,
        to: EngineStateKind,
        bar_index: usize,
    ) -> Result<(), SimulationError> {
        if !self.kind.can_transition_to(to) {
            return Err(SimulationError::IllegalTransition {
                bar_index,
                from: self.kind,
                to,
            });
        }
        self.kind = to;
        Ok(())
    }
}

/// Result of a complete backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Closed trades and partial-close slices, in realization order.
    pub trades: Vec<Trade>,
    /// One point per input bar.
    pub equity_curve: Vec<EquityPoint>,
    /// Entries refused by the risk manager.
    pub rejected_entries: Vec<RejectedEntry>,
    pub initial_capital: f64,
    /// Realized equity after the last bar.
    pub final_equity: f64,
    pub bar_count: usize,
    /// Bars passed through as void (NaN OHLC).
    pub void_bars: usize,
    pub final_state: EngineStateKind,
    pub config_fingerprint: String,
}

impl RunResult {
    pub fn liquidated(&self) -> bool {
        self.final_state == EngineStateKind::Liquidated
    }

    pub fn net_profit(&self) -> f64 {
        self.final_equity - self.initial_capital
    }

    /// Fraction of bars that were void.
    pub fn void_bar_rate(&self) -> f64 {
        if self.bar_count == 0 {
            0.0
        } else {
            self.void_bars as f64 / self.bar_count as f64
        }
    }
}
