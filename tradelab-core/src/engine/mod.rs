//! Backtesting engine: input validation, bar-by-bar event loop, accounting.
//!
//! The engine consumes a validated bar series and a timestamp-aligned signal
//! stream, then runs the fixed per-bar order described in `loop_runner`.
//! One engine instance owns at most one position; all state lives inside a
//! single run, so runs are pure functions of (bars, signals, config).

pub mod accounting;
pub mod data;
pub mod execution;
pub mod loop_runner;
pub mod state;

pub use accounting::{settle_slice, ExitFill, Ledger};
pub use data::{align_signals, validate_bars, BarStatus};
pub use execution::{CostModel, ExitHit, FillCosts};
pub use loop_runner::{run_backtest, run_strategy};
pub use state::{EngineStateKind, Lifecycle, RunResult};
