//! Domain types for TradeLab

pub mod bar;
pub mod equity;
pub mod order;
pub mod position;
pub mod ratchet;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use equity::EquityPoint;
pub use order::{ExitReason, Order, OrderKind};
pub use position::{Entry, MarginMode, Position, PositionSide, PositionSlice, StopPhase};
pub use ratchet::RatchetState;
pub use signal::{NullSignal, Signal, SignalDirection, SignalGenerator};
pub use trade::{realized_pnl, Trade, TradeCosts};
