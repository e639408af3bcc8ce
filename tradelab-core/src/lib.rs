//! TradeLab Core: domain types, execution engine, money and risk management.
//!
//! This crate contains the single-run backtesting machinery:
//! - Domain types (bars, signals, positions, orders, trades, equity points)
//! - Immutable run configuration with TOML loading and parameter overrides
//! - Bar-by-bar execution state machine with exact cash-flow arithmetic
//! - Position sizing, risk limits, margin tiers and liquidation
//! - Reference indicators (SMA, ATR) and a moving-average crossover generator
//! - Deterministic RNG hierarchy shared with the robustness layer

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod params;
pub mod risk;
pub mod rng;
pub mod signals;

pub use config::EngineConfig;
pub use engine::{run_backtest, run_strategy, EngineStateKind, RunResult};
pub use error::{ConfigError, DataError, EngineError, SimulationError};
pub use params::{ParamSet, ParamValue};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a sweep worker moves across threads is
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::EquityPoint>();
        require_sync::<domain::EquityPoint>();

        // Configuration and results
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<RunResult>();
        require_sync::<RunResult>();
        require_send::<EngineError>();
        require_sync::<EngineError>();
        require_send::<ParamSet>();
        require_sync::<ParamSet>();

        // Risk
        require_send::<risk::RiskState>();
        require_sync::<risk::RiskState>();
        require_send::<risk::MarginTierTable>();
        require_sync::<risk::MarginTierTable>();

        // RNG
        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();

        // Signal generators
        require_send::<signals::MaCrossover>();
        require_sync::<signals::MaCrossover>();
        require_send::<domain::NullSignal>();
        require_sync::<domain::NullSignal>();
    }

    /// Architecture contract: a signal generator sees bars only, never the
    /// position or the account.
    #[test]
    fn signal_generator_trait_has_no_position_parameter() {
        fn _check_trait_object_builds(
            generator: &dyn domain::SignalGenerator,
            bars: &[domain::Bar],
        ) -> Vec<domain::Signal> {
            generator.generate(bars)
        }
    }
}
