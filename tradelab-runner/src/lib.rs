//! TradeLab Runner: metrics, optimization and robustness studies.
//!
//! This crate builds on `tradelab-core` to provide:
//! - Performance metrics over trades and equity curves
//! - Grid search over parameter spaces with stable ranking
//! - Walk-forward optimization (rolling and anchored windows)
//! - Monte-Carlo trade bootstrap
//! - Study configuration (TOML) and JSON/CSV export

pub mod cancel;
pub mod config;
pub mod export;
pub mod grid;
pub mod metrics;
pub mod monte_carlo;
pub mod param;
pub mod runner;
pub mod scoring;
pub mod strategy;
pub mod walk_forward;

pub use cancel::CancelToken;
pub use config::{StudyConfig, StudyId};
pub use grid::{
    GridConfig, GridOptimizer, GridProgress, GridReport, OptimizationResult, RejectionReason,
    ResultFilters, ResultStatus,
};
pub use metrics::{EquityBasis, MetricsConfig, PerformanceMetrics, ProfitFactor, ReturnBasis};
pub use monte_carlo::{
    MonteCarloConfig, MonteCarloReport, MonteCarloSimulator, PercentileTable, SampleValidity,
};
pub use param::{ParamDef, ParamRange, ParamSpace};
pub use runner::{run_combination, run_segment, run_single, BacktestResult, SCHEMA_VERSION};
pub use scoring::{FitnessMetric, Scorer};
pub use strategy::{MaCrossoverFactory, StrategyFactory};
pub use walk_forward::{
    BarRange, DegradationFlag, WalkForwardConfig, WalkForwardOptimizer, WalkForwardReport,
    WalkForwardStatus, WalkForwardWindow, WindowMode, WindowStatus,
};
