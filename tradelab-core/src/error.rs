//! Error taxonomy for configuration, input data and simulation.
//!
//! Insufficient data is deliberately absent: it is reported as a flag on the
//! result types, never as an error.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::engine::EngineStateKind;

/// Invalid configuration. Raised before any run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("initial capital must be positive (got {0})")]
    NonPositiveCapital(f64),

    #[error("contradictory risk limits: {0}")]
    ContradictoryRiskLimits(String),

    #[error("invalid margin tier table: {0}")]
    InvalidMarginTiers(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Malformed bar or signal input. Raised before the bar loop starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("timestamps not strictly increasing at bar {index}: {previous} then {current}")]
    NonMonotonicTimestamp {
        index: usize,
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },

    #[error("duplicate timestamp {timestamp} at bar {index}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
    },

    #[error("malformed bar {index}: {reason}")]
    MalformedBar { index: usize, reason: String },

    #[error("gap at bar {index}: {reason}")]
    Gap { index: usize, reason: String },

    #[error("signal at {timestamp} does not match any bar")]
    UnalignedSignal { timestamp: NaiveDateTime },

    #[error("signal timestamps not strictly increasing at signal {index}")]
    NonMonotonicSignal { index: usize },
}

/// Invariant violation inside one simulation. Fatal for that run only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("illegal state transition at bar {bar_index}: {from:?} -> {to:?}")]
    IllegalTransition {
        bar_index: usize,
        from: EngineStateKind,
        to: EngineStateKind,
    },

    #[error("equity went negative at bar {bar_index}: {equity}")]
    NegativeEquity { bar_index: usize, equity: f64 },
}

/// Umbrella error returned by engine entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
