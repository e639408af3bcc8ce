//! Money & risk management: position sizing, risk limits, margin tiers.
//!
//! Everything here is consulted by the engine before an entry (or scale-in)
//! fills. Sizing turns capital into a size, limits decide whether the entry
//! may happen at all, and the margin table supplies maintenance rates for
//! liquidation.

pub mod limits;
pub mod margin;
pub mod sizing;

pub use limits::{LossStreakLimit, RiskLimits, RiskState, TradeFrequencyLimit};
pub use margin::{is_liquidated, liquidation_price, LiquidationInput, MarginTier, MarginTierTable};
pub use sizing::{PositionSize, SizingMode, SizingRequest};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::PositionSide;

/// Why an entry was refused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    DirectionNotAllowed,
    DrawdownKillSwitch,
    TradeFrequency { trades_in_period: usize },
    LossCooldown { until_bar: usize },
    ZeroSize,
    BelowMinNotional { notional: f64, min_notional: f64 },
    InsufficientMargin { required: f64, available: f64 },
    NoStopDistance,
    NoVolatilityEstimate,
    NonPositiveKelly,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::DirectionNotAllowed => "direction_not_allowed",
            RejectReason::DrawdownKillSwitch => "drawdown_kill_switch",
            RejectReason::TradeFrequency { .. } => "trade_frequency",
            RejectReason::LossCooldown { .. } => "loss_cooldown",
            RejectReason::ZeroSize => "zero_size",
            RejectReason::BelowMinNotional { .. } => "below_min_notional",
            RejectReason::InsufficientMargin { .. } => "insufficient_margin",
            RejectReason::NoStopDistance => "no_stop_distance",
            RejectReason::NoVolatilityEstimate => "no_volatility_estimate",
            RejectReason::NonPositiveKelly => "non_positive_kelly",
        }
    }
}

/// An entry the risk manager refused, kept in the run result for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub bar_index: usize,
    pub timestamp: NaiveDateTime,
    pub side: PositionSide,
    /// True when the refused entry was a scale-in on an open position.
    pub scale_in: bool,
    pub reason: RejectReason,
}
