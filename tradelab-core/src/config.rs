//! Immutable engine configuration.
//!
//! One `EngineConfig` value carries every cross-cutting constant of a run
//! (capital, costs, leverage, sizing, limits, exits). It is validated once,
//! before any bar is processed, and then passed by reference everywhere.

use serde::{Deserialize, Serialize};

use crate::domain::{MarginMode, PositionSide};
use crate::error::ConfigError;
use crate::params::{get_f64, get_usize, ParamSet};
use crate::risk::{MarginTierTable, RiskLimits, SizingMode};

/// Trading mode: which directions are allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingMode {
    LongOnly,
    ShortOnly,
    #[default]
    LongShort,
}

impl TradingMode {
    pub fn allows(self, side: PositionSide) -> bool {
        match self {
            TradingMode::LongOnly => side == PositionSide::Long,
            TradingMode::ShortOnly => side == PositionSide::Short,
            TradingMode::LongShort => true,
        }
    }
}

/// When a signal emitted at bar `t` is acted upon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalTiming {
    /// Fill at bar `t`'s close.
    #[default]
    BarClose,
    /// Fill at the open of the next valid bar.
    NextBarOpen,
}

/// Resolution when one bar's range reaches both the stop and the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitPriority {
    #[default]
    StopLossFirst,
    TakeProfitFirst,
    /// Infer the intrabar path from the open: if the open is closer to the
    /// high, the path is Open → High → Low → Close, otherwise Open → Low → High.
    OhlcPath,
}

/// What to do with void bars (NaN OHLC) and interval gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapPolicy {
    /// Fail with `DataError::Gap`.
    #[default]
    Reject,
    /// Treat the bar as a no-signal bar.
    PassThrough,
}

/// Per-fill slippage cost. Prices are recorded raw; slippage is a cost line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlippageModel {
    #[default]
    None,
    /// Fixed price units per unit of size.
    PerUnit { amount: f64 },
    /// Fraction of the fill price.
    Percent { pct: f64 },
}

impl SlippageModel {
    pub fn cost(&self, price: f64, size: f64) -> f64 {
        match *self {
            SlippageModel::None => 0.0,
            SlippageModel::PerUnit { amount } => amount * size,
            SlippageModel::Percent { pct } => price * pct * size,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let v = match *self {
            SlippageModel::None => return Ok(()),
            SlippageModel::PerUnit { amount } => amount,
            SlippageModel::Percent { pct } => pct,
        };
        if v >= 0.0 && v.is_finite() {
            Ok(())
        } else {
            Err(ConfigError::invalid("slippage", format!("must be >= 0, got {v}")))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingConfig {
    /// Favorable move (fraction of entry) before the trail arms.
    #[serde(default)]
    pub activation_pct: f64,
    /// Distance of the stop behind the best price, as a fraction.
    pub trail_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakevenConfig {
    /// Favorable move (fraction of entry) that locks breakeven.
    pub trigger_pct: f64,
    /// Stop is placed at entry ± buffer.
    #[serde(default)]
    pub buffer_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartialTrigger {
    /// Favorable move from the average entry reaches `pct`.
    ProfitPct { pct: f64 },
    /// Position has been held for `bars` bars.
    BarsHeld { bars: usize },
}

/// Scheduled partial close. Each target fires at most once per position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialTarget {
    pub trigger: PartialTrigger,
    /// Fraction of the current size to close.
    pub fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub trailing: Option<TrailingConfig>,
    pub breakeven: Option<BreakevenConfig>,
    pub time_exit_bars: Option<usize>,
    pub partial_targets: Vec<PartialTarget>,
    pub priority: ExitPriority,
}

impl ExitRules {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(sl) = self.stop_loss_pct {
            if !(sl > 0.0 && sl < 1.0) {
                return Err(ConfigError::invalid("exits.stop_loss_pct", format!("must be in (0, 1), got {sl}")));
            }
        }
        if let Some(tp) = self.take_profit_pct {
            if !(tp > 0.0 && tp.is_finite()) {
                return Err(ConfigError::invalid("exits.take_profit_pct", format!("must be positive, got {tp}")));
            }
        }
        if let Some(t) = self.trailing {
            if !(t.trail_pct > 0.0 && t.trail_pct < 1.0) {
                return Err(ConfigError::invalid("exits.trailing.trail_pct", format!("must be in (0, 1), got {}", t.trail_pct)));
            }
            if !(t.activation_pct >= 0.0 && t.activation_pct.is_finite()) {
                return Err(ConfigError::invalid("exits.trailing.activation_pct", "must be >= 0"));
            }
        }
        if let Some(b) = self.breakeven {
            if !(b.trigger_pct > 0.0 && b.trigger_pct.is_finite()) {
                return Err(ConfigError::invalid("exits.breakeven.trigger_pct", "must be positive"));
            }
            if !(b.buffer_pct >= 0.0 && b.buffer_pct < b.trigger_pct) {
                return Err(ConfigError::invalid(
                    "exits.breakeven.buffer_pct",
                    format!("must be in [0, trigger_pct), got {}", b.buffer_pct),
                ));
            }
        }
        if self.time_exit_bars == Some(0) {
            return Err(ConfigError::invalid("exits.time_exit_bars", "must be >= 1"));
        }
        for (i, target) in self.partial_targets.iter().enumerate() {
            if !(target.fraction > 0.0 && target.fraction < 1.0) {
                return Err(ConfigError::invalid(
                    format!("exits.partial_targets[{i}].fraction"),
                    format!("must be in (0, 1), got {}", target.fraction),
                ));
            }
            match target.trigger {
                PartialTrigger::ProfitPct { pct } if !(pct > 0.0 && pct.is_finite()) => {
                    return Err(ConfigError::invalid(
                        format!("exits.partial_targets[{i}].pct"),
                        "must be positive",
                    ));
                }
                PartialTrigger::BarsHeld { bars: 0 } => {
                    return Err(ConfigError::invalid(
                        format!("exits.partial_targets[{i}].bars"),
                        "must be >= 1",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Dollar-cost-averaging entries on a same-direction signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleInConfig {
    /// Total entries allowed per position, the initial one included.
    pub max_entries: usize,
    /// Required adverse move from the last entry before adding.
    #[serde(default)]
    pub step_pct: Option<f64>,
    /// Size of each add relative to a fresh entry.
    #[serde(default = "one")]
    pub size_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

/// Instrument trading constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentSpec {
    /// Size increment; 0 disables rounding.
    pub lot_size: f64,
    /// Smallest notional accepted for an entry.
    pub min_notional: f64,
}

impl InstrumentSpec {
    /// Floor `size` to a whole number of lots.
    pub fn round_size(&self, size: f64) -> f64 {
        if self.lot_size > 0.0 {
            ((size / self.lot_size) + 1e-9).floor() * self.lot_size
        } else {
            size
        }
    }
}

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_capital: f64,
    /// Charged on every fill: `rate × price × size`.
    pub commission_rate: f64,
    pub slippage: SlippageModel,
    pub leverage: f64,
    pub margin_mode: MarginMode,
    pub margin_tiers: MarginTierTable,
    pub trading_mode: TradingMode,
    pub sizing: SizingMode,
    pub risk_limits: RiskLimits,
    pub exits: ExitRules,
    pub scale_in: Option<ScaleInConfig>,
    pub signal_timing: SignalTiming,
    pub gap_policy: GapPolicy,
    /// Consecutive bars further apart than this count as an interval gap.
    pub max_bar_interval_secs: Option<i64>,
    pub instrument: InstrumentSpec,
    /// Close any open position at the last bar's close.
    pub close_at_end: bool,
    /// Multiply entry notional by the signal strength when present.
    pub scale_by_strength: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            commission_rate: 0.0,
            slippage: SlippageModel::None,
            leverage: 1.0,
            margin_mode: MarginMode::Isolated,
            margin_tiers: MarginTierTable::default(),
            trading_mode: TradingMode::LongShort,
            sizing: SizingMode::default(),
            risk_limits: RiskLimits::default(),
            exits: ExitRules::default(),
            scale_in: None,
            signal_timing: SignalTiming::BarClose,
            gap_policy: GapPolicy::Reject,
            max_bar_interval_secs: None,
            instrument: InstrumentSpec::default(),
            close_at_end: true,
            scale_by_strength: false,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            ..Self::default()
        }
    }

    /// Parse from TOML and validate. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital > 0.0 && self.initial_capital.is_finite()) {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            return Err(ConfigError::invalid(
                "commission_rate",
                format!("must be in [0, 1), got {}", self.commission_rate),
            ));
        }
        if !(self.leverage >= 1.0 && self.leverage.is_finite()) {
            return Err(ConfigError::invalid(
                "leverage",
                format!("must be >= 1, got {}", self.leverage),
            ));
        }
        self.slippage.validate()?;
        self.margin_tiers.validate()?;
        self.sizing.validate()?;
        self.risk_limits.validate()?;
        self.exits.validate()?;

        if let Some(scale) = self.scale_in {
            if scale.max_entries == 0 {
                return Err(ConfigError::invalid("scale_in.max_entries", "must be >= 1"));
            }
            if !(scale.size_multiplier > 0.0 && scale.size_multiplier.is_finite()) {
                return Err(ConfigError::invalid("scale_in.size_multiplier", "must be positive"));
            }
            if scale.step_pct.is_some_and(|s| !(s >= 0.0 && s < 1.0)) {
                return Err(ConfigError::invalid("scale_in.step_pct", "must be in [0, 1)"));
            }
        }
        if self.max_bar_interval_secs.is_some_and(|s| s <= 0) {
            return Err(ConfigError::invalid("max_bar_interval_secs", "must be positive"));
        }
        if !(self.instrument.lot_size >= 0.0 && self.instrument.min_notional >= 0.0) {
            return Err(ConfigError::invalid("instrument", "lot_size and min_notional must be >= 0"));
        }

        if let (Some(risk), Some(max_dd)) =
            (self.sizing.risk_fraction(), self.risk_limits.max_drawdown)
        {
            if risk >= max_dd {
                return Err(ConfigError::ContradictoryRiskLimits(format!(
                    "per-trade risk {risk} >= max drawdown {max_dd}: one stopped trade trips the kill switch"
                )));
            }
        }
        Ok(())
    }

    /// Apply optimizer parameters that tune engine settings. Keys the engine
    /// does not recognize are left for the strategy and ignored here.
    pub fn with_overrides(&self, params: &ParamSet) -> Result<Self, ConfigError> {
        let mut config = self.clone();

        if let Some(v) = get_f64(params, "stop_loss_pct")? {
            config.exits.stop_loss_pct = Some(v);
        }
        if let Some(v) = get_f64(params, "take_profit_pct")? {
            config.exits.take_profit_pct = Some(v);
        }
        if let Some(v) = get_f64(params, "leverage")? {
            config.leverage = v;
        }
        if let Some(v) = get_f64(params, "commission_rate")? {
            config.commission_rate = v;
        }
        if let Some(v) = get_usize(params, "time_exit_bars")? {
            config.exits.time_exit_bars = Some(v);
        }
        if let Some(v) = get_f64(params, "trailing_pct")? {
            let activation_pct = config.exits.trailing.map_or(0.0, |t| t.activation_pct);
            config.exits.trailing = Some(TrailingConfig {
                activation_pct,
                trail_pct: v,
            });
        }
        if let Some(v) = get_f64(params, "trailing_activation_pct")? {
            if let Some(t) = config.exits.trailing.as_mut() {
                t.activation_pct = v;
            }
        }
        if let Some(v) = get_f64(params, "breakeven_trigger_pct")? {
            let buffer_pct = config.exits.breakeven.map_or(0.0, |b| b.buffer_pct);
            config.exits.breakeven = Some(BreakevenConfig {
                trigger_pct: v,
                buffer_pct,
            });
        }
        if let Some(v) = get_f64(params, "breakeven_buffer_pct")? {
            if let Some(b) = config.exits.breakeven.as_mut() {
                b.buffer_pct = v;
            }
        }
        if let Some(v) = get_f64(params, "risk_fraction")? {
            match &mut config.sizing {
                SizingMode::RiskBased { risk_fraction, .. }
                | SizingMode::Volatility { risk_fraction, .. } => *risk_fraction = v,
                _ => {}
            }
        }
        if let Some(v) = get_f64(params, "position_fraction")? {
            if let SizingMode::FixedFraction { fraction } = &mut config.sizing {
                *fraction = v;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// BLAKE3 fingerprint (hex) of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }

    pub fn allows(&self, side: PositionSide) -> bool {
        self.trading_mode.allows(side)
    }
}
