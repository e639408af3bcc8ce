//! Margin tiers and liquidation prices.
//!
//! Maintenance margin is tiered by position notional: larger positions carry
//! a higher maintenance rate. A position is liquidated once its equity falls
//! to the maintenance requirement.

use serde::{Deserialize, Serialize};

use crate::domain::{MarginMode, PositionSide};
use crate::error::ConfigError;

/// One notional bracket of the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginTier {
    /// Upper notional bound of this bracket (exclusive). `None` = unbounded.
    pub max_notional: Option<f64>,
    /// Maintenance margin as a fraction of notional.
    pub maintenance_rate: f64,
}

/// Notional-bracket table, ordered by ascending ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarginTierTable {
    tiers: Vec<MarginTier>,
}

impl Default for MarginTierTable {
    /// Perpetual-futures style brackets: 0.5% up to 50k, 1% to 250k,
    /// 2.5% to 1M, 5% to 5M, 10% above.
    fn default() -> Self {
        Self {
            tiers: vec![
                MarginTier { max_notional: Some(50_000.0), maintenance_rate: 0.005 },
                MarginTier { max_notional: Some(250_000.0), maintenance_rate: 0.01 },
                MarginTier { max_notional: Some(1_000_000.0), maintenance_rate: 0.025 },
                MarginTier { max_notional: Some(5_000_000.0), maintenance_rate: 0.05 },
                MarginTier { max_notional: None, maintenance_rate: 0.10 },
            ],
        }
    }
}

impl MarginTierTable {
    pub fn new(tiers: Vec<MarginTier>) -> Result<Self, ConfigError> {
        let table = Self { tiers };
        table.validate()?;
        Ok(table)
    }

    /// Single flat maintenance rate for every notional.
    pub fn flat(maintenance_rate: f64) -> Result<Self, ConfigError> {
        Self::new(vec![MarginTier {
            max_notional: None,
            maintenance_rate,
        }])
    }

    pub fn tiers(&self) -> &[MarginTier] {
        &self.tiers
    }

    /// Ceilings strictly ascending, only the last tier unbounded, rates in
    /// `[0, 1)` and non-decreasing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::InvalidMarginTiers("table is empty".into()));
        }
        let last = self.tiers.len() - 1;
        let mut prev_ceiling = 0.0;
        let mut prev_rate = 0.0;
        for (i, tier) in self.tiers.iter().enumerate() {
            if !(0.0..1.0).contains(&tier.maintenance_rate) {
                return Err(ConfigError::InvalidMarginTiers(format!(
                    "tier {i}: maintenance rate {} outside [0, 1)",
                    tier.maintenance_rate
                )));
            }
            if tier.maintenance_rate < prev_rate {
                return Err(ConfigError::InvalidMarginTiers(format!(
                    "tier {i}: maintenance rate decreases ({} < {prev_rate})",
                    tier.maintenance_rate
                )));
            }
            match tier.max_notional {
                Some(ceiling) if ceiling <= prev_ceiling || !ceiling.is_finite() => {
                    return Err(ConfigError::InvalidMarginTiers(format!(
                        "tier {i}: ceiling {ceiling} not ascending"
                    )));
                }
                None if i != last => {
                    return Err(ConfigError::InvalidMarginTiers(format!(
                        "tier {i}: only the last tier may be unbounded"
                    )));
                }
                Some(ceiling) => prev_ceiling = ceiling,
                None => {}
            }
            prev_rate = tier.maintenance_rate;
        }
        Ok(())
    }

    /// Maintenance rate for a position of `notional`. Notional above the
    /// last bounded ceiling uses the last tier.
    pub fn maintenance_rate(&self, notional: f64) -> f64 {
        self.tiers
            .iter()
            .find(|t| t.max_notional.map_or(true, |ceiling| notional < ceiling))
            .or(self.tiers.last())
            .map_or(0.0, |t| t.maintenance_rate)
    }
}

/// Inputs to a liquidation-price computation.
#[derive(Debug, Clone, Copy)]
pub struct LiquidationInput {
    pub side: PositionSide,
    pub entry_price: f64,
    pub size: f64,
    pub leverage: f64,
    pub maintenance_rate: f64,
    pub margin_mode: MarginMode,
    /// Account balance backing the position in cross mode.
    pub balance: f64,
}

/// Price at which the position's equity meets the maintenance requirement.
///
/// Isolated: `entry × (1 − 1/lev + mmr)` for longs and
/// `entry × (1 + 1/lev − mmr)` for shorts; no liquidation at leverage ≤ 1.
/// Cross: the whole balance backs the position, so the price solves
/// `balance + side × (p − entry) × size = mmr × p × size`.
pub fn liquidation_price(input: &LiquidationInput) -> Option<f64> {
    let LiquidationInput {
        side,
        entry_price,
        size,
        leverage,
        maintenance_rate: mmr,
        margin_mode,
        balance,
    } = *input;

    if size <= 0.0 || entry_price <= 0.0 {
        return None;
    }

    let price = match margin_mode {
        MarginMode::Isolated => {
            if leverage <= 1.0 {
                return None;
            }
            let initial = 1.0 / leverage;
            match side {
                PositionSide::Long => entry_price * (1.0 - initial + mmr),
                PositionSide::Short => entry_price * (1.0 + initial - mmr),
            }
        }
        MarginMode::Cross => match side {
            PositionSide::Long => (entry_price * size - balance) / (size * (1.0 - mmr)),
            PositionSide::Short => (entry_price * size + balance) / (size * (1.0 + mmr)),
        },
    };

    (price.is_finite() && price > 0.0).then_some(price)
}

/// True when the bar's adverse extreme reaches the liquidation price.
pub fn is_liquidated(side: PositionSide, liquidation_price: f64, high: f64, low: f64) -> bool {
    match side {
        PositionSide::Long => low <= liquidation_price,
        PositionSide::Short => high >= liquidation_price,
    }
}
