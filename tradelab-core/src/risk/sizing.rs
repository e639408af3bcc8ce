//! Position sizing.
//!
//! Every mode produces a target notional; the shared tail then caps it at
//! `capital × leverage`, applies optional signal-strength scaling, floors the
//! size to the instrument lot and checks the minimum notional.

use serde::{Deserialize, Serialize};

use super::RejectReason;
use crate::config::InstrumentSpec;
use crate::error::ConfigError;

/// How much to put on when an entry fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMode {
    /// Margin = capital × fraction; notional = margin × leverage.
    FixedFraction { fraction: f64 },
    /// Fixed notional per entry.
    FixedNotional { amount: f64 },
    /// Lose `risk_fraction` of capital if the stop at `stop_distance_pct`
    /// is hit. Falls back to the configured stop-loss distance.
    RiskBased {
        risk_fraction: f64,
        #[serde(default)]
        stop_distance_pct: Option<f64>,
    },
    /// Fractional Kelly: `k = p − (1 − p)/b`, margin fraction `min(k × fraction, cap)`.
    Kelly {
        win_rate: f64,
        payoff_ratio: f64,
        fraction: f64,
        cap: f64,
    },
    /// Risk `risk_fraction` of capital against a stop `atr_multiple × ATR` away.
    Volatility {
        risk_fraction: f64,
        atr_period: usize,
        atr_multiple: f64,
    },
}

impl Default for SizingMode {
    fn default() -> Self {
        SizingMode::FixedFraction { fraction: 1.0 }
    }
}

/// Inputs available to the sizer at entry time.
#[derive(Debug, Clone, Copy)]
pub struct SizingRequest {
    /// Realized balance. Margin already in use is subtracted later, when
    /// the sized order is fitted to available capital.
    pub capital: f64,
    pub price: f64,
    pub leverage: f64,
    pub stop_loss_pct: Option<f64>,
    /// ATR at the signalling bar, computed from bars up to that bar only.
    pub atr: Option<f64>,
    pub strength: Option<f64>,
    pub scale_by_strength: bool,
}

/// Accepted size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSize {
    pub size: f64,
    pub notional: f64,
}

impl SizingMode {
    pub fn atr_period(&self) -> Option<usize> {
        match self {
            SizingMode::Volatility { atr_period, .. } => Some(*atr_period),
            _ => None,
        }
    }

    pub fn risk_fraction(&self) -> Option<f64> {
        match self {
            SizingMode::RiskBased { risk_fraction, .. }
            | SizingMode::Volatility { risk_fraction, .. } => Some(*risk_fraction),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(field: &str, v: f64) -> Result<(), ConfigError> {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be in (0, 1], got {v}")))
            }
        }
        fn positive(field: &str, v: f64) -> Result<(), ConfigError> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::invalid(field, format!("must be positive, got {v}")))
            }
        }

        match *self {
            SizingMode::FixedFraction { fraction } => unit("sizing.fraction", fraction),
            SizingMode::FixedNotional { amount } => positive("sizing.amount", amount),
            SizingMode::RiskBased {
                risk_fraction,
                stop_distance_pct,
            } => {
                unit("sizing.risk_fraction", risk_fraction)?;
                if let Some(d) = stop_distance_pct {
                    unit("sizing.stop_distance_pct", d)?;
                }
                Ok(())
            }
            SizingMode::Kelly {
                win_rate,
                payoff_ratio,
                fraction,
                cap,
            } => {
                if !(0.0..=1.0).contains(&win_rate) {
                    return Err(ConfigError::invalid(
                        "sizing.win_rate",
                        format!("must be in [0, 1], got {win_rate}"),
                    ));
                }
                positive("sizing.payoff_ratio", payoff_ratio)?;
                unit("sizing.fraction", fraction)?;
                unit("sizing.cap", cap)
            }
            SizingMode::Volatility {
                risk_fraction,
                atr_period,
                atr_multiple,
            } => {
                unit("sizing.risk_fraction", risk_fraction)?;
                if atr_period == 0 {
                    return Err(ConfigError::invalid("sizing.atr_period", "must be >= 1"));
                }
                positive("sizing.atr_multiple", atr_multiple)
            }
        }
    }

    /// Size an entry. Rejections carry the reason for the audit log.
    pub fn size(
        &self,
        req: &SizingRequest,
        instrument: &InstrumentSpec,
    ) -> Result<PositionSize, RejectReason> {
        if req.capital <= 0.0 || req.price <= 0.0 {
            return Err(RejectReason::ZeroSize);
        }

        let target = match *self {
            SizingMode::FixedFraction { fraction } => req.capital * fraction * req.leverage,
            SizingMode::FixedNotional { amount } => amount,
            SizingMode::RiskBased {
                risk_fraction,
                stop_distance_pct,
            } => {
                let distance = stop_distance_pct
                    .or(req.stop_loss_pct)
                    .filter(|d| *d > 0.0)
                    .ok_or(RejectReason::NoStopDistance)?;
                req.capital * risk_fraction / distance
            }
            SizingMode::Kelly {
                win_rate,
                payoff_ratio,
                fraction,
                cap,
            } => {
                let kelly = win_rate - (1.0 - win_rate) / payoff_ratio;
                if kelly <= 0.0 {
                    return Err(RejectReason::NonPositiveKelly);
                }
                req.capital * (kelly * fraction).min(cap) * req.leverage
            }
            SizingMode::Volatility {
                risk_fraction,
                atr_multiple,
                ..
            } => {
                let atr = req
                    .atr
                    .filter(|a| a.is_finite() && *a > 0.0)
                    .ok_or(RejectReason::NoVolatilityEstimate)?;
                let size = req.capital * risk_fraction / (atr * atr_multiple);
                size * req.price
            }
        };

        let mut notional = target.min(req.capital * req.leverage);
        if req.scale_by_strength {
            if let Some(strength) = req.strength {
                notional *= strength.clamp(0.0, 1.0);
            }
        }

        let size = instrument.round_size(notional / req.price);
        if size <= 0.0 || !size.is_finite() {
            return Err(RejectReason::ZeroSize);
        }
        let notional = size * req.price;
        if notional < instrument.min_notional {
            return Err(RejectReason::BelowMinNotional {
                notional,
                min_notional: instrument.min_notional,
            });
        }
        Ok(PositionSize { size, notional })
    }
}
