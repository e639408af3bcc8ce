//! Cost model: commission and slippage per fill.
//!
//! Fill prices are recorded raw. Commission (`rate × price × size`) and
//! slippage (from `SlippageModel`) are charged as separate cost lines on
//! both the entry and the exit fill.

use crate::config::{EngineConfig, SlippageModel};

/// Costs of one fill.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FillCosts {
    pub commission: f64,
    pub slippage: f64,
}

impl FillCosts {
    pub fn total(&self) -> f64 {
        self.commission + self.slippage
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub commission_rate: f64,
    pub slippage: SlippageModel,
}

impl CostModel {
    pub fn new(commission_rate: f64, slippage: SlippageModel) -> Self {
        Self {
            commission_rate,
            slippage,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.commission_rate, config.slippage)
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, SlippageModel::None)
    }

    pub fn compute_commission(&self, price: f64, size: f64) -> f64 {
        price * size * self.commission_rate
    }

    pub fn fill_costs(&self, price: f64, size: f64) -> FillCosts {
        FillCosts {
            commission: self.compute_commission(price, size),
            slippage: self.slippage.cost(price, size),
        }
    }

    /// Cost per unit of size at `price`, used to fit entries into capital.
    pub fn cost_per_unit(&self, price: f64) -> f64 {
        self.fill_costs(price, 1.0).total()
    }
}
