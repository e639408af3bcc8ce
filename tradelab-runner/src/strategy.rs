//! Strategy factories: build a fresh signal generator (and engine config)
//! from one parameter combination.

use tradelab_core::domain::SignalGenerator;
use tradelab_core::params::get_usize;
use tradelab_core::signals::MaCrossover;
use tradelab_core::{ConfigError, EngineConfig, ParamSet};

/// Builds the strategy under test for a parameter combination.
///
/// Every combination gets its own generator; factories hold no mutable
/// state, so they can be shared across worker threads.
pub trait StrategyFactory: Send + Sync {
    fn name(&self) -> &str;

    fn build(&self, params: &ParamSet) -> Result<Box<dyn SignalGenerator>, ConfigError>;

    /// Engine configuration for this combination. By default, parameters
    /// the engine recognizes (stop-loss, leverage, ...) override `base`.
    fn engine_config(
        &self,
        base: &EngineConfig,
        params: &ParamSet,
    ) -> Result<EngineConfig, ConfigError> {
        base.with_overrides(params)
    }
}

/// Factory for [`MaCrossover`]. Reads `fast` and `slow` periods; any other
/// keys are left to the engine overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaCrossoverFactory {
    pub long_only: bool,
}

impl MaCrossoverFactory {
    pub fn long_only() -> Self {
        Self { long_only: true }
    }
}

impl StrategyFactory for MaCrossoverFactory {
    fn name(&self) -> &str {
        "ma_crossover"
    }

    fn build(&self, params: &ParamSet) -> Result<Box<dyn SignalGenerator>, ConfigError> {
        let fast = get_usize(params, "fast")?
            .ok_or_else(|| ConfigError::invalid("fast", "missing"))?;
        let slow = get_usize(params, "slow")?
            .ok_or_else(|| ConfigError::invalid("slow", "missing"))?;
        let strategy = MaCrossover::new(fast, slow)?;
        Ok(if self.long_only {
            Box::new(strategy.long_only())
        } else {
            Box::new(strategy)
        })
    }
}
