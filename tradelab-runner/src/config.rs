//! Study configuration. One TOML document holds the engine settings, the
//! parameter grid, the walk-forward windows and the Monte-Carlo bootstrap.

use serde::{Deserialize, Serialize};
use tradelab_core::{ConfigError, EngineConfig};

use crate::grid::GridConfig;
use crate::monte_carlo::MonteCarloConfig;
use crate::walk_forward::WalkForwardConfig;

/// Content-addressable identifier of a study configuration.
pub type StudyId = String;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub engine: EngineConfig,
    pub grid: GridConfig,
    pub walk_forward: WalkForwardConfig,
    pub monte_carlo: MonteCarloConfig,
}

impl StudyConfig {
    /// Parse and validate. Missing sections take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.grid.validate()?;
        self.walk_forward.validate()?;
        self.monte_carlo.validate()
    }

    /// Deterministic hash of the whole study. Two studies with the same id
    /// produce the same results on the same bars.
    pub fn study_id(&self) -> StudyId {
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamRange;
    use crate::scoring::FitnessMetric;
    use crate::walk_forward::WindowMode;

    const STUDY: &str = r#"
        [engine]
        initial_capital = 25000.0
        commission_rate = 0.0005

        [engine.exits]
        stop_loss_pct = 0.03

        [grid]
        scoring = "COMPOSITE"
        parallel = false

        [grid.filters]
        min_trades = 5
        max_drawdown = 0.4

        [[grid.space]]
        name = "fast"
        type = "INT"
        min = 5
        max = 15
        step = 5

        [[grid.space]]
        name = "slow"
        type = "INT"
        min = 30
        max = 60
        step = 30

        [walk_forward]
        mode = "ANCHORED"
        window_len = 300
        step = 50

        [monte_carlo]
        n_resamples = 500
        seed = 7
    "#;

    #[test]
    fn parses_full_study() {
        let config = StudyConfig::from_toml_str(STUDY).unwrap();
        assert_eq!(config.engine.initial_capital, 25_000.0);
        assert_eq!(config.engine.exits.stop_loss_pct, Some(0.03));
        assert_eq!(config.grid.scoring, FitnessMetric::Composite);
        assert_eq!(config.grid.filters.min_trades, 5);
        assert_eq!(config.grid.space.combination_count(), 6);
        assert_eq!(
            config.grid.space.params()[0].range,
            ParamRange::Int { min: 5, max: 15, step: 5 }
        );
        assert_eq!(config.walk_forward.mode, WindowMode::Anchored);
        assert_eq!(config.walk_forward.oos_len(), 50);
        assert_eq!(config.monte_carlo.n_resamples, 500);
        assert_eq!(config.monte_carlo.min_trades, 30);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = StudyConfig::from_toml_str("").unwrap();
        assert_eq!(config, StudyConfig::default());
    }

    #[test]
    fn invalid_sections_fail_fast() {
        let bad_wf = "[walk_forward]\nwindow_len = 10\nstep = 20\n";
        assert!(matches!(
            StudyConfig::from_toml_str(bad_wf),
            Err(ConfigError::InvalidParameter { .. })
        ));
        let bad_capital = "[engine]\ninitial_capital = -1.0\n";
        assert!(matches!(
            StudyConfig::from_toml_str(bad_capital),
            Err(ConfigError::NonPositiveCapital(_))
        ));
        assert!(matches!(
            StudyConfig::from_toml_str("[grid\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn study_id_tracks_content() {
        let a = StudyConfig::from_toml_str(STUDY).unwrap();
        let mut b = a.clone();
        assert_eq!(a.study_id(), b.study_id());
        b.monte_carlo.seed = 8;
        assert_ne!(a.study_id(), b.study_id());
    }
}
