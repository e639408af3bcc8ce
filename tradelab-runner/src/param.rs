//! Parameter ranges and their Cartesian product.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tradelab_core::{ConfigError, ParamSet, ParamValue};

/// Values one parameter takes during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamRange {
    Int { min: i64, max: i64, step: i64 },
    Float { min: f64, max: f64, step: f64 },
    Values { values: Vec<ParamValue> },
}

impl ParamRange {
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        match self {
            ParamRange::Int { min, max, step } => {
                if *step <= 0 {
                    return Err(ConfigError::invalid(name, format!("step must be > 0, got {step}")));
                }
                if min > max {
                    return Err(ConfigError::invalid(name, format!("min {min} > max {max}")));
                }
            }
            ParamRange::Float { min, max, step } => {
                if !(min.is_finite() && max.is_finite() && step.is_finite()) {
                    return Err(ConfigError::invalid(name, "bounds and step must be finite"));
                }
                if *step <= 0.0 {
                    return Err(ConfigError::invalid(name, format!("step must be > 0, got {step}")));
                }
                if min > max {
                    return Err(ConfigError::invalid(name, format!("min {min} > max {max}")));
                }
            }
            ParamRange::Values { values } => {
                if values.is_empty() {
                    return Err(ConfigError::invalid(name, "value list is empty"));
                }
            }
        }
        Ok(())
    }

    /// Enumerate the values in ascending (or declared) order.
    ///
    /// Float values are computed as `min + i × step` so rounding error does
    /// not accumulate across the range.
    pub fn values(&self) -> Vec<ParamValue> {
        match self {
            ParamRange::Int { min, max, step } if *step > 0 => {
                (*min..=*max).step_by(*step as usize).map(ParamValue::Int).collect()
            }
            ParamRange::Float { min, max, step } if *step > 0.0 && min <= max => {
                let count = ((max - min) / step + 1e-9).floor() as usize + 1;
                (0..count)
                    .map(|i| ParamValue::Float(min + i as f64 * step))
                    .collect()
            }
            ParamRange::Values { values } => values.clone(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named parameter dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(flatten)]
    pub range: ParamRange,
}

/// Ordered parameter dimensions. Declaration order is significant: the last
/// parameter varies fastest in the product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpace {
    params: Vec<ParamDef>,
}

impl ParamSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a dimension (builder style).
    pub fn with(mut self, name: impl Into<String>, range: ParamRange) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            range,
        });
        self
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for def in &self.params {
            if !seen.insert(def.name.as_str()) {
                return Err(ConfigError::invalid(&def.name, "declared more than once"));
            }
            def.range.validate(&def.name)?;
        }
        Ok(())
    }

    /// Number of combinations. An empty space has exactly one: the empty set.
    pub fn combination_count(&self) -> usize {
        self.params.iter().map(|d| d.range.len()).product()
    }

    /// Cartesian product in declaration order, last parameter fastest.
    pub fn combinations(&self) -> Vec<ParamSet> {
        let axes: Vec<(&str, Vec<ParamValue>)> = self
            .params
            .iter()
            .map(|d| (d.name.as_str(), d.range.values()))
            .collect();
        if axes.iter().any(|(_, values)| values.is_empty()) {
            return Vec::new();
        }

        let total = self.combination_count();
        let mut out = Vec::with_capacity(total);
        let mut cursor = vec![0usize; axes.len()];
        for _ in 0..total {
            out.push(
                axes.iter()
                    .zip(&cursor)
                    .map(|((name, values), &i)| (name.to_string(), values[i].clone()))
                    .collect(),
            );
            // Odometer increment from the last axis.
            for axis in (0..axes.len()).rev() {
                cursor[axis] += 1;
                if cursor[axis] < axes[axis].1.len() {
                    break;
                }
                cursor[axis] = 0;
            }
        }
        out
    }
}
