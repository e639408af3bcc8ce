//! Parameter values shared by strategies, engine overrides and the optimizer.
//!
//! A `ParamSet` is a `BTreeMap`, so iteration order (and therefore the
//! canonical JSON used for fingerprints) does not depend on insertion order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// A named parameter combination.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Look up a numeric parameter.
pub fn get_f64(params: &ParamSet, key: &str) -> Result<Option<f64>, ConfigError> {
    params
        .get(key)
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| ConfigError::invalid(key, format!("expected a number, got `{v}`")))
        })
        .transpose()
}

/// Look up a non-negative integer parameter.
pub fn get_usize(params: &ParamSet, key: &str) -> Result<Option<usize>, ConfigError> {
    params
        .get(key)
        .map(|v| {
            v.as_i64()
                .filter(|i| *i >= 0)
                .map(|i| i as usize)
                .ok_or_else(|| {
                    ConfigError::invalid(key, format!("expected a non-negative integer, got `{v}`"))
                })
        })
        .transpose()
}

/// BLAKE3 fingerprint (hex) of the canonical JSON form of `params`.
pub fn fingerprint(params: &ParamSet) -> String {
    let json = serde_json::to_vec(params).unwrap_or_default();
    blake3::hash(&json).to_hex().to_string()
}

/// Compact `key=value` rendering in key order.
pub fn describe(params: &ParamSet) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}
