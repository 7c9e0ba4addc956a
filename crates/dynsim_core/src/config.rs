//! Read-only configuration queries.
//!
//! Integrators are assembled from key/value settings. The core never parses
//! files itself; it only needs the narrow [`ConfigQuery`] interface, which the
//! [`Settings`] map implements and which any external configuration layer can
//! implement as well.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keys understood by the integrator builders.
pub mod keys {
    pub const METHOD: &str = "method";
    pub const STEP_SIZE: &str = "step_size";
    pub const ORDER: &str = "order";
    pub const PREDICTOR_ORDER: &str = "predictor_order";
    pub const CORRECTOR_ORDER: &str = "corrector_order";
    pub const THRESHOLD: &str = "threshold";
    pub const MAX_ITERATIONS: &str = "max_iterations";
    pub const ACCURACY: &str = "accuracy";
    pub const SAFETY: &str = "safety";
    pub const MIN_STEP_SIZE: &str = "min_step_size";
    pub const VARIABLE_WEIGHTS: &str = "variable_weights";
    pub const BUTCHER_TABLEAU: &str = "butcher_tableau";
    pub const BUTCHER_A: &str = "butcher_a";
    pub const BUTCHER_B: &str = "butcher_b";
    pub const BUTCHER_ORDER: &str = "butcher_order";
    pub const STEPPER: &str = "stepper";
    pub const SECOND_STEPPER: &str = "second_stepper";
}

pub trait ConfigQuery {
    fn check_for_key(&self, key: &str) -> bool;

    fn get_integer(&self, key: &str) -> Result<i64, ConfigError>;

    fn get_real(&self, key: &str) -> Result<f64, ConfigError>;

    fn get_bool(&self, key: &str) -> Result<bool, ConfigError>;

    fn get_text(&self, key: &str) -> Result<String, ConfigError>;

    /// Replaces the contents of `buffer` with the array stored under `key`.
    fn get_array(&self, key: &str, buffer: &mut Vec<f64>) -> Result<(), ConfigError>;

    /// True if `key` holds the enum token `value`.
    fn check_for_enum_value(&self, key: &str, value: &str) -> bool {
        matches!(self.get_text(key), Ok(text) if text == value)
    }

    fn get_real_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        if self.check_for_key(key) {
            self.get_real(key)
        } else {
            Ok(default)
        }
    }

    fn get_integer_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        if self.check_for_key(key) {
            self.get_integer(key)
        } else {
            Ok(default)
        }
    }
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Array(Vec<f64>),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Real(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<Vec<f64>> for SettingValue {
    fn from(value: Vec<f64>) -> Self {
        SettingValue::Array(value)
    }
}

/// Flat key/value settings. Nested sections use dotted keys
/// (`stepper.method`) and are read through [`ScopedConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    fn lookup(&self, key: &str) -> Result<&SettingValue, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_string(),
        expected,
    }
}

impl ConfigQuery for Settings {
    fn check_for_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_integer(&self, key: &str) -> Result<i64, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Integer(value) => Ok(*value),
            _ => Err(wrong_type(key, "integer")),
        }
    }

    fn get_real(&self, key: &str) -> Result<f64, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Real(value) => Ok(*value),
            SettingValue::Integer(value) => Ok(*value as f64),
            _ => Err(wrong_type(key, "real")),
        }
    }

    fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Bool(value) => Ok(*value),
            _ => Err(wrong_type(key, "bool")),
        }
    }

    fn get_text(&self, key: &str) -> Result<String, ConfigError> {
        match self.lookup(key)? {
            SettingValue::Text(value) => Ok(value.clone()),
            _ => Err(wrong_type(key, "text")),
        }
    }

    fn get_array(&self, key: &str, buffer: &mut Vec<f64>) -> Result<(), ConfigError> {
        match self.lookup(key)? {
            SettingValue::Array(values) => {
                buffer.clear();
                buffer.extend_from_slice(values);
                Ok(())
            }
            _ => Err(wrong_type(key, "array of reals")),
        }
    }
}

/// View of the keys below `prefix.` of another configuration.
pub struct ScopedConfig<'a> {
    inner: &'a dyn ConfigQuery,
    prefix: String,
}

impl<'a> ScopedConfig<'a> {
    pub fn new(inner: &'a dyn ConfigQuery, prefix: &str) -> Self {
        Self {
            inner,
            prefix: prefix.to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}.{}", self.prefix, key)
    }
}

impl ConfigQuery for ScopedConfig<'_> {
    fn check_for_key(&self, key: &str) -> bool {
        self.inner.check_for_key(&self.full_key(key))
    }

    fn get_integer(&self, key: &str) -> Result<i64, ConfigError> {
        self.inner.get_integer(&self.full_key(key))
    }

    fn get_real(&self, key: &str) -> Result<f64, ConfigError> {
        self.inner.get_real(&self.full_key(key))
    }

    fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        self.inner.get_bool(&self.full_key(key))
    }

    fn get_text(&self, key: &str) -> Result<String, ConfigError> {
        self.inner.get_text(&self.full_key(key))
    }

    fn get_array(&self, key: &str, buffer: &mut Vec<f64>) -> Result<(), ConfigError> {
        self.inner.get_array(&self.full_key(key), buffer)
    }
}
