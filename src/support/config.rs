//! Flat key-value configuration scoped by physics name.
//!
//! Physics modules are constructed from an [`InputConfig`], a flat map from
//! slash-separated keys to values:
//!
//! - `Physics/<PhysicsName>/<option>` for module options,
//! - `Physics/VariableNames/<variable>` for variable naming,
//! - `Physics/Chemistry/species` for the species list,
//! - `Physics/enabled_physics` for the active module list.
//!
//! Reading input files is left to the caller; this type only stores values and
//! provides typed getters with documented defaults.

mod error;

use std::{collections::BTreeMap, str::FromStr};

use crate::support::constraint::{Constrained, Constraint};

pub use error::ConfigError;

/// A single configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl ConfigValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a boolean",
            Self::Number(_) => "a number",
            Self::Text(_) => "a string",
            Self::List(_) => "a list",
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<f64>> for ConfigValue {
    fn from(values: Vec<f64>) -> Self {
        Self::List(values.into_iter().map(|v| v.to_string()).collect())
    }
}

/// Builds the key `Physics/<physics>/<option>`.
#[must_use]
pub fn physics_key(physics: &str, option: &str) -> String {
    format!("Physics/{physics}/{option}")
}

/// Builds the key `Physics/VariableNames/<variable>`.
#[must_use]
pub fn variable_name_key(variable: &str) -> String {
    format!("Physics/VariableNames/{variable}")
}

/// Flat key-value configuration.
///
/// # Example
///
/// ```
/// use twine_multiphysics::support::config::InputConfig;
///
/// let config = InputConfig::new()
///     .with("Physics/HeatConduction/rho", 8960.0)
///     .with("Physics/Chemistry/species", vec!["N2", "O2"]);
///
/// assert_eq!(config.f64_or("Physics/HeatConduction/rho", 1.0).unwrap(), 8960.0);
/// assert_eq!(config.f64_or("Physics/HeatConduction/Cp", 1.0).unwrap(), 1.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl InputConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this configuration with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Returns true if `key` has a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Reads a boolean, falling back to `default` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the stored value is not a boolean.
    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(ConfigValue::Bool(value)) => Ok(*value),
            Some(other) => Err(ConfigError::wrong_type(key, "a boolean", other.kind())),
        }
    }

    /// Reads a number, falling back to `default` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the stored value is not a number.
    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        self.f64_opt(key).map(|value| value.unwrap_or(default))
    }

    /// Reads a number that has no default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the key is absent, or
    /// [`ConfigError::WrongType`] if the stored value is not a number.
    pub fn f64_required(&self, key: &str) -> Result<f64, ConfigError> {
        self.f64_opt(key)?.ok_or_else(|| ConfigError::missing(key))
    }

    /// Reads a number if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the stored value is not a number.
    pub fn f64_opt(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ConfigValue::Number(value)) => Ok(Some(*value)),
            Some(other) => Err(ConfigError::wrong_type(key, "a number", other.kind())),
        }
    }

    /// Reads a string, falling back to `default` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the stored value is not a string.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, ConfigError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(ConfigValue::Text(value)) => Ok(value),
            Some(other) => Err(ConfigError::wrong_type(key, "a string", other.kind())),
        }
    }

    /// Reads a string and parses it, falling back to `default` when the key is absent.
    ///
    /// Used for enumerated options such as finite-element families and orders.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] for a non-string value, or the
    /// parse error of `T`.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr<Err = ConfigError>,
    {
        match self.values.get(key) {
            None => Ok(default),
            Some(ConfigValue::Text(value)) => value.parse(),
            Some(other) => Err(ConfigError::wrong_type(key, "a string", other.kind())),
        }
    }

    /// Reads a list of strings if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the stored value is not a list.
    pub fn list(&self, key: &str) -> Result<Option<&[String]>, ConfigError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(ConfigValue::List(values)) => Ok(Some(values)),
            Some(other) => Err(ConfigError::wrong_type(key, "a list", other.kind())),
        }
    }

    /// Reads a list whose entries are numbers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WrongType`] if the value is not a list, or
    /// [`ConfigError::InvalidValue`] if an entry does not parse as a number.
    pub fn f64_list(&self, key: &str) -> Result<Option<Vec<f64>>, ConfigError> {
        let Some(entries) = self.list(key)? else {
            return Ok(None);
        };

        entries
            .iter()
            .map(|entry| {
                entry.trim().parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_owned(),
                    reason: format!("`{entry}` is not a number"),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Wraps a configured value in a constraint, attributing failures to `key`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidParameter`] if the constraint is violated.
pub fn constrained<T, C>(key: &str, value: T) -> Result<Constrained<T, C>, ConfigError>
where
    C: Constraint<T>,
{
    Constrained::new(value).map_err(|source| ConfigError::InvalidParameter {
        key: key.to_owned(),
        source,
    })
}
