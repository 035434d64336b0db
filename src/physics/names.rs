use std::{fmt, str::FromStr};

use crate::support::config::{ConfigError, InputConfig};

use super::{AxisymmetricMagnetostatics, HeatConduction, HeatTransfer, Laminar1DFlame, Physics};

/// Key listing the physics to build, in composition order.
pub const ENABLED_PHYSICS_KEY: &str = "Physics/enabled_physics";

/// Registry of the physics modules this crate can build from configuration.
///
/// The string form is both the configuration scope (`Physics/<name>/...`)
/// and the entry expected in `Physics/enabled_physics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicsName {
    HeatConduction,
    HeatTransfer,
    AxisymmetricMagnetostatics,
    Laminar1DFlame,
}

impl PhysicsName {
    pub const ALL: [Self; 4] = [
        Self::HeatConduction,
        Self::HeatTransfer,
        Self::AxisymmetricMagnetostatics,
        Self::Laminar1DFlame,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeatConduction => "HeatConduction",
            Self::HeatTransfer => "HeatTransfer",
            Self::AxisymmetricMagnetostatics => "AxisymmetricMagnetostatics",
            Self::Laminar1DFlame => "Laminar1DFlame",
        }
    }

    /// Builds this module from `config`.
    ///
    /// # Errors
    ///
    /// Returns the module's [`ConfigError`].
    pub fn build(self, config: &InputConfig) -> Result<Box<dyn Physics>, ConfigError> {
        Ok(match self {
            Self::HeatConduction => Box::new(HeatConduction::from_config(config)?),
            Self::HeatTransfer => Box::new(HeatTransfer::from_config(config)?),
            Self::AxisymmetricMagnetostatics => {
                Box::new(AxisymmetricMagnetostatics::from_config(config)?)
            }
            Self::Laminar1DFlame => Box::new(Laminar1DFlame::from_config(config)?),
        })
    }
}

impl FromStr for PhysicsName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownPhysics {
                value: s.to_owned(),
            })
    }
}

impl fmt::Display for PhysicsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds every module listed under `Physics/enabled_physics`, in order.
///
/// # Errors
///
/// Returns [`ConfigError::Missing`] if the list is absent,
/// [`ConfigError::UnknownPhysics`] for an unrecognized entry, or the first
/// module's construction error.
pub fn build_enabled(config: &InputConfig) -> Result<Vec<Box<dyn Physics>>, ConfigError> {
    let names = config
        .list(ENABLED_PHYSICS_KEY)?
        .ok_or_else(|| ConfigError::Missing {
            key: ENABLED_PHYSICS_KEY.to_owned(),
        })?;

    names
        .iter()
        .map(|name| name.parse::<PhysicsName>()?.build(config))
        .collect()
}
