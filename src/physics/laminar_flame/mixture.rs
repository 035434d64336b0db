use uom::si::{
    dynamic_viscosity::pascal_second,
    f64::{DynamicViscosity, SpecificHeatCapacity, ThermalConductivity},
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermal_conductivity::watt_per_meter_kelvin,
};

use crate::support::{
    config::{ConfigError, InputConfig, constrained},
    constraint::{NonNegative, StrictlyPositive},
    property::PropertyError,
};

/// Universal gas constant in J/(mol·K).
const GAS_CONSTANT: f64 = 8.314_462_618;

/// Thermodynamic state at which mixture properties are evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixtureState<'a> {
    /// Temperature in K.
    pub temperature: f64,
    /// Thermodynamic pressure in Pa.
    pub pressure: f64,
    pub mass_fractions: &'a [f64],
}

/// Thermodynamic, transport, and kinetic properties of a reacting mixture.
///
/// Implementations are selected at run time and shared by every element
/// visit, so they must be immutable. Results are in SI units.
pub trait TransportMixture: Send + Sync {
    fn n_species(&self) -> usize;

    /// Mixture molar mass in kg/mol.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn molar_mass(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError>;

    /// Ideal-gas density `p·M/(R·T)` in kg/m³.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the molar mass cannot be evaluated.
    fn density(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError> {
        Ok(state.pressure * self.molar_mass(state)? / (GAS_CONSTANT * state.temperature))
    }

    /// Specific heat at constant pressure in J/(kg·K).
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn specific_heat(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError>;

    /// Dynamic viscosity in Pa·s.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn viscosity(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError>;

    /// Thermal conductivity in W/(m·K).
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn thermal_conductivity(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError>;

    /// Mixture-averaged diffusivity of `species` in m²/s.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn species_diffusivity(
        &self,
        state: &MixtureState<'_>,
        density: f64,
        species: usize,
    ) -> Result<f64, PropertyError>;

    /// Net mass production rate of `species` in kg/(m³·s).
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn production_rate(
        &self,
        state: &MixtureState<'_>,
        density: f64,
        species: usize,
    ) -> Result<f64, PropertyError>;

    /// Volumetric heat release in W/m³.
    ///
    /// # Errors
    ///
    /// Returns a [`PropertyError`] if the state is outside the model's domain.
    fn heat_release_rate(&self, state: &MixtureState<'_>, density: f64)
    -> Result<f64, PropertyError>;
}

/// How [`ConstantTransportMixture`] obtains its thermal conductivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConductivityPolicy {
    Constant(ThermalConductivity),
    /// `k = μ·c_p / Pr`.
    ConstantPrandtl {
        prandtl: f64,
        viscosity: DynamicViscosity,
    },
}

/// Single irreversible step `fuel + ν·oxidizer → (1 + ν)·product`.
///
/// The fuel consumption rate is `A·ρ·Y_fuel·Y_ox·exp(−T_a/T)` in kg/(m³·s)
/// and each kilogram of fuel releases `heat_of_reaction` joules.
#[derive(Debug, Clone, PartialEq)]
pub struct OneStepReaction {
    pub fuel: usize,
    pub oxidizer: usize,
    pub product: usize,
    /// Oxidizer mass consumed per unit fuel mass.
    pub stoichiometric_ratio: f64,
    /// Pre-exponential factor in 1/s.
    pub pre_exponential: f64,
    /// Activation temperature in K.
    pub activation_temperature: f64,
    /// Heat released per unit fuel mass in J/kg.
    pub heat_of_reaction: f64,
}

impl OneStepReaction {
    fn fuel_consumption(&self, state: &MixtureState<'_>, density: f64) -> f64 {
        let y = state.mass_fractions;
        self.pre_exponential
            * density
            * y[self.fuel].max(0.0)
            * y[self.oxidizer].max(0.0)
            * (-self.activation_temperature / state.temperature).exp()
    }
}

/// Mixture with constant specific heat, a constant Lewis number, and an
/// optional one-step reaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantTransportMixture {
    molar_masses: Vec<f64>,
    specific_heat: SpecificHeatCapacity,
    conductivity: ConductivityPolicy,
    viscosity: DynamicViscosity,
    lewis_number: f64,
    reaction: Option<OneStepReaction>,
}

impl ConstantTransportMixture {
    /// Creates a non-reacting mixture.
    ///
    /// `molar_masses` are in kg/mol, one per species.
    #[must_use]
    pub fn new(
        molar_masses: Vec<f64>,
        specific_heat: SpecificHeatCapacity,
        conductivity: ConductivityPolicy,
        viscosity: DynamicViscosity,
        lewis_number: f64,
    ) -> Self {
        Self {
            molar_masses,
            specific_heat,
            conductivity,
            viscosity,
            lewis_number,
            reaction: None,
        }
    }

    #[must_use]
    pub fn with_reaction(mut self, reaction: OneStepReaction) -> Self {
        self.reaction = Some(reaction);
        self
    }

    /// Reads the mixture from `config` for the given `species`.
    ///
    /// Options live under `Physics/<physics>/`: `cp` (default 1000),
    /// `conductivity_model` (`constant` with `k`, default 0.026, or
    /// `constant_prandtl` with `Pr`, default 0.7), `mu` (default 1.8e-5), and
    /// `Le` (default 1). Molar masses come from `Physics/Chemistry/molar_masses`.
    /// A reaction is enabled by naming `Physics/Chemistry/fuel`, which then
    /// also requires `oxidizer`, `product`, `pre_exponential`, and
    /// `heat_of_reaction`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing or malformed values.
    pub fn from_config(
        config: &InputConfig,
        physics: &str,
        species: &[String],
    ) -> Result<Self, ConfigError> {
        let option = |name: &str| format!("Physics/{physics}/{name}");

        let key = "Physics/Chemistry/molar_masses";
        let molar_masses = config
            .f64_list(key)?
            .ok_or_else(|| ConfigError::missing(key))?;
        if molar_masses.len() != species.len() {
            return Err(ConfigError::invalid(
                key,
                format!("{} molar masses for {} species", molar_masses.len(), species.len()),
            ));
        }
        for &mass in &molar_masses {
            constrained::<_, StrictlyPositive>(key, mass)?;
        }

        let key = option("cp");
        let specific_heat = constrained::<_, StrictlyPositive>(
            &key,
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(config.f64_or(&key, 1000.0)?),
        )?
        .into_inner();

        let key = option("mu");
        let viscosity = constrained::<_, StrictlyPositive>(
            &key,
            DynamicViscosity::new::<pascal_second>(config.f64_or(&key, 1.8e-5)?),
        )?
        .into_inner();

        let key = option("conductivity_model");
        let conductivity = match config.str_or(&key, "constant")? {
            "constant" => {
                let key = option("k");
                ConductivityPolicy::Constant(
                    constrained::<_, StrictlyPositive>(
                        &key,
                        ThermalConductivity::new::<watt_per_meter_kelvin>(
                            config.f64_or(&key, 0.026)?,
                        ),
                    )?
                    .into_inner(),
                )
            }
            "constant_prandtl" => {
                let key = option("Pr");
                ConductivityPolicy::ConstantPrandtl {
                    prandtl: constrained::<_, StrictlyPositive>(&key, config.f64_or(&key, 0.7)?)?
                        .into_inner(),
                    viscosity,
                }
            }
            other => {
                return Err(ConfigError::UnknownModel {
                    kind: "conductivity",
                    value: other.to_owned(),
                });
            }
        };

        let key = option("Le");
        let lewis_number = constrained::<_, StrictlyPositive>(&key, config.f64_or(&key, 1.0)?)?
            .into_inner();

        let mixture = Self::new(
            molar_masses,
            specific_heat,
            conductivity,
            viscosity,
            lewis_number,
        );

        match reaction_from_config(config, species)? {
            Some(reaction) => Ok(mixture.with_reaction(reaction)),
            None => Ok(mixture),
        }
    }

    #[must_use]
    pub fn reaction(&self) -> Option<&OneStepReaction> {
        self.reaction.as_ref()
    }
}

fn reaction_from_config(
    config: &InputConfig,
    species: &[String],
) -> Result<Option<OneStepReaction>, ConfigError> {
    if !config.contains("Physics/Chemistry/fuel") {
        return Ok(None);
    }

    let species_index = |role: &str| -> Result<usize, ConfigError> {
        let key = format!("Physics/Chemistry/{role}");
        let name = config.str_or(&key, "")?;
        if name.is_empty() {
            return Err(ConfigError::missing(&key));
        }
        species
            .iter()
            .position(|s| s == name)
            .ok_or_else(|| ConfigError::invalid(&key, format!("`{name}` is not a listed species")))
    };

    let key = "Physics/Chemistry/stoichiometric_ratio";
    let stoichiometric_ratio =
        constrained::<_, NonNegative>(key, config.f64_or(key, 1.0)?)?.into_inner();
    let key = "Physics/Chemistry/pre_exponential";
    let pre_exponential =
        constrained::<_, NonNegative>(key, config.f64_required(key)?)?.into_inner();
    let key = "Physics/Chemistry/activation_temperature";
    let activation_temperature =
        constrained::<_, NonNegative>(key, config.f64_or(key, 0.0)?)?.into_inner();

    Ok(Some(OneStepReaction {
        fuel: species_index("fuel")?,
        oxidizer: species_index("oxidizer")?,
        product: species_index("product")?,
        stoichiometric_ratio,
        pre_exponential,
        activation_temperature,
        heat_of_reaction: config.f64_required("Physics/Chemistry/heat_of_reaction")?,
    }))
}

impl TransportMixture for ConstantTransportMixture {
    fn n_species(&self) -> usize {
        self.molar_masses.len()
    }

    fn molar_mass(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError> {
        if state.mass_fractions.len() != self.molar_masses.len() {
            return Err(PropertyError::OutOfDomain {
                context: format!(
                    "{} mass fractions for {} species",
                    state.mass_fractions.len(),
                    self.molar_masses.len()
                ),
            });
        }

        let inverse: f64 = state
            .mass_fractions
            .iter()
            .zip(&self.molar_masses)
            .map(|(y, m)| y / m)
            .sum();
        if inverse > 0.0 {
            Ok(inverse.recip())
        } else {
            Err(PropertyError::OutOfDomain {
                context: format!("mass fractions {:?} give no mixture", state.mass_fractions),
            })
        }
    }

    fn specific_heat(&self, _state: &MixtureState<'_>) -> Result<f64, PropertyError> {
        Ok(self.specific_heat.get::<joule_per_kilogram_kelvin>())
    }

    fn viscosity(&self, _state: &MixtureState<'_>) -> Result<f64, PropertyError> {
        Ok(self.viscosity.get::<pascal_second>())
    }

    fn thermal_conductivity(&self, state: &MixtureState<'_>) -> Result<f64, PropertyError> {
        Ok(match self.conductivity {
            ConductivityPolicy::Constant(k) => k.get::<watt_per_meter_kelvin>(),
            ConductivityPolicy::ConstantPrandtl { prandtl, viscosity } => {
                viscosity.get::<pascal_second>() * self.specific_heat(state)? / prandtl
            }
        })
    }

    fn species_diffusivity(
        &self,
        state: &MixtureState<'_>,
        density: f64,
        _species: usize,
    ) -> Result<f64, PropertyError> {
        let k = self.thermal_conductivity(state)?;
        let cp = self.specific_heat(state)?;
        Ok(k / (density * cp * self.lewis_number))
    }

    fn production_rate(
        &self,
        state: &MixtureState<'_>,
        density: f64,
        species: usize,
    ) -> Result<f64, PropertyError> {
        let Some(reaction) = &self.reaction else {
            return Ok(0.0);
        };

        let consumption = reaction.fuel_consumption(state, density);
        let nu = reaction.stoichiometric_ratio;
        let mut rate = 0.0;
        if species == reaction.fuel {
            rate -= consumption;
        }
        if species == reaction.oxidizer {
            rate -= nu * consumption;
        }
        if species == reaction.product {
            rate += (1.0 + nu) * consumption;
        }
        Ok(rate)
    }

    fn heat_release_rate(
        &self,
        state: &MixtureState<'_>,
        density: f64,
    ) -> Result<f64, PropertyError> {
        Ok(self.reaction.as_ref().map_or(0.0, |reaction| {
            reaction.heat_of_reaction * reaction.fuel_consumption(state, density)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn air() -> ConstantTransportMixture {
        ConstantTransportMixture::new(
            vec![0.028, 0.032],
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1000.0),
            ConductivityPolicy::ConstantPrandtl {
                prandtl: 0.7,
                viscosity: DynamicViscosity::new::<pascal_second>(1.4e-5),
            },
            DynamicViscosity::new::<pascal_second>(1.4e-5),
            2.0,
        )
    }

    #[test]
    fn ideal_gas_density_uses_mixture_molar_mass() {
        let mixture = air();
        let state = MixtureState {
            temperature: 300.0,
            pressure: 101_325.0,
            mass_fractions: &[0.5, 0.5],
        };

        let molar_mass = mixture.molar_mass(&state).unwrap();
        assert_relative_eq!(molar_mass, 1.0 / (0.5 / 0.028 + 0.5 / 0.032));
        assert_relative_eq!(
            mixture.density(&state).unwrap(),
            101_325.0 * molar_mass / (GAS_CONSTANT * 300.0)
        );
    }

    #[test]
    fn prandtl_and_lewis_closures() {
        let mixture = air();
        let state = MixtureState {
            temperature: 300.0,
            pressure: 101_325.0,
            mass_fractions: &[0.5, 0.5],
        };

        let k = mixture.thermal_conductivity(&state).unwrap();
        assert_relative_eq!(k, 1.4e-5 * 1000.0 / 0.7);
        assert_relative_eq!(
            mixture.species_diffusivity(&state, 1.2, 0).unwrap(),
            k / (1.2 * 1000.0 * 2.0)
        );
    }

    #[test]
    fn reaction_conserves_mass() {
        let mixture = ConstantTransportMixture::new(
            vec![0.016, 0.032, 0.028],
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1200.0),
            ConductivityPolicy::Constant(ThermalConductivity::new::<watt_per_meter_kelvin>(0.05)),
            DynamicViscosity::new::<pascal_second>(1.8e-5),
            1.0,
        )
        .with_reaction(OneStepReaction {
            fuel: 0,
            oxidizer: 1,
            product: 2,
            stoichiometric_ratio: 4.0,
            pre_exponential: 1.0e3,
            activation_temperature: 1.0e4,
            heat_of_reaction: 5.0e7,
        });
        let state = MixtureState {
            temperature: 1500.0,
            pressure: 101_325.0,
            mass_fractions: &[0.05, 0.2, 0.75],
        };
        let density = 0.25;

        let rates: Vec<f64> = (0..3)
            .map(|s| mixture.production_rate(&state, density, s).unwrap())
            .collect();
        let consumption = 1.0e3 * density * 0.05 * 0.2 * (-1.0e4_f64 / 1500.0).exp();

        assert_relative_eq!(rates[0], -consumption);
        assert_relative_eq!(rates[1], -4.0 * consumption);
        assert_relative_eq!(rates.iter().sum::<f64>(), 0.0, epsilon = 1e-15);
        assert_relative_eq!(
            mixture.heat_release_rate(&state, density).unwrap(),
            5.0e7 * consumption
        );
    }

    #[test]
    fn empty_mixture_is_out_of_domain() {
        let state = MixtureState {
            temperature: 300.0,
            pressure: 101_325.0,
            mass_fractions: &[0.0, 0.0],
        };
        assert!(matches!(
            air().density(&state),
            Err(PropertyError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn reads_reaction_from_config() {
        let species = vec!["CH4".to_owned(), "O2".to_owned(), "CO2".to_owned()];
        let config = InputConfig::new()
            .with("Physics/Chemistry/molar_masses", vec![0.016, 0.032, 0.044])
            .with("Physics/Chemistry/fuel", "CH4")
            .with("Physics/Chemistry/oxidizer", "O2")
            .with("Physics/Chemistry/product", "CO2")
            .with("Physics/Chemistry/pre_exponential", 2.0e8)
            .with("Physics/Chemistry/heat_of_reaction", 5.0e7);

        let mixture =
            ConstantTransportMixture::from_config(&config, "Laminar1DFlame", &species).unwrap();
        let reaction = mixture.reaction().unwrap();
        assert_eq!((reaction.fuel, reaction.oxidizer, reaction.product), (0, 1, 2));
        assert_relative_eq!(reaction.stoichiometric_ratio, 1.0);

        let config = config.with("Physics/Chemistry/product", "H2O");
        assert!(matches!(
            ConstantTransportMixture::from_config(&config, "Laminar1DFlame", &species),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
