use uom::si::{f64::ThermalConductivity, thermal_conductivity::watt_per_meter_kelvin};

use crate::{
    physics::ParameterHandles,
    support::{
        config::{ConfigError, InputConfig, constrained, physics_key},
        constraint::StrictlyPositive,
    },
};

/// Thermal conductivity and its temperature derivative at one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conductivity {
    /// `k` in W/(m·K).
    pub value: f64,
    /// `∂k/∂T` in W/(m·K²).
    pub derivative: f64,
}

/// Capability to evaluate thermal conductivity at a temperature.
pub trait ConductivityModel: Send + Sync {
    /// Evaluates `k(T)` and `∂k/∂T` at temperature `T` in kelvin.
    fn evaluate(&self, temperature: f64) -> Conductivity;

    /// Adds handles to the model coefficient named `option`, the
    /// configuration option without its `Physics/<name>/` prefix.
    fn register_parameter<'a>(&'a mut self, _option: &str, _handles: &mut ParameterHandles<'a>) {}
}

/// Temperature-independent conductivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantConductivity {
    k: ThermalConductivity,
}

impl ConstantConductivity {
    #[must_use]
    pub fn new(k: ThermalConductivity) -> Self {
        Self { k }
    }

    /// Reads `Physics/<physics>/k` (default 1 W/(m·K)).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `k` is not a strictly positive number.
    pub fn from_config(config: &InputConfig, physics: &str) -> Result<Self, ConfigError> {
        let key = physics_key(physics, "k");
        let k = config.f64_or(&key, 1.0)?;
        let k = constrained::<_, StrictlyPositive>(
            &key,
            ThermalConductivity::new::<watt_per_meter_kelvin>(k),
        )?;
        Ok(Self::new(k.into_inner()))
    }
}

impl ConductivityModel for ConstantConductivity {
    fn evaluate(&self, _temperature: f64) -> Conductivity {
        Conductivity {
            value: self.k.get::<watt_per_meter_kelvin>(),
            derivative: 0.0,
        }
    }

    fn register_parameter<'a>(&'a mut self, option: &str, handles: &mut ParameterHandles<'a>) {
        if option == "k" {
            handles.push(&mut self.k.value);
        }
    }
}

/// Conductivity varying linearly with temperature,
/// `k(T) = k₀ + k₁·(T − T_ref)`.
///
/// The model is only physical where `k(T) > 0`; assembly reports a
/// non-physical state outside that range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearConductivity {
    k0: ThermalConductivity,
    /// `k₁` in W/(m·K²).
    slope: f64,
    /// `T_ref` in kelvin.
    reference_temperature: f64,
}

impl LinearConductivity {
    #[must_use]
    pub fn new(k0: ThermalConductivity, slope: f64, reference_temperature: f64) -> Self {
        Self {
            k0,
            slope,
            reference_temperature,
        }
    }

    /// Reads `Physics/<physics>/{k, k_slope, k_reference_temperature}`
    /// (defaults 1 W/(m·K), 0, and 0 K).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `k` is not strictly positive or a value
    /// has the wrong type.
    pub fn from_config(config: &InputConfig, physics: &str) -> Result<Self, ConfigError> {
        let ConstantConductivity { k } = ConstantConductivity::from_config(config, physics)?;
        let slope = config.f64_or(&physics_key(physics, "k_slope"), 0.0)?;
        let reference_temperature =
            config.f64_or(&physics_key(physics, "k_reference_temperature"), 0.0)?;
        Ok(Self::new(k, slope, reference_temperature))
    }
}

impl ConductivityModel for LinearConductivity {
    fn evaluate(&self, temperature: f64) -> Conductivity {
        Conductivity {
            value: self.k0.get::<watt_per_meter_kelvin>()
                + self.slope * (temperature - self.reference_temperature),
            derivative: self.slope,
        }
    }

    fn register_parameter<'a>(&'a mut self, option: &str, handles: &mut ParameterHandles<'a>) {
        match option {
            "k" => handles.push(&mut self.k0.value),
            "k_slope" => handles.push(&mut self.slope),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn linear_model_value_and_slope() {
        let model = LinearConductivity::new(
            ThermalConductivity::new::<watt_per_meter_kelvin>(2.0),
            0.01,
            300.0,
        );

        let k = model.evaluate(350.0);
        assert_relative_eq!(k.value, 2.5);
        assert_relative_eq!(k.derivative, 0.01);
    }

    #[test]
    fn reads_configuration() {
        let config = InputConfig::new()
            .with("Physics/HeatConduction/k", 16.0)
            .with("Physics/HeatConduction/k_slope", -0.02);

        let model = LinearConductivity::from_config(&config, "HeatConduction").unwrap();
        assert_relative_eq!(model.evaluate(100.0).value, 14.0);

        let bad = InputConfig::new().with("Physics/HeatConduction/k", -1.0);
        assert!(matches!(
            ConstantConductivity::from_config(&bad, "HeatConduction"),
            Err(ConfigError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn exposes_coefficients_as_parameters() {
        let mut model = LinearConductivity::new(
            ThermalConductivity::new::<watt_per_meter_kelvin>(2.0),
            0.0,
            0.0,
        );
        {
            let mut handles = ParameterHandles::new();
            model.register_parameter("k_slope", &mut handles);
            handles.set(0.5);
        }
        assert_relative_eq!(model.evaluate(4.0).value, 4.0);
    }
}
