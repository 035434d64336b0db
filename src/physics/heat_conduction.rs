//! Transient heat conduction in a stationary medium.
//!
//! Solves `ρ·c_p·∂T/∂t − ∇·(k(T)·∇T) = 0` with constant density and specific
//! heat and a pluggable conductivity model. The weak form contributes
//!
//! - `∫ k(T)·∇T·∇φ_i` from [`element_time_derivative`], and
//! - `∫ ρ·c_p·Ṫ·φ_i` from [`mass_residual`],
//!
//! both with exact Jacobians (including the `∂k/∂T` cross term).
//!
//! # Configuration
//!
//! | Key                                         | Default    |
//! |---------------------------------------------|------------|
//! | `Physics/HeatConduction/rho`                | `1`        |
//! | `Physics/HeatConduction/Cp`                 | `1`        |
//! | `Physics/HeatConduction/k`                  | `1`        |
//! | `Physics/HeatConduction/conductivity_model` | `constant` |
//! | `Physics/HeatConduction/k_slope`            | `0`        |
//! | `Physics/HeatConduction/k_reference_temperature` | `0`   |
//! | `Physics/HeatConduction/FE_family`          | `LAGRANGE` |
//! | `Physics/HeatConduction/T_order`            | `SECOND`   |
//! | `Physics/VariableNames/temperature`         | `T`        |
//!
//! [`element_time_derivative`]: Physics::element_time_derivative
//! [`mass_residual`]: Physics::mass_residual

mod conductivity;

pub use conductivity::{Conductivity, ConductivityModel, ConstantConductivity, LinearConductivity};

use uom::si::{
    f64::{MassDensity, SpecificHeatCapacity},
    mass_density::kilogram_per_cubic_meter,
    specific_heat_capacity::joule_per_kilogram_kelvin,
};

use crate::{
    physics::{JacobianStatus, ParameterHandles, Physics, PhysicsName},
    support::{
        config::{ConfigError, InputConfig, constrained, physics_key, variable_name_key},
        constraint::StrictlyPositive,
        fe::{FeFamily, FeOrder},
    },
    system::{AssemblyContext, AssemblyError, AssemblyParts, VariableIndex, VariableRegistry},
};

const NAME: &str = PhysicsName::HeatConduction.as_str();

/// Material and discretization options of [`HeatConduction`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeatConductionOptions {
    pub density: MassDensity,
    pub specific_heat: SpecificHeatCapacity,
    pub family: FeFamily,
    pub order: FeOrder,
    pub temperature_name: String,
}

impl HeatConductionOptions {
    /// Reads the options from `config`, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for wrong-typed values, unknown
    /// family/order strings, or a non-positive density or specific heat.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let key = physics_key(NAME, "rho");
        let density = constrained::<_, StrictlyPositive>(
            &key,
            MassDensity::new::<kilogram_per_cubic_meter>(config.f64_or(&key, 1.0)?),
        )?;

        let key = physics_key(NAME, "Cp");
        let specific_heat = constrained::<_, StrictlyPositive>(
            &key,
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(config.f64_or(&key, 1.0)?),
        )?;

        Ok(Self {
            density: density.into_inner(),
            specific_heat: specific_heat.into_inner(),
            family: config.parse_or(&physics_key(NAME, "FE_family"), FeFamily::Lagrange)?,
            order: config.parse_or(&physics_key(NAME, "T_order"), FeOrder::Second)?,
            temperature_name: config
                .str_or(&variable_name_key("temperature"), "T")?
                .to_owned(),
        })
    }
}

/// Heat conduction physics.
pub struct HeatConduction {
    options: HeatConductionOptions,
    conductivity: Box<dyn ConductivityModel>,
    temperature: Option<VariableIndex>,
}

impl HeatConduction {
    #[must_use]
    pub fn new(options: HeatConductionOptions, conductivity: Box<dyn ConductivityModel>) -> Self {
        Self {
            options,
            conductivity,
            temperature: None,
        }
    }

    /// Builds the module and its conductivity model from `config`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid options or an unknown
    /// `conductivity_model`.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let options = HeatConductionOptions::from_config(config)?;

        let model = config.str_or(&physics_key(NAME, "conductivity_model"), "constant")?;
        let conductivity: Box<dyn ConductivityModel> = match model {
            "constant" => Box::new(ConstantConductivity::from_config(config, NAME)?),
            "linear" => Box::new(LinearConductivity::from_config(config, NAME)?),
            other => {
                return Err(ConfigError::UnknownModel {
                    kind: "conductivity",
                    value: other.to_owned(),
                });
            }
        };

        log::debug!(
            "{NAME}: {model} conductivity, {}/{} temperature `{}`",
            options.family,
            options.order,
            options.temperature_name
        );
        Ok(Self::new(options, conductivity))
    }

    /// The temperature variable.
    ///
    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn temperature(&self) -> VariableIndex {
        self.temperature
            .unwrap_or_else(|| panic!("{NAME} used before init_variables"))
    }

    fn heat_capacity(&self) -> f64 {
        self.options.density.get::<kilogram_per_cubic_meter>()
            * self.options.specific_heat.get::<joule_per_kilogram_kelvin>()
    }
}

impl Physics for HeatConduction {
    fn name(&self) -> &str {
        NAME
    }

    fn init_variables(&mut self, registry: &mut VariableRegistry) -> Result<(), ConfigError> {
        self.temperature = Some(registry.add_variable(
            self.options.temperature_name.as_str(),
            self.options.order,
            self.options.family,
        )?);
        Ok(())
    }

    fn set_time_evolving_vars(&self, registry: &mut VariableRegistry) {
        registry.time_evolving(self.temperature());
    }

    fn init_context(&self, context: &mut AssemblyContext) {
        context
            .request_element_fe(self.temperature())
            .jxw()
            .phi()
            .dphi();
    }

    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let t = self.temperature();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(t);
        let (jxw, phi, dphi) = (fe.jxw(), fe.phi(), fe.dphi());
        let n = fe.n_dofs();

        for qp in 0..fe.n_qpoints() {
            let grad_t = state.interior_gradient(t, qp);
            let k = self.conductivity.evaluate(state.interior_value(t, qp));
            AssemblyError::check_positive("thermal conductivity", k.value, state.element(), qp)?;

            let residual = local.residual_mut(t);
            for i in 0..n {
                residual[i] += k.value * grad_t.dot(&dphi[i][qp]) * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(t, t);
                for i in 0..n {
                    let flux_i = grad_t.dot(&dphi[i][qp]);
                    for j in 0..n {
                        jacobian[(i, j)] += (k.value * dphi[j][qp].dot(&dphi[i][qp])
                            + k.derivative * phi[j][qp] * flux_i)
                            * jxw[qp];
                    }
                }
            }
        }

        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn mass_residual(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let t = self.temperature();
        let rho_cp = self.heat_capacity();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(t);
        let (jxw, phi) = (fe.jxw(), fe.phi());
        let n = fe.n_dofs();
        let rate_derivative = state.solution_rate_derivative();

        for qp in 0..fe.n_qpoints() {
            let t_dot = state.interior_rate(t, qp);

            let residual = local.residual_mut(t);
            for i in 0..n {
                residual[i] += rho_cp * t_dot * phi[i][qp] * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(t, t);
                for i in 0..n {
                    for j in 0..n {
                        jacobian[(i, j)] +=
                            rho_cp * rate_derivative * phi[i][qp] * phi[j][qp] * jxw[qp];
                    }
                }
            }
        }

        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn register_parameter<'a>(&'a mut self, name: &str, handles: &mut ParameterHandles<'a>) {
        let Some(option) = name
            .strip_prefix("Physics/")
            .and_then(|rest| rest.strip_prefix(NAME))
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return;
        };

        match option {
            "rho" => handles.push(&mut self.options.density.value),
            "Cp" => handles.push(&mut self.options.specific_heat.value),
            _ => self.conductivity.register_parameter(option, handles),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DVector;

    use crate::{
        support::mesh::Mesh,
        system::{AssemblyOptions, AssemblySystem},
        test_support::{assert_jacobian_matches_differences, initialized, sheared_triangle},
    };

    fn config() -> InputConfig {
        InputConfig::new()
            .with("Physics/HeatConduction/rho", 2.0)
            .with("Physics/HeatConduction/Cp", 3.0)
            .with("Physics/HeatConduction/k", 2.0)
            .with("Physics/HeatConduction/T_order", "FIRST")
    }

    fn system(mesh: Mesh, config: &InputConfig) -> AssemblySystem {
        initialized(mesh, vec![Box::new(HeatConduction::from_config(config).unwrap())])
    }

    #[test]
    fn reads_options_and_defaults() {
        let options = HeatConductionOptions::from_config(&InputConfig::new()).unwrap();
        assert_relative_eq!(options.density.get::<kilogram_per_cubic_meter>(), 1.0);
        assert_eq!(options.family, FeFamily::Lagrange);
        assert_eq!(options.order, FeOrder::Second);
        assert_eq!(options.temperature_name, "T");

        let renamed = InputConfig::new().with("Physics/VariableNames/temperature", "theta");
        let options = HeatConductionOptions::from_config(&renamed).unwrap();
        assert_eq!(options.temperature_name, "theta");
    }

    #[test]
    fn rejects_invalid_configuration() {
        let family = InputConfig::new().with("Physics/HeatConduction/FE_family", "HERMITE");
        assert!(matches!(
            HeatConduction::from_config(&family),
            Err(ConfigError::UnknownFeFamily { .. })
        ));

        let rho = InputConfig::new().with("Physics/HeatConduction/rho", 0.0);
        assert!(matches!(
            HeatConduction::from_config(&rho),
            Err(ConfigError::InvalidParameter { .. })
        ));

        let model = InputConfig::new().with("Physics/HeatConduction/conductivity_model", "tabular");
        assert!(matches!(
            HeatConduction::from_config(&model),
            Err(ConfigError::UnknownModel { kind: "conductivity", .. })
        ));
    }

    #[test]
    fn single_element_matches_hand_derived_stiffness() {
        let length = 0.5;
        let system = system(Mesh::line(1, 0.0, length), &config());

        let u = DVector::from_vec(vec![0.0, 100.0]);
        let u_dot = DVector::zeros(2);
        let assembled = system
            .assemble(&u, &u_dot, &AssemblyOptions::steady())
            .unwrap();

        // k/L·[1 -1; -1 1]·[0, 100]
        let k_over_l = 2.0 / length;
        assert_relative_eq!(assembled.residual[0], -100.0 * k_over_l, epsilon = 1e-10);
        assert_relative_eq!(assembled.residual[1], 100.0 * k_over_l, epsilon = 1e-10);

        let jacobian = assembled.jacobian.unwrap();
        assert_relative_eq!(jacobian[(0, 0)], k_over_l, epsilon = 1e-12);
        assert_relative_eq!(jacobian[(0, 1)], -k_over_l, epsilon = 1e-12);
    }

    #[test]
    fn uniform_field_mass_residual_is_lumped_capacity() {
        let system = system(sheared_triangle(0.0), &config());
        let u = DVector::from_element(3, 350.0);
        let u_dot = DVector::from_element(3, 4.0);

        let assembled = system
            .assemble(&u, &u_dot, &AssemblyOptions::transient(10.0))
            .unwrap();

        // ρ·c_p·Ṫ·∫φ_i with ∫φ_i = area / 3 = 1
        for i in 0..3 {
            assert_relative_eq!(assembled.residual[i], 2.0 * 3.0 * 4.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn second_order_mass_residual_integrates_shape_functions() {
        let config = config().with("Physics/HeatConduction/T_order", "SECOND");
        let system = system(Mesh::line(1, 0.0, 3.0), &config);
        let u = DVector::from_element(3, 300.0);
        let u_dot = DVector::from_element(3, 1.0);

        let assembled = system
            .assemble(&u, &u_dot, &AssemblyOptions::transient(1.0).residual_only())
            .unwrap();

        // ∫φ over [0, 3] is L/6 for end nodes and 2L/3 for the midpoint.
        assert_relative_eq!(assembled.residual[0], 6.0 * 0.5, epsilon = 1e-10);
        assert_relative_eq!(assembled.residual[1], 6.0 * 0.5, epsilon = 1e-10);
        assert_relative_eq!(assembled.residual[2], 6.0 * 2.0, epsilon = 1e-10);
    }

    #[test]
    fn analytic_jacobian_matches_differences() {
        let config = config()
            .with("Physics/HeatConduction/conductivity_model", "linear")
            .with("Physics/HeatConduction/k_slope", 0.01)
            .with("Physics/HeatConduction/k_reference_temperature", 300.0);
        let system = system(sheared_triangle(0.0), &config);

        let u = DVector::from_vec(vec![300.0, 380.0, 340.0]);
        let u_dot = DVector::from_vec(vec![1.0, -2.0, 0.5]);

        assert_jacobian_matches_differences(&system, &u, &u_dot, &AssemblyOptions::steady());
        assert_jacobian_matches_differences(&system, &u, &u_dot, &AssemblyOptions::transient(3.0));
    }

    #[test]
    fn non_positive_conductivity_is_a_soft_failure() {
        let config = config()
            .with("Physics/HeatConduction/conductivity_model", "linear")
            .with("Physics/HeatConduction/k_slope", -1.0);
        let system = system(Mesh::line(2, 0.0, 1.0), &config);

        let u = DVector::from_element(3, 5.0);
        let result = system.assemble(&u, &DVector::zeros(3), &AssemblyOptions::steady());

        assert!(matches!(
            result,
            Err(AssemblyError::NonPhysical {
                quantity: "thermal conductivity",
                ..
            })
        ));
    }

    #[test]
    fn parameters_reach_the_conductivity_model() {
        let mut system = system(Mesh::line(1, 0.0, 1.0), &config());
        let u = DVector::from_vec(vec![0.0, 1.0]);
        let u_dot = DVector::zeros(2);
        let options = AssemblyOptions::steady().residual_only();

        let before = system.assemble(&u, &u_dot, &options).unwrap().residual;

        let mut k = system.parameter("Physics/HeatConduction/k");
        assert_eq!(k.len(), 1);
        assert_eq!(k.get(), Some(2.0));
        k.set(6.0);

        assert!(system.parameter("Physics/HeatConduction/rho").get() == Some(2.0));
        assert!(system.parameter("Physics/HeatConduction/mu").is_empty());

        let after = system.assemble(&u, &u_dot, &options).unwrap().residual;
        assert_relative_eq!(after[1], 3.0 * before[1], epsilon = 1e-12);
    }
}
