//! Axisymmetric magnetostatics in potential form.
//!
//! The mesh lies in the `(r, z)` half-plane with `r = x` and `z = y`. Two
//! scalar potentials are solved, each with its own discretization:
//!
//! - `A`, the azimuthal magnetic vector potential, from the curl-curl equation
//!   `σ·∂A/∂t + ∇×((1/μ)·∇×(A·e_θ))·e_θ = J`, whose weak form is
//!   `∫ (1/μ)·[∂_z A·∂_z φ + (∂_r A + A/r)·(∂_r φ + φ/r)]·r − J·φ·r`;
//! - `V`, the electric potential, from the current continuity constraint
//!   `∫ σ·∇V·∇φ·r`.
//!
//! Only `A` carries a time derivative (the eddy-current term `σ·Ȧ·φ·r`).
//! Prescribed normal fluxes on listed boundary ids enter as `−∫ g·φ·r` side
//! terms. All Jacobians are exact. The `2π` of the azimuthal integral is
//! dropped throughout.
//!
//! # Configuration
//!
//! Keys under `Physics/AxisymmetricMagnetostatics/`:
//!
//! | Option                                | Default        |
//! |---------------------------------------|----------------|
//! | `A_FE_family`, `V_FE_family`          | `LAGRANGE`     |
//! | `A_order`, `V_order`                  | `FIRST`        |
//! | `sigma` (S/m)                         | `1`            |
//! | `mu` (H/m)                            | `4π·10⁻⁷`      |
//! | `source_current` (A/m²)               | `0`            |
//! | `A_flux_boundaries`, `A_flux_values`  | none           |
//! | `V_flux_boundaries`, `V_flux_values`  | none           |
//!
//! Variable names come from `Physics/VariableNames/magnetic_potential`
//! (default `A`) and `Physics/VariableNames/electric_potential` (default `V`).

use std::f64::consts::PI;

use uom::si::{electrical_conductivity::siemens_per_meter, f64::ElectricalConductivity};

use crate::{
    physics::{JacobianStatus, ParameterHandles, Physics, PhysicsName},
    support::{
        config::{ConfigError, InputConfig, constrained, physics_key, variable_name_key},
        constraint::{NonNegative, StrictlyPositive},
        fe::{FeFamily, FeOrder},
    },
    system::{AssemblyContext, AssemblyError, AssemblyParts, VariableIndex, VariableRegistry},
};

const NAME: &str = PhysicsName::AxisymmetricMagnetostatics.as_str();

/// Vacuum permeability in H/m.
const MU_0: f64 = 4.0e-7 * PI;

/// Options of [`AxisymmetricMagnetostatics`].
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetostaticsOptions {
    pub a_family: FeFamily,
    pub a_order: FeOrder,
    pub v_family: FeFamily,
    pub v_order: FeOrder,
    pub conductivity: ElectricalConductivity,
    /// Magnetic permeability in H/m.
    pub permeability: f64,
    /// Azimuthal source current density in A/m².
    pub source_current: f64,
    /// `(boundary id, flux)` pairs for `A`.
    pub a_fluxes: Vec<(u16, f64)>,
    /// `(boundary id, flux)` pairs for `V`.
    pub v_fluxes: Vec<(u16, f64)>,
    pub a_name: String,
    pub v_name: String,
}

impl MagnetostaticsOptions {
    /// Reads the options from `config`, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for wrong-typed values, unknown family/order
    /// strings, negative `sigma`, non-positive `mu`, or malformed flux lists.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let key = physics_key(NAME, "sigma");
        let conductivity = constrained::<_, NonNegative>(
            &key,
            ElectricalConductivity::new::<siemens_per_meter>(config.f64_or(&key, 1.0)?),
        )?;

        let key = physics_key(NAME, "mu");
        let permeability = constrained::<_, StrictlyPositive>(&key, config.f64_or(&key, MU_0)?)?;

        Ok(Self {
            a_family: config.parse_or(&physics_key(NAME, "A_FE_family"), FeFamily::Lagrange)?,
            a_order: config.parse_or(&physics_key(NAME, "A_order"), FeOrder::First)?,
            v_family: config.parse_or(&physics_key(NAME, "V_FE_family"), FeFamily::Lagrange)?,
            v_order: config.parse_or(&physics_key(NAME, "V_order"), FeOrder::First)?,
            conductivity: conductivity.into_inner(),
            permeability: permeability.into_inner(),
            source_current: config.f64_or(&physics_key(NAME, "source_current"), 0.0)?,
            a_fluxes: boundary_fluxes(config, "A")?,
            v_fluxes: boundary_fluxes(config, "V")?,
            a_name: config
                .str_or(&variable_name_key("magnetic_potential"), "A")?
                .to_owned(),
            v_name: config
                .str_or(&variable_name_key("electric_potential"), "V")?
                .to_owned(),
        })
    }
}

/// Reads the paired `<var>_flux_boundaries` and `<var>_flux_values` lists.
fn boundary_fluxes(config: &InputConfig, var: &str) -> Result<Vec<(u16, f64)>, ConfigError> {
    let ids_key = physics_key(NAME, &format!("{var}_flux_boundaries"));
    let values_key = physics_key(NAME, &format!("{var}_flux_values"));

    let ids = config.f64_list(&ids_key)?.unwrap_or_default();
    let values = config.f64_list(&values_key)?.unwrap_or_default();
    if ids.len() != values.len() {
        return Err(ConfigError::InvalidValue {
            key: values_key,
            reason: format!("{} values for {} boundaries", values.len(), ids.len()),
        });
    }

    ids.into_iter()
        .zip(values)
        .map(|(id, value)| {
            if id.fract() == 0.0 && (0.0..=f64::from(u16::MAX)).contains(&id) {
                Ok((id as u16, value))
            } else {
                Err(ConfigError::InvalidValue {
                    key: ids_key.clone(),
                    reason: format!("`{id}` is not a boundary id"),
                })
            }
        })
        .collect()
}

/// Axisymmetric magnetostatics physics.
pub struct AxisymmetricMagnetostatics {
    options: MagnetostaticsOptions,
    vars: Option<(VariableIndex, VariableIndex)>,
}

impl AxisymmetricMagnetostatics {
    #[must_use]
    pub fn new(options: MagnetostaticsOptions) -> Self {
        Self { options, vars: None }
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid options.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let options = MagnetostaticsOptions::from_config(config)?;
        log::debug!(
            "{NAME}: A {}/{}, V {}/{}, {} A and {} V flux boundaries",
            options.a_family,
            options.a_order,
            options.v_family,
            options.v_order,
            options.a_fluxes.len(),
            options.v_fluxes.len()
        );
        Ok(Self::new(options))
    }

    /// The magnetic potential variable.
    ///
    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn magnetic_potential(&self) -> VariableIndex {
        self.vars().0
    }

    /// The electric potential variable.
    ///
    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn electric_potential(&self) -> VariableIndex {
        self.vars().1
    }

    fn vars(&self) -> (VariableIndex, VariableIndex) {
        self.vars
            .unwrap_or_else(|| panic!("{NAME} used before init_variables"))
    }

    fn sigma(&self) -> f64 {
        self.options.conductivity.get::<siemens_per_meter>()
    }

    /// Adds `−∫ g·φ_i·r` on the current side if its boundary id is listed.
    fn add_side_flux(var: VariableIndex, fluxes: &[(u16, f64)], context: &mut AssemblyContext) {
        let AssemblyParts { state, local, .. } = context.parts();
        let Some(flux) = state
            .boundary_id()
            .and_then(|id| fluxes.iter().find(|(bid, _)| *bid == id))
            .map(|&(_, flux)| flux)
        else {
            return;
        };

        let fe = state.side_fe(var);
        let (jxw, phi, xyz) = (fe.jxw(), fe.phi(), fe.xyz());
        let residual = local.residual_mut(var);
        for qp in 0..fe.n_qpoints() {
            let r = xyz[qp].x;
            for i in 0..fe.n_dofs() {
                residual[i] -= flux * phi[i][qp] * r * jxw[qp];
            }
        }
    }
}

impl Physics for AxisymmetricMagnetostatics {
    fn name(&self) -> &str {
        NAME
    }

    fn init_variables(&mut self, registry: &mut VariableRegistry) -> Result<(), ConfigError> {
        let options = &self.options;
        let a = registry.add_variable(options.a_name.as_str(), options.a_order, options.a_family)?;
        let v = registry.add_variable(options.v_name.as_str(), options.v_order, options.v_family)?;
        self.vars = Some((a, v));
        Ok(())
    }

    fn set_time_evolving_vars(&self, registry: &mut VariableRegistry) {
        registry.time_evolving(self.magnetic_potential());
    }

    fn init_context(&self, context: &mut AssemblyContext) {
        let (a, v) = self.vars();
        for var in [a, v] {
            context.request_element_fe(var).jxw().phi().dphi().xyz();
            context.request_side_fe(var).jxw().phi().xyz();
        }
    }

    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let a = self.magnetic_potential();
        let inv_mu = self.options.permeability.recip();
        let source = self.options.source_current;
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(a);
        let (jxw, phi, dphi, xyz) = (fe.jxw(), fe.phi(), fe.dphi(), fe.xyz());
        let n = fe.n_dofs();

        for qp in 0..fe.n_qpoints() {
            let r = AssemblyError::check_positive("radius", xyz[qp].x, state.element(), qp)?;
            let a_value = state.interior_value(a, qp);
            let grad_a = state.interior_gradient(a, qp);

            // Radial part of ∇×(A·e_θ) is −∂_z A; axial part is ∂_r A + A/r.
            let curl_z = grad_a.x + a_value / r;
            let test_z: Vec<f64> = (0..n).map(|i| dphi[i][qp].x + phi[i][qp] / r).collect();

            let residual = local.residual_mut(a);
            for i in 0..n {
                residual[i] += (inv_mu * (grad_a.y * dphi[i][qp].y + curl_z * test_z[i])
                    - source * phi[i][qp])
                    * r
                    * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(a, a);
                for i in 0..n {
                    for j in 0..n {
                        jacobian[(i, j)] += inv_mu
                            * (dphi[j][qp].y * dphi[i][qp].y + test_z[j] * test_z[i])
                            * r
                            * jxw[qp];
                    }
                }
            }
        }

        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn element_constraint(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let v = self.electric_potential();
        let sigma = self.sigma();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(v);
        let (jxw, dphi, xyz) = (fe.jxw(), fe.dphi(), fe.xyz());
        let n = fe.n_dofs();

        for qp in 0..fe.n_qpoints() {
            let r = AssemblyError::check_positive("radius", xyz[qp].x, state.element(), qp)?;
            let grad_v = state.interior_gradient(v, qp);

            let residual = local.residual_mut(v);
            for i in 0..n {
                residual[i] += sigma * grad_v.dot(&dphi[i][qp]) * r * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(v, v);
                for i in 0..n {
                    for j in 0..n {
                        jacobian[(i, j)] += sigma * dphi[j][qp].dot(&dphi[i][qp]) * r * jxw[qp];
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
        let a = self.magnetic_potential();
        let sigma = self.sigma();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(a);
        let (jxw, phi, xyz) = (fe.jxw(), fe.phi(), fe.xyz());
        let n = fe.n_dofs();
        let rate_derivative = state.solution_rate_derivative();

        for qp in 0..fe.n_qpoints() {
            let r = AssemblyError::check_positive("radius", xyz[qp].x, state.element(), qp)?;
            let a_dot = state.interior_rate(a, qp);

            let residual = local.residual_mut(a);
            for i in 0..n {
                residual[i] += sigma * a_dot * phi[i][qp] * r * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(a, a);
                for i in 0..n {
                    for j in 0..n {
                        jacobian[(i, j)] +=
                            sigma * rate_derivative * phi[i][qp] * phi[j][qp] * r * jxw[qp];
                    }
                }
            }
        }

        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn side_time_derivative(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Self::add_side_flux(self.magnetic_potential(), &self.options.a_fluxes, context);
        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn side_constraint(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Self::add_side_flux(self.electric_potential(), &self.options.v_fluxes, context);
        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn register_parameter<'a>(&'a mut self, name: &str, handles: &mut ParameterHandles<'a>) {
        if name == physics_key(NAME, "sigma") {
            handles.push(&mut self.options.conductivity.value);
        } else if name == physics_key(NAME, "mu") {
            handles.push(&mut self.options.permeability);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use nalgebra::DVector;

    use crate::{
        system::{AssemblyOptions, AssemblySystem},
        test_support::{assert_jacobian_matches_differences, initialized, sheared_triangle},
    };

    fn config() -> InputConfig {
        InputConfig::new()
            .with("Physics/AxisymmetricMagnetostatics/sigma", 2.0)
            .with("Physics/AxisymmetricMagnetostatics/mu", 0.5)
            .with("Physics/AxisymmetricMagnetostatics/source_current", 1.5)
            .with("Physics/AxisymmetricMagnetostatics/A_flux_boundaries", vec![1.0])
            .with("Physics/AxisymmetricMagnetostatics/A_flux_values", vec![-0.25])
            .with("Physics/AxisymmetricMagnetostatics/V_flux_boundaries", vec![0.0])
            .with("Physics/AxisymmetricMagnetostatics/V_flux_values", vec![3.0])
    }

    fn system(x0: f64) -> AssemblySystem {
        initialized(
            sheared_triangle(x0),
            vec![Box::new(AxisymmetricMagnetostatics::from_config(&config()).unwrap())],
        )
    }

    #[test]
    fn registers_two_potentials_with_only_a_evolving() {
        let system = system(1.0);
        let registry = system.registry();

        let a = registry.variable_number("A").unwrap();
        let v = registry.variable_number("V").unwrap();
        assert!(registry.variable(a).is_time_evolving());
        assert!(!registry.variable(v).is_time_evolving());
        assert_eq!(system.n_dofs(), 6);
    }

    #[test]
    fn analytic_jacobian_matches_differences() {
        let system = system(1.0);
        let u = DVector::from_vec(vec![0.3, -0.1, 0.8, 2.0, 1.0, -1.0]);
        let u_dot = DVector::from_vec(vec![1.0, 0.0, -0.5, 0.0, 0.0, 0.0]);

        assert_jacobian_matches_differences(&system, &u, &u_dot, &AssemblyOptions::steady());
        assert_jacobian_matches_differences(&system, &u, &u_dot, &AssemblyOptions::transient(5.0));
    }

    #[test]
    fn electric_flux_is_weighted_by_radius() {
        let system = system(1.0);
        let zero = DVector::zeros(6);
        let assembled = system
            .assemble(&zero, &zero, &AssemblyOptions::steady().residual_only())
            .unwrap();

        // Side 0 runs from r = 1 to r = 3: ∫φ_0·r = 5/3, ∫φ_1·r = 7/3.
        let v = 3..6;
        let residual = assembled.residual.rows(v.start, v.len());
        assert_relative_eq!(residual[0], -3.0 * 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(residual[1], -3.0 * 7.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(residual[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn elements_crossing_the_axis_are_rejected() {
        let system = system(-1.5);
        let zero = DVector::zeros(6);

        assert!(matches!(
            system.assemble(&zero, &zero, &AssemblyOptions::steady()),
            Err(AssemblyError::NonPhysical {
                quantity: "radius",
                ..
            })
        ));
    }

    #[test]
    fn every_radius_weighted_callback_checks_the_radius() {
        let system = system(-1.5);
        let zero = DVector::zeros(6);
        let physics = system.physics().next().unwrap();
        let radius_rejected = |result: Result<JacobianStatus, AssemblyError>| {
            matches!(
                result,
                Err(AssemblyError::NonPhysical {
                    quantity: "radius",
                    ..
                })
            )
        };

        let mut context = system.element_context(0, &zero, &zero, 1.0).unwrap();
        assert!(radius_rejected(physics.element_constraint(true, &mut context)));

        let mut context = system.element_context(0, &zero, &zero, 1.0).unwrap();
        assert!(radius_rejected(physics.mass_residual(true, &mut context)));
    }

    #[test]
    fn rejects_mismatched_flux_lists() {
        let mismatched = config().with(
            "Physics/AxisymmetricMagnetostatics/V_flux_values",
            vec![1.0, 2.0],
        );
        assert!(matches!(
            AxisymmetricMagnetostatics::from_config(&mismatched),
            Err(ConfigError::InvalidValue { .. })
        ));

        let fractional_id = config().with(
            "Physics/AxisymmetricMagnetostatics/A_flux_boundaries",
            vec![2.5],
        );
        assert!(matches!(
            AxisymmetricMagnetostatics::from_config(&fractional_id),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn sigma_is_a_parameter() {
        let mut system = system(1.0);
        let mut sigma = system.parameter("Physics/AxisymmetricMagnetostatics/sigma");
        assert_eq!(sigma.get(), Some(2.0));
        sigma.set(4.0);

        let zero = DVector::zeros(6);
        let rate = DVector::from_vec(vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
        let transient = system
            .assemble(&zero, &rate, &AssemblyOptions::transient(1.0).residual_only())
            .unwrap()
            .residual;
        let steady = system
            .assemble(&zero, &rate, &AssemblyOptions::steady().residual_only())
            .unwrap()
            .residual;

        // σ·∫φ_i·r summed over i is σ·∫r = 4 · (area · r̄) = 4 · 3 · 2.
        let mass: f64 = (0..3).map(|i| transient[i] - steady[i]).sum();
        assert_relative_eq!(mass, 24.0, epsilon = 1e-10);
    }
}
