//! Advection-diffusion of temperature by a prescribed velocity.
//!
//! Solves `ρ·c_p·(∂T/∂t + u·∇T) − ∇·(k·∇T) = 0` with constant properties and
//! a uniform velocity `u`. Convection-dominated flows are stabilized with
//! SUPG: the test function gains a streamline term `τ·u·∇φ_i` applied to the
//! strong residual `ρ·c_p·(Ṫ + u·∇T) − k·∇²T`, with
//!
//! `τ = (u·G·u + C·κ²·(G:G))^(-1/2)`, `κ = k / (ρ·c_p)`.
//!
//! `∇²T` is taken element-wise from the shape function Laplacians, so it is
//! zero on first-order elements.
//!
//! `rho`, `Cp` and `k` are registered as parameters.
//!
//! # Configuration
//!
//! | Key                                       | Default    |
//! |-------------------------------------------|------------|
//! | `Physics/HeatTransfer/rho`                | `1`        |
//! | `Physics/HeatTransfer/Cp`                 | `1`        |
//! | `Physics/HeatTransfer/k`                  | `1`        |
//! | `Physics/HeatTransfer/velocity`           | `[0]`      |
//! | `Physics/HeatTransfer/stabilized`         | `true`     |
//! | `Physics/HeatTransfer/diffusion_constant` | `36`       |
//! | `Physics/HeatTransfer/FE_family`          | `LAGRANGE` |
//! | `Physics/HeatTransfer/T_order`            | `SECOND`   |
//! | `Physics/VariableNames/temperature`       | `T`        |

use nalgebra::Vector3;
use uom::si::{
    f64::{MassDensity, SpecificHeatCapacity, ThermalConductivity},
    mass_density::kilogram_per_cubic_meter,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermal_conductivity::watt_per_meter_kelvin,
};

use crate::{
    physics::{JacobianStatus, ParameterHandles, Physics, PhysicsName},
    support::{
        config::{ConfigError, InputConfig, constrained, physics_key, variable_name_key},
        constraint::{NonNegative, StrictlyPositive},
        fe::{FeData, FeFamily, FeOrder},
        stabilization::{compute_g_tensor, compute_tau},
    },
    system::{
        AssemblyContext, AssemblyError, AssemblyParts, ElementState, VariableIndex,
        VariableRegistry,
    },
};

const NAME: &str = PhysicsName::HeatTransfer.as_str();

/// Options of [`HeatTransfer`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeatTransferOptions {
    pub density: MassDensity,
    pub specific_heat: SpecificHeatCapacity,
    pub conductivity: ThermalConductivity,
    /// Uniform advecting velocity in m/s.
    pub velocity: Vector3<f64>,
    pub stabilized: bool,
    /// Inverse-estimate constant `C` of the stabilization parameter.
    pub diffusion_constant: f64,
    pub family: FeFamily,
    pub order: FeOrder,
    pub temperature_name: String,
}

impl HeatTransferOptions {
    /// Reads the options from `config`, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for wrong-typed values, a velocity with more
    /// than three components, non-positive `rho` or `Cp`, or negative `k`.
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

        let key = physics_key(NAME, "k");
        let conductivity = constrained::<_, NonNegative>(
            &key,
            ThermalConductivity::new::<watt_per_meter_kelvin>(config.f64_or(&key, 1.0)?),
        )?;

        let key = physics_key(NAME, "velocity");
        let components = config.f64_list(&key)?.unwrap_or_default();
        if components.len() > 3 {
            return Err(ConfigError::InvalidValue {
                key,
                reason: format!("{} velocity components given, at most 3", components.len()),
            });
        }
        let mut velocity = Vector3::zeros();
        for (axis, value) in components.into_iter().enumerate() {
            velocity[axis] = value;
        }

        let key = physics_key(NAME, "diffusion_constant");
        let diffusion_constant = config.f64_or(&key, 36.0)?;
        constrained::<_, StrictlyPositive>(&key, diffusion_constant)?;

        Ok(Self {
            density: density.into_inner(),
            specific_heat: specific_heat.into_inner(),
            conductivity: conductivity.into_inner(),
            velocity,
            stabilized: config.bool_or(&physics_key(NAME, "stabilized"), true)?,
            diffusion_constant,
            family: config.parse_or(&physics_key(NAME, "FE_family"), FeFamily::Lagrange)?,
            order: config.parse_or(&physics_key(NAME, "T_order"), FeOrder::Second)?,
            temperature_name: config
                .str_or(&variable_name_key("temperature"), "T")?
                .to_owned(),
        })
    }
}

/// Advective heat transfer physics.
pub struct HeatTransfer {
    options: HeatTransferOptions,
    temperature: Option<VariableIndex>,
}

impl HeatTransfer {
    #[must_use]
    pub fn new(options: HeatTransferOptions) -> Self {
        Self {
            options,
            temperature: None,
        }
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid options.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let options = HeatTransferOptions::from_config(config)?;
        log::debug!(
            "{NAME}: velocity {:?}, stabilized = {}",
            options.velocity.as_slice(),
            options.stabilized
        );
        Ok(Self::new(options))
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

    /// SUPG parameter at `qp`, zero when stabilization is off.
    fn tau(&self, fe: &FeData, qp: usize) -> f64 {
        if !self.options.stabilized {
            return 0.0;
        }
        let diffusivity =
            self.options.conductivity.get::<watt_per_meter_kelvin>() / self.heat_capacity();
        compute_tau(
            self.options.diffusion_constant,
            diffusivity,
            &compute_g_tensor(fe, qp),
            &self.options.velocity,
        )
    }

    /// Diffusive part `−k·∇²T` of the strong residual at `qp`, and its
    /// derivatives with respect to the element coefficients.
    fn strong_diffusion(&self, state: &ElementState, qp: usize) -> (f64, Vec<f64>) {
        let t = self.temperature();
        let k = self.options.conductivity.get::<watt_per_meter_kelvin>();
        let derivatives: Vec<f64> = state
            .element_fe(t)
            .laplacian()
            .iter()
            .map(|laplacian_j| -k * laplacian_j[qp])
            .collect();
        let value: f64 = derivatives
            .iter()
            .zip(state.coefficients(t).iter())
            .map(|(d, u)| d * u)
            .sum();
        (value, derivatives)
    }

    /// Streamline derivatives `u·∇φ_i` at `qp`.
    fn streamline(&self, state: &ElementState, qp: usize) -> Vec<f64> {
        let dphi = state.element_fe(self.temperature()).dphi();
        dphi.iter()
            .map(|dphi_i| self.options.velocity.dot(&dphi_i[qp]))
            .collect()
    }
}

impl Physics for HeatTransfer {
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
        let request = context.request_element_fe(self.temperature());
        request.jxw().phi().dphi();
        if self.options.stabilized {
            request.inverse_map().laplacian();
        }
    }

    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let t = self.temperature();
        let rho_cp = self.heat_capacity();
        let k = self.options.conductivity.get::<watt_per_meter_kelvin>();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(t);
        let (jxw, phi, dphi) = (fe.jxw(), fe.phi(), fe.dphi());
        let n = fe.n_dofs();

        for qp in 0..fe.n_qpoints() {
            let grad_t = state.interior_gradient(t, qp);
            let advection = rho_cp * self.options.velocity.dot(&grad_t);
            let tau = self.tau(fe, qp);
            let streamline = self.streamline(state, qp);
            let (diffusion, diffusion_derivatives) = if self.options.stabilized {
                self.strong_diffusion(state, qp)
            } else {
                (0.0, vec![0.0; n])
            };

            let residual = local.residual_mut(t);
            for i in 0..n {
                residual[i] += (advection * phi[i][qp]
                    + k * grad_t.dot(&dphi[i][qp])
                    + tau * streamline[i] * (advection + diffusion))
                    * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(t, t);
                for i in 0..n {
                    for j in 0..n {
                        let strong = rho_cp * streamline[j] + diffusion_derivatives[j];
                        jacobian[(i, j)] += (rho_cp * streamline[j] * phi[i][qp]
                            + k * dphi[j][qp].dot(&dphi[i][qp])
                            + tau * streamline[i] * strong)
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
            let storage = rho_cp * state.interior_rate(t, qp);
            let tau = self.tau(fe, qp);
            let streamline = self.streamline(state, qp);

            let residual = local.residual_mut(t);
            for i in 0..n {
                residual[i] += (phi[i][qp] + tau * streamline[i]) * storage * jxw[qp];
            }

            if request_jacobian {
                let jacobian = local.jacobian_mut(t, t);
                for i in 0..n {
                    for j in 0..n {
                        jacobian[(i, j)] += rate_derivative
                            * rho_cp
                            * (phi[i][qp] + tau * streamline[i])
                            * phi[j][qp]
                            * jxw[qp];
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
            "k" => handles.push(&mut self.options.conductivity.value),
            _ => {}
        }
    }
}
