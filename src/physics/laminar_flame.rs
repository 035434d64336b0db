//! One-dimensional laminar premixed flame.
//!
//! Species mass fractions `w_<name>` and temperature `T` are advected by a
//! constant mass flux `ṁ` along `x`, diffuse, and react:
//!
//! - species: `ρ·Ẏ_s + ṁ·∂_x Y_s − ∇·(ρ·D_s·∇Y_s) − ω_s = 0`,
//! - energy: `ρ·c_p·Ṫ + ṁ·c_p·∂_x T − ∇·(k·∇T) − q = 0`.
//!
//! For a propagating flame `ṁ` is an unknown scalar variable (`Mdot`) closed
//! by the phase condition `∫ (T − T_anchor) = 0`, which pins the flame inside
//! the domain. Otherwise `ṁ` is the configured `mass_flux`.
//!
//! Mixture properties come from a runtime-selected [`TransportMixture`] and
//! are memoized per quadrature point in the context's cached values, so the
//! residual and mass callbacks of one visit share a single evaluation. The
//! species and energy callbacks do not supply Jacobians; the assembly driver
//! differences them instead.

mod mixture;

use uom::si::{
    f64::{MassDensity, Pressure},
    mass_density::kilogram_per_cubic_meter,
    pressure::pascal,
};

use crate::{
    physics::{JacobianStatus, ParameterHandles, Physics, PhysicsName},
    support::{
        config::{ConfigError, InputConfig, constrained, physics_key, variable_name_key},
        constraint::StrictlyPositive,
        fe::{FeFamily, FeOrder},
        property::PropertyError,
    },
    system::{
        AssemblyContext, AssemblyError, AssemblyParts, CachedQuantity, CachedValues,
        ElementState, VariableIndex, VariableRegistry,
    },
};

pub use mixture::{
    ConductivityPolicy, ConstantTransportMixture, MixtureState, OneStepReaction, TransportMixture,
};

const NAME: &str = PhysicsName::Laminar1DFlame.as_str();

const SPECIES_KEY: &str = "Physics/Chemistry/species";

/// Options of [`Laminar1DFlame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlameOptions {
    pub species: Vec<String>,
    pub species_family: FeFamily,
    pub species_order: FeOrder,
    pub temperature_family: FeFamily,
    pub temperature_order: FeOrder,
    pub temperature_name: String,
    pub thermodynamic_pressure: Pressure,
    /// Replaces the ideal-gas density when set.
    pub fixed_density: Option<MassDensity>,
    /// Mass flux in kg/(m²·s) used when the flame is not propagating.
    pub mass_flux: f64,
    pub propagating: Option<PropagatingFlame>,
}

/// Settings of the `Mdot` eigenvalue of a propagating flame.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatingFlame {
    pub variable_name: String,
    /// Mean temperature the phase condition enforces, in K.
    pub anchor_temperature: f64,
}

impl FlameOptions {
    /// Reads the options from `config`, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without a species list, or without an
    /// `anchor_temperature` for a propagating flame, and other
    /// [`ConfigError`]s for malformed values.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let species: Vec<String> = config
            .list(SPECIES_KEY)?
            .ok_or_else(|| ConfigError::missing(SPECIES_KEY))?
            .to_vec();
        if species.is_empty() {
            return Err(ConfigError::invalid(SPECIES_KEY, "no species listed"));
        }

        let fixed_density = if config.bool_or(&physics_key(NAME, "fixed_density"), false)? {
            let key = physics_key(NAME, "fixed_rho_value");
            let rho = MassDensity::new::<kilogram_per_cubic_meter>(config.f64_or(&key, 0.0)?);
            Some(constrained::<_, StrictlyPositive>(&key, rho)?.into_inner())
        } else {
            None
        };

        let key = physics_key(NAME, "p0");
        let p0 = Pressure::new::<pascal>(config.f64_or(&key, 101_325.0)?);
        let thermodynamic_pressure = if fixed_density.is_some() {
            p0
        } else {
            constrained::<_, StrictlyPositive>(&key, p0)?.into_inner()
        };

        let propagating = if config.bool_or(&physics_key(NAME, "propagating_flame"), false)? {
            Some(PropagatingFlame {
                variable_name: config
                    .str_or(&variable_name_key("mass_flux"), "Mdot")?
                    .to_owned(),
                anchor_temperature: config
                    .f64_required(&physics_key(NAME, "anchor_temperature"))?,
            })
        } else {
            None
        };

        Ok(Self {
            species,
            species_family: config
                .parse_or(&physics_key(NAME, "species_FE_family"), FeFamily::Lagrange)?,
            species_order: config.parse_or(&physics_key(NAME, "species_order"), FeOrder::Second)?,
            temperature_family: config
                .parse_or(&physics_key(NAME, "T_FE_family"), FeFamily::Lagrange)?,
            temperature_order: config.parse_or(&physics_key(NAME, "T_order"), FeOrder::Second)?,
            temperature_name: config
                .str_or(&variable_name_key("temperature"), "T")?
                .to_owned(),
            thermodynamic_pressure,
            fixed_density,
            mass_flux: config.f64_or(&physics_key(NAME, "mass_flux"), 0.0)?,
            propagating,
        })
    }
}

#[derive(Debug, Clone)]
struct FlameVariables {
    species: Vec<VariableIndex>,
    temperature: VariableIndex,
    mass_flux: Option<VariableIndex>,
}

/// Properties at one quadrature point.
struct PointProperties {
    density: f64,
    specific_heat: f64,
    conductivity: f64,
}

/// Laminar premixed flame physics.
pub struct Laminar1DFlame {
    options: FlameOptions,
    mixture: Box<dyn TransportMixture>,
    vars: Option<FlameVariables>,
}

impl Laminar1DFlame {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if `mixture` does not describe
    /// one species per configured name.
    pub fn new(
        options: FlameOptions,
        mixture: Box<dyn TransportMixture>,
    ) -> Result<Self, ConfigError> {
        if mixture.n_species() != options.species.len() {
            return Err(ConfigError::invalid(
                SPECIES_KEY,
                format!(
                    "{} species listed but the mixture describes {}",
                    options.species.len(),
                    mixture.n_species()
                ),
            ));
        }
        Ok(Self {
            options,
            mixture,
            vars: None,
        })
    }

    /// Builds the flame and its mixture from `config`.
    ///
    /// The mixture is chosen by `Physics/Laminar1DFlame/transport_model`;
    /// only `constant` is available.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for invalid options or an unknown model.
    pub fn from_config(config: &InputConfig) -> Result<Self, ConfigError> {
        let options = FlameOptions::from_config(config)?;

        let mixture: Box<dyn TransportMixture> =
            match config.str_or(&physics_key(NAME, "transport_model"), "constant")? {
                "constant" => Box::new(ConstantTransportMixture::from_config(
                    config,
                    NAME,
                    &options.species,
                )?),
                other => {
                    return Err(ConfigError::UnknownModel {
                        kind: "transport",
                        value: other.to_owned(),
                    });
                }
            };

        log::debug!(
            "{NAME}: {} species, {}, {}",
            options.species.len(),
            if options.fixed_density.is_some() {
                "fixed density"
            } else {
                "ideal-gas density"
            },
            if options.propagating.is_some() {
                "propagating"
            } else {
                "burner-stabilized"
            }
        );
        Self::new(options, mixture)
    }

    /// The species mass fraction variables, in species-list order.
    ///
    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn species(&self) -> &[VariableIndex] {
        &self.vars().species
    }

    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn temperature(&self) -> VariableIndex {
        self.vars().temperature
    }

    /// The `Mdot` variable of a propagating flame.
    ///
    /// # Panics
    ///
    /// Panics if called before `init_variables`.
    #[must_use]
    pub fn mass_flux(&self) -> Option<VariableIndex> {
        self.vars().mass_flux
    }

    fn vars(&self) -> &FlameVariables {
        self.vars
            .as_ref()
            .unwrap_or_else(|| panic!("{NAME} used before init_variables"))
    }

    fn current_mass_flux(&self, state: &ElementState) -> f64 {
        match self.vars().mass_flux {
            Some(mdot) => state.coefficients(mdot)[0],
            None => self.options.mass_flux,
        }
    }

    fn mass_fractions(&self, state: &ElementState, qp: usize) -> Vec<f64> {
        self.species()
            .iter()
            .map(|&s| state.interior_value(s, qp))
            .collect()
    }

    /// Evaluates (or recalls) density, `c_p`, and `k` at `qp`.
    fn properties(
        &self,
        state: &ElementState,
        cache: &mut CachedValues,
        qp: usize,
        mixture_state: &MixtureState<'_>,
    ) -> Result<PointProperties, AssemblyError> {
        let element = state.element();
        let property = |quantity: &'static str| {
            move |source: PropertyError| AssemblyError::Property {
                quantity,
                element,
                source,
            }
        };

        let density = cache.try_get_or_compute(CachedQuantity::MixtureDensity, qp, || {
            let rho = match self.options.fixed_density {
                Some(rho) => rho.get::<kilogram_per_cubic_meter>(),
                None => self
                    .mixture
                    .density(mixture_state)
                    .map_err(property("density"))?,
            };
            AssemblyError::check_positive("density", rho, element, qp)
        })?;

        let specific_heat = cache.try_get_or_compute(CachedQuantity::MixtureSpecificHeatP, qp, || {
            let cp = self
                .mixture
                .specific_heat(mixture_state)
                .map_err(property("specific heat"))?;
            AssemblyError::check_positive("specific heat", cp, element, qp)
        })?;

        let conductivity =
            cache.try_get_or_compute(CachedQuantity::MixtureThermalConductivity, qp, || {
                let k = self
                    .mixture
                    .thermal_conductivity(mixture_state)
                    .map_err(property("thermal conductivity"))?;
                AssemblyError::check_positive("thermal conductivity", k, element, qp)
            })?;

        Ok(PointProperties {
            density,
            specific_heat,
            conductivity,
        })
    }
}

impl Physics for Laminar1DFlame {
    fn name(&self) -> &str {
        NAME
    }

    fn init_variables(&mut self, registry: &mut VariableRegistry) -> Result<(), ConfigError> {
        let options = &self.options;
        let species = options
            .species
            .iter()
            .map(|name| {
                registry.add_variable(
                    format!("w_{name}"),
                    options.species_order,
                    options.species_family,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        let temperature = registry.add_variable(
            options.temperature_name.as_str(),
            options.temperature_order,
            options.temperature_family,
        )?;
        let mass_flux = options
            .propagating
            .as_ref()
            .map(|flame| {
                registry.add_variable(
                    flame.variable_name.as_str(),
                    FeOrder::First,
                    FeFamily::Scalar,
                )
            })
            .transpose()?;

        log::debug!(
            "{NAME}: registered {} species variables{}",
            species.len(),
            if mass_flux.is_some() { " and Mdot" } else { "" }
        );
        self.vars = Some(FlameVariables {
            species,
            temperature,
            mass_flux,
        });
        Ok(())
    }

    fn set_time_evolving_vars(&self, registry: &mut VariableRegistry) {
        for &species in self.species() {
            registry.time_evolving(species);
        }
        registry.time_evolving(self.temperature());
    }

    fn init_context(&self, context: &mut AssemblyContext) {
        for &species in self.species() {
            context.request_element_fe(species).jxw().phi().dphi();
        }
        context.request_element_fe(self.temperature()).jxw().phi().dphi();
    }

    fn element_time_derivative(
        &self,
        _request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let t_var = self.temperature();
        let pressure = self.options.thermodynamic_pressure.get::<pascal>();
        let AssemblyParts {
            state,
            local,
            cache,
        } = context.parts();
        let element = state.element();
        let mass_flux = self.current_mass_flux(state);
        let n_qpoints = state.element_fe(t_var).n_qpoints();

        for qp in 0..n_qpoints {
            let temperature = state.interior_value(t_var, qp);
            let mass_fractions = self.mass_fractions(state, qp);
            let mixture_state = MixtureState {
                temperature,
                pressure,
                mass_fractions: &mass_fractions,
            };
            let props = self.properties(state, cache, qp, &mixture_state)?;
            let property = |quantity: &'static str| {
                move |source: PropertyError| AssemblyError::Property {
                    quantity,
                    element,
                    source,
                }
            };

            for (s, &var) in self.species().iter().enumerate() {
                let diffusivity =
                    cache.try_get_or_compute(CachedQuantity::SpeciesDiffusivity(s), qp, || {
                        let d = self
                            .mixture
                            .species_diffusivity(&mixture_state, props.density, s)
                            .map_err(property("species diffusivity"))?;
                        AssemblyError::check_positive("species diffusivity", d, element, qp)
                    })?;
                let production =
                    cache.try_get_or_compute(CachedQuantity::SpeciesProductionRate(s), qp, || {
                        let omega = self
                            .mixture
                            .production_rate(&mixture_state, props.density, s)
                            .map_err(property("production rate"))?;
                        AssemblyError::check_finite("production rate", omega, element, qp)
                    })?;

                let fe = state.element_fe(var);
                let (jxw, phi, dphi) = (fe.jxw(), fe.phi(), fe.dphi());
                let grad_y = state.interior_gradient(var, qp);
                let residual = local.residual_mut(var);
                for i in 0..fe.n_dofs() {
                    residual[i] += (mass_flux * grad_y.x * phi[i][qp]
                        + props.density * diffusivity * grad_y.dot(&dphi[i][qp])
                        - production * phi[i][qp])
                        * jxw[qp];
                }
            }

            let heat_release = cache.try_get_or_compute(CachedQuantity::HeatReleaseRate, qp, || {
                let q = self
                    .mixture
                    .heat_release_rate(&mixture_state, props.density)
                    .map_err(property("heat release"))?;
                AssemblyError::check_finite("heat release", q, element, qp)
            })?;

            let fe = state.element_fe(t_var);
            let (jxw, phi, dphi) = (fe.jxw(), fe.phi(), fe.dphi());
            let grad_t = state.interior_gradient(t_var, qp);
            let residual = local.residual_mut(t_var);
            for i in 0..fe.n_dofs() {
                residual[i] += (mass_flux * props.specific_heat * grad_t.x * phi[i][qp]
                    + props.conductivity * grad_t.dot(&dphi[i][qp])
                    - heat_release * phi[i][qp])
                    * jxw[qp];
            }
        }

        Ok(JacobianStatus::NotComputed)
    }

    /// Phase condition `∫ (T − T_anchor) = 0` on the `Mdot` equation.
    fn element_constraint(
        &self,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let (Some(mdot), Some(flame)) = (self.mass_flux(), &self.options.propagating) else {
            return Ok(JacobianStatus::exact(request_jacobian));
        };
        let t_var = self.temperature();
        let AssemblyParts { state, local, .. } = context.parts();

        let fe = state.element_fe(t_var);
        let (jxw, phi) = (fe.jxw(), fe.phi());
        for qp in 0..fe.n_qpoints() {
            let temperature = state.interior_value(t_var, qp);
            local.residual_mut(mdot)[0] += (temperature - flame.anchor_temperature) * jxw[qp];

            if request_jacobian {
                let jacobian = local.jacobian_mut(mdot, t_var);
                for j in 0..fe.n_dofs() {
                    jacobian[(0, j)] += phi[j][qp] * jxw[qp];
                }
            }
        }

        Ok(JacobianStatus::exact(request_jacobian))
    }

    fn mass_residual(
        &self,
        _request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        let t_var = self.temperature();
        let pressure = self.options.thermodynamic_pressure.get::<pascal>();
        let AssemblyParts {
            state,
            local,
            cache,
        } = context.parts();
        let n_qpoints = state.element_fe(t_var).n_qpoints();

        for qp in 0..n_qpoints {
            let mass_fractions = self.mass_fractions(state, qp);
            let mixture_state = MixtureState {
                temperature: state.interior_value(t_var, qp),
                pressure,
                mass_fractions: &mass_fractions,
            };
            let props = self.properties(state, cache, qp, &mixture_state)?;

            for &var in self.species() {
                let fe = state.element_fe(var);
                let (jxw, phi) = (fe.jxw(), fe.phi());
                let rate = state.interior_rate(var, qp);
                let residual = local.residual_mut(var);
                for i in 0..fe.n_dofs() {
                    residual[i] += props.density * rate * phi[i][qp] * jxw[qp];
                }
            }

            let fe = state.element_fe(t_var);
            let (jxw, phi) = (fe.jxw(), fe.phi());
            let rate = state.interior_rate(t_var, qp);
            let residual = local.residual_mut(t_var);
            for i in 0..fe.n_dofs() {
                residual[i] += props.density * props.specific_heat * rate * phi[i][qp] * jxw[qp];
            }
        }

        Ok(JacobianStatus::NotComputed)
    }

    fn register_parameter<'a>(&'a mut self, name: &str, handles: &mut ParameterHandles<'a>) {
        if name == physics_key(NAME, "p0") {
            handles.push(&mut self.options.thermodynamic_pressure.value);
        } else if name == physics_key(NAME, "mass_flux") {
            handles.push(&mut self.options.mass_flux);
        } else if name == physics_key(NAME, "fixed_rho_value") {
            if let Some(rho) = &mut self.options.fixed_density {
                handles.push(&mut rho.value);
            }
        }
    }
}
