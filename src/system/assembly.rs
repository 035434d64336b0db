use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::{
    physics::{ParameterHandles, Physics},
    support::{
        config::ConfigError,
        mesh::{BoundarySide, Mesh},
    },
};

use super::{
    AssemblyContext, AssemblyError, Callback, DofMap, VariableIndex, VariableRegistry,
    central_difference,
};

/// Controls one assembly pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    /// Assemble the global Jacobian as well as the residual.
    pub request_jacobian: bool,
    /// Include `mass_residual` contributions.
    pub include_mass: bool,
    /// `∂u̇/∂u` of the time integrator.
    pub rate_derivative: f64,
    /// Relative step of the finite-difference fallback.
    pub fd_step: f64,
}

impl AssemblyOptions {
    const DEFAULT_FD_STEP: f64 = 1e-6;

    /// Residual and Jacobian of the steady problem `F(u) = 0`.
    #[must_use]
    pub fn steady() -> Self {
        Self {
            request_jacobian: true,
            include_mass: false,
            rate_derivative: 0.0,
            fd_step: Self::DEFAULT_FD_STEP,
        }
    }

    /// Residual and Jacobian of `M(u)·u̇ + F(u)` for an integrator whose
    /// stage derivative satisfies `∂u̇/∂u = rate_derivative`.
    #[must_use]
    pub fn transient(rate_derivative: f64) -> Self {
        Self {
            request_jacobian: true,
            include_mass: true,
            rate_derivative,
            fd_step: Self::DEFAULT_FD_STEP,
        }
    }

    /// Skips Jacobian assembly.
    #[must_use]
    pub fn residual_only(self) -> Self {
        Self {
            request_jacobian: false,
            ..self
        }
    }
}

/// Result of one assembly pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub residual: DVector<f64>,
    /// Present when the Jacobian was requested.
    pub jacobian: Option<DMatrix<f64>>,
}

/// Owns the mesh, the variables, and the active physics modules, and
/// assembles their contributions into one global system.
///
/// Setup is two-phase: add every module with [`add_physics`], then call
/// [`init`] once. Assembly is available only after `init`.
///
/// [`add_physics`]: Self::add_physics
/// [`init`]: Self::init
pub struct AssemblySystem {
    mesh: Mesh,
    registry: VariableRegistry,
    physics: Vec<Box<dyn Physics>>,
    setup: Option<Setup>,
}

/// State built by [`AssemblySystem::init`].
struct Setup {
    template: AssemblyContext,
    dof_map: DofMap,
}

#[derive(Debug, Clone, Copy)]
enum Visit {
    Element(usize),
    Side(BoundarySide),
}

/// One element's or side's contribution, ready to scatter.
struct LocalContribution {
    dofs: Vec<usize>,
    residual: DVector<f64>,
    jacobian: Option<DMatrix<f64>>,
}

impl AssemblySystem {
    #[must_use]
    pub fn new(mesh: Mesh) -> Self {
        Self {
            registry: VariableRegistry::new(mesh.dim()),
            mesh,
            physics: Vec::new(),
            setup: None,
        }
    }

    /// Appends a module. Modules are invoked in the order they are added.
    ///
    /// # Panics
    ///
    /// Panics if called after [`init`](Self::init).
    pub fn add_physics(&mut self, physics: Box<dyn Physics>) {
        assert!(
            self.setup.is_none(),
            "physics `{}` added after init",
            physics.name()
        );
        log::debug!("adding physics `{}`", physics.name());
        self.physics.push(physics);
    }

    /// Registers variables, prepares the context template, and numbers dofs.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on a variable name collision or a
    /// discretization the mesh cannot carry.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    pub fn init(&mut self) -> Result<(), ConfigError> {
        assert!(self.setup.is_none(), "assembly system initialized twice");

        for physics in &mut self.physics {
            physics.init_variables(&mut self.registry)?;
        }
        for physics in &self.physics {
            physics.set_time_evolving_vars(&mut self.registry);
        }

        let discretizations = self
            .registry
            .iter()
            .map(|var| (var.family(), var.order()))
            .collect();
        let mut template = AssemblyContext::new(discretizations);
        for physics in &self.physics {
            physics.init_context(&mut template);
        }

        let dof_map = DofMap::build(&self.mesh, &self.registry)?;
        log::debug!(
            "initialized {} physics with {} variables and {} dofs",
            self.physics.len(),
            self.registry.len(),
            dof_map.n_dofs()
        );

        self.setup = Some(Setup { template, dof_map });
        Ok(())
    }

    /// Assembles the global residual (and Jacobian) at state `(u, u̇)`.
    ///
    /// Elements and boundary sides are assembled in parallel, each into its
    /// own context; contributions are summed into the global system afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first [`AssemblyError`] reported by any element or side.
    /// The caller should treat the evaluation as failed.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init`](Self::init) or if `u` or `u_dot` do
    /// not have [`n_dofs`](Self::n_dofs) entries.
    pub fn assemble(
        &self,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        options: &AssemblyOptions,
    ) -> Result<Assembled, AssemblyError> {
        let setup = self.setup();
        let n = setup.dof_map.n_dofs();
        assert_eq!(u.len(), n, "solution has the wrong length");
        assert_eq!(u_dot.len(), n, "solution rate has the wrong length");

        let visits: Vec<Visit> = (0..self.mesh.elements().len())
            .map(Visit::Element)
            .chain(self.mesh.boundary_sides().iter().copied().map(Visit::Side))
            .collect();

        let contributions = visits
            .into_par_iter()
            .map_init(
                || setup.template.clone(),
                |context, visit| self.assemble_visit(context, visit, u, u_dot, options),
            )
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| log::warn!("assembly rejected: {err}"))?;

        let mut residual = DVector::<f64>::zeros(n);
        let mut jacobian = options
            .request_jacobian
            .then(|| DMatrix::<f64>::zeros(n, n));

        for local in &contributions {
            for (a, &i) in local.dofs.iter().enumerate() {
                residual[i] += local.residual[a];
            }
            if let (Some(global), Some(block)) = (jacobian.as_mut(), local.jacobian.as_ref()) {
                for (a, &i) in local.dofs.iter().enumerate() {
                    for (b, &j) in local.dofs.iter().enumerate() {
                        global[(i, j)] += block[(a, b)];
                    }
                }
            }
        }

        log::debug!(
            "assembled {} elements and {} sides, |R|∞ = {:e}",
            self.mesh.elements().len(),
            self.mesh.boundary_sides().len(),
            residual.amax()
        );
        Ok(Assembled { residual, jacobian })
    }

    /// Returns a context positioned on `element` at state `(u, u̇)`.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if finite-element data cannot be evaluated.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init`](Self::init).
    pub fn element_context(
        &self,
        element: usize,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        rate_derivative: f64,
    ) -> Result<AssemblyContext, AssemblyError> {
        let setup = self.setup();
        let mut context = setup.template.clone();
        context.reinit_element(
            &self.mesh,
            &setup.dof_map,
            element,
            u,
            u_dot,
            rate_derivative,
        )?;
        Ok(context)
    }

    /// Returns a context positioned on the `index`-th boundary side.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if finite-element data cannot be evaluated.
    ///
    /// # Panics
    ///
    /// Panics if called before [`init`](Self::init).
    pub fn side_context(
        &self,
        index: usize,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        rate_derivative: f64,
    ) -> Result<AssemblyContext, AssemblyError> {
        let setup = self.setup();
        let mut context = setup.template.clone();
        context.reinit_side(
            &self.mesh,
            &setup.dof_map,
            self.mesh.boundary_sides()[index],
            u,
            u_dot,
            rate_derivative,
        )?;
        Ok(context)
    }

    /// Collects handles to every module parameter named `name`.
    ///
    /// The returned handles borrow the system mutably, so no assembly can run
    /// while they are alive.
    pub fn parameter(&mut self, name: &str) -> ParameterHandles<'_> {
        let mut handles = ParameterHandles::new();
        for physics in &mut self.physics {
            physics.register_parameter(name, &mut handles);
        }
        handles
    }

    #[must_use]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    #[must_use]
    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn physics(&self) -> impl Iterator<Item = &dyn Physics> {
        self.physics.iter().map(|physics| &**physics)
    }

    /// # Panics
    ///
    /// Panics if called before [`init`](Self::init).
    #[must_use]
    pub fn dof_map(&self) -> &DofMap {
        &self.setup().dof_map
    }

    /// # Panics
    ///
    /// Panics if called before [`init`](Self::init).
    #[must_use]
    pub fn n_dofs(&self) -> usize {
        self.setup().dof_map.n_dofs()
    }

    fn setup(&self) -> &Setup {
        self.setup
            .as_ref()
            .unwrap_or_else(|| panic!("assembly system used before init"))
    }

    fn assemble_visit(
        &self,
        context: &mut AssemblyContext,
        visit: Visit,
        u: &DVector<f64>,
        u_dot: &DVector<f64>,
        options: &AssemblyOptions,
    ) -> Result<LocalContribution, AssemblyError> {
        let setup = self.setup();
        let rate_derivative = options.rate_derivative;

        let callbacks: &[Callback] = match visit {
            Visit::Element(element) => {
                context.reinit_element(
                    &self.mesh,
                    &setup.dof_map,
                    element,
                    u,
                    u_dot,
                    rate_derivative,
                )?;
                if options.include_mass {
                    &[
                        Callback::ElementTimeDerivative,
                        Callback::ElementConstraint,
                        Callback::MassResidual,
                    ]
                } else {
                    &[Callback::ElementTimeDerivative, Callback::ElementConstraint]
                }
            }
            Visit::Side(side) => {
                context.reinit_side(
                    &self.mesh,
                    &setup.dof_map,
                    side,
                    u,
                    u_dot,
                    rate_derivative,
                )?;
                &[Callback::SideTimeDerivative, Callback::SideConstraint]
            }
        };

        for physics in &self.physics {
            for &callback in callbacks {
                let status = callback.invoke(&**physics, options.request_jacobian, context)?;
                if options.request_jacobian && !status.is_computed() {
                    log::trace!(
                        "`{}` declined a {callback:?} Jacobian on element {}, differencing",
                        physics.name(),
                        context.state().element()
                    );
                    let jacobian =
                        central_difference(&**physics, callback, context, options.fd_step)?;
                    context.local_mut().add_flat_jacobian(&jacobian);
                }
            }
        }

        let state = context.state();
        let dofs = (0..self.registry.len())
            .flat_map(|var| state.dof_indices(VariableIndex::new(var)).iter().copied())
            .collect();

        Ok(LocalContribution {
            dofs,
            residual: context.local().flat_residual(),
            jacobian: options
                .request_jacobian
                .then(|| context.local().flat_jacobian()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::{
        physics::{AxisymmetricMagnetostatics, HeatConduction},
        support::config::InputConfig,
        test_support::{initialized, sheared_triangle},
    };

    fn conduction(order: &str) -> Box<dyn Physics> {
        let config = InputConfig::new()
            .with("Physics/HeatConduction/T_order", order)
            .with("Physics/HeatConduction/conductivity_model", "linear")
            .with("Physics/HeatConduction/k", 2.0)
            .with("Physics/HeatConduction/k_slope", 0.1)
            .with("Physics/HeatConduction/rho", 3.0);
        Box::new(HeatConduction::from_config(&config).unwrap())
    }

    fn magnetostatics() -> Box<dyn Physics> {
        let config = InputConfig::new()
            .with("Physics/AxisymmetricMagnetostatics/mu", 0.5)
            .with("Physics/AxisymmetricMagnetostatics/source_current", 2.0)
            .with("Physics/AxisymmetricMagnetostatics/A_flux_boundaries", vec![1.0])
            .with("Physics/AxisymmetricMagnetostatics/A_flux_values", vec![0.7])
            .with("Physics/AxisymmetricMagnetostatics/V_flux_boundaries", vec![0.0])
            .with("Physics/AxisymmetricMagnetostatics/V_flux_values", vec![-1.2]);
        Box::new(AxisymmetricMagnetostatics::from_config(&config).unwrap())
    }

    fn ramp(n: usize) -> DVector<f64> {
        DVector::from_fn(n, |i, _| 0.5 + 0.3 * i as f64 - 0.05 * (i * i) as f64)
    }

    fn assert_vectors_eq(actual: &DVector<f64>, expected: &DVector<f64>) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert_relative_eq!(*a, *e, epsilon = 1e-12, max_relative = 1e-12);
        }
    }

    #[test]
    fn independent_physics_assemble_additively() {
        let together = initialized(
            sheared_triangle(1.0),
            vec![conduction("FIRST"), magnetostatics()],
        );
        let heat = initialized(sheared_triangle(1.0), vec![conduction("FIRST")]);
        let magnetic = initialized(sheared_triangle(1.0), vec![magnetostatics()]);

        // T takes dofs 0..3 in both layouts; A and V follow it when combined.
        let u = ramp(9);
        let u_dot = ramp(9).map(|x| -x);
        let options = AssemblyOptions::transient(2.0);

        let all = together.assemble(&u, &u_dot, &options).unwrap();
        let t = heat
            .assemble(&u.rows(0, 3).clone_owned(), &u_dot.rows(0, 3).clone_owned(), &options)
            .unwrap();
        let av = magnetic
            .assemble(&u.rows(3, 6).clone_owned(), &u_dot.rows(3, 6).clone_owned(), &options)
            .unwrap();

        let mut expected = DVector::<f64>::zeros(9);
        expected.rows_mut(0, 3).copy_from(&t.residual);
        expected.rows_mut(3, 6).copy_from(&av.residual);
        assert_vectors_eq(&all.residual, &expected);

        let mut expected = DMatrix::<f64>::zeros(9, 9);
        expected
            .view_mut((0, 0), (3, 3))
            .copy_from(t.jacobian.as_ref().unwrap());
        expected
            .view_mut((3, 3), (6, 6))
            .copy_from(av.jacobian.as_ref().unwrap());
        let jacobian = all.jacobian.unwrap();
        for i in 0..9 {
            for j in 0..9 {
                assert_relative_eq!(jacobian[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn parallel_assembly_equals_sequential_sums() {
        let system = initialized(
            Mesh::line(6, 1.0, 3.0),
            vec![conduction("SECOND"), magnetostatics()],
        );
        let n = system.n_dofs();
        let n_vars = system.registry().len();
        let u = ramp(n).map(|x| 0.1 * x);
        let u_dot = ramp(n);
        let options = AssemblyOptions::transient(3.0);

        let mut residual = DVector::<f64>::zeros(n);
        let mut jacobian = DMatrix::<f64>::zeros(n, n);
        let mut scatter = |context: &AssemblyContext| {
            let state = context.state();
            let dofs: Vec<usize> = (0..n_vars)
                .flat_map(|var| state.dof_indices(VariableIndex::new(var)).to_vec())
                .collect();
            let local_residual = context.local().flat_residual();
            let local_jacobian = context.local().flat_jacobian();
            for (a, &i) in dofs.iter().enumerate() {
                residual[i] += local_residual[a];
                for (b, &j) in dofs.iter().enumerate() {
                    jacobian[(i, j)] += local_jacobian[(a, b)];
                }
            }
        };

        for element in 0..system.mesh().elements().len() {
            let mut context = system.element_context(element, &u, &u_dot, 3.0).unwrap();
            for physics in system.physics() {
                physics.element_time_derivative(true, &mut context).unwrap();
                physics.element_constraint(true, &mut context).unwrap();
                physics.mass_residual(true, &mut context).unwrap();
            }
            scatter(&context);
        }
        for side in 0..system.mesh().boundary_sides().len() {
            let mut context = system.side_context(side, &u, &u_dot, 3.0).unwrap();
            for physics in system.physics() {
                physics.side_time_derivative(true, &mut context).unwrap();
                physics.side_constraint(true, &mut context).unwrap();
            }
            scatter(&context);
        }

        let assembled = system.assemble(&u, &u_dot, &options).unwrap();
        assert_vectors_eq(&assembled.residual, &residual);
        let assembled_jacobian = assembled.jacobian.unwrap();
        for i in 0..n {
            for j in 0..n {
                assert_relative_eq!(assembled_jacobian[(i, j)], jacobian[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn residual_only_skips_the_jacobian() {
        let system = initialized(Mesh::line(3, 1.0, 2.0), vec![conduction("FIRST")]);
        let u = ramp(4);
        let assembled = system
            .assemble(&u, &u, &AssemblyOptions::steady().residual_only())
            .unwrap();

        assert!(assembled.jacobian.is_none());
        assert_eq!(assembled.residual.len(), 4);
    }

    #[test]
    fn duplicate_variables_fail_init() {
        let mut system = AssemblySystem::new(Mesh::line(2, 0.0, 1.0));
        system.add_physics(conduction("FIRST"));
        system.add_physics(conduction("FIRST"));

        assert_eq!(
            system.init(),
            Err(ConfigError::DuplicateVariable { name: "T".into() })
        );
    }

    #[test]
    fn unsupported_discretization_fails_init() {
        let mut system = AssemblySystem::new(sheared_triangle(0.0));
        system.add_physics(conduction("SECOND"));

        assert!(matches!(system.init(), Err(ConfigError::Discretization(_))));
    }

    #[test]
    #[should_panic(expected = "used before init")]
    fn assembling_before_init_panics() {
        let system = AssemblySystem::new(Mesh::line(2, 0.0, 1.0));
        let u = DVector::zeros(3);
        let _ = system.assemble(&u, &u, &AssemblyOptions::steady());
    }

    #[test]
    #[should_panic(expected = "added after init")]
    fn adding_physics_after_init_panics() {
        let mut system = initialized(Mesh::line(2, 0.0, 1.0), vec![conduction("FIRST")]);
        system.add_physics(magnetostatics());
    }
}
