//! Physics modules and the contract they implement.
//!
//! A physics module owns the variables of one governing equation (or coupled
//! set), reads its options from an [`InputConfig`], and contributes residual
//! and Jacobian terms for every element and boundary side it is handed.
//! Contributions from all active modules are summed, so modules never need to
//! know about each other beyond the variable names and cached quantities they
//! share.
//!
//! [`InputConfig`]: crate::support::config::InputConfig

mod axisym_magnetostatics;
mod heat_conduction;
mod heat_transfer;
mod laminar_flame;
mod names;
mod parameter;

pub use axisym_magnetostatics::{AxisymmetricMagnetostatics, MagnetostaticsOptions};
pub use heat_conduction::{
    Conductivity, ConductivityModel, ConstantConductivity, HeatConduction,
    HeatConductionOptions, LinearConductivity,
};
pub use heat_transfer::{HeatTransfer, HeatTransferOptions};
pub use laminar_flame::{
    ConductivityPolicy, ConstantTransportMixture, FlameOptions, Laminar1DFlame, MixtureState,
    OneStepReaction, PropagatingFlame, TransportMixture,
};
pub use names::{ENABLED_PHYSICS_KEY, PhysicsName, build_enabled};
pub use parameter::ParameterHandles;

use crate::{
    support::config::ConfigError,
    system::{AssemblyContext, AssemblyError, VariableRegistry},
};

/// Whether a callback supplied the Jacobian of its contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianStatus {
    Computed,
    /// The caller should difference the callback's residual instead.
    NotComputed,
}

impl JacobianStatus {
    /// `Computed` when a Jacobian was requested, for callbacks whose
    /// analytic Jacobian is always exact.
    #[must_use]
    pub fn exact(request_jacobian: bool) -> Self {
        if request_jacobian {
            Self::Computed
        } else {
            Self::NotComputed
        }
    }

    #[must_use]
    pub fn is_computed(self) -> bool {
        self == Self::Computed
    }
}

/// The contract every physics module implements.
///
/// Setup runs once, in order: [`init_variables`], [`set_time_evolving_vars`],
/// [`init_context`]. After that the assembly callbacks may be invoked any
/// number of times, concurrently on different elements, so implementations
/// hold no mutable state of their own.
///
/// Every assembly callback adds into the context's local residual (and, when
/// `request_jacobian` is set, Jacobian) blocks and never overwrites them.
/// Callbacks return [`JacobianStatus::NotComputed`] to decline supplying a
/// requested Jacobian, and an [`AssemblyError`] when the local state cannot be
/// evaluated. The defaults contribute nothing.
///
/// [`init_variables`]: Physics::init_variables
/// [`set_time_evolving_vars`]: Physics::set_time_evolving_vars
/// [`init_context`]: Physics::init_context
pub trait Physics: Send + Sync {
    /// Registry key of this module.
    fn name(&self) -> &str;

    /// Registers this module's variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a name is already taken.
    fn init_variables(&mut self, registry: &mut VariableRegistry) -> Result<(), ConfigError>;

    /// Marks the variables that carry a time derivative.
    fn set_time_evolving_vars(&self, _registry: &mut VariableRegistry) {}

    /// Requests the finite-element data this module reads during assembly.
    fn init_context(&self, _context: &mut AssemblyContext) {}

    /// Element-interior spatial operator `F(u)`.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the local state is non-physical.
    fn element_time_derivative(
        &self,
        request_jacobian: bool,
        _context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Ok(JacobianStatus::exact(request_jacobian))
    }

    /// Boundary-side terms of the spatial operator, such as natural fluxes.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the local state is non-physical.
    fn side_time_derivative(
        &self,
        request_jacobian: bool,
        _context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Ok(JacobianStatus::exact(request_jacobian))
    }

    /// Element-interior algebraic constraints.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the local state is non-physical.
    fn element_constraint(
        &self,
        request_jacobian: bool,
        _context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Ok(JacobianStatus::exact(request_jacobian))
    }

    /// Boundary-side algebraic constraints.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the local state is non-physical.
    fn side_constraint(
        &self,
        request_jacobian: bool,
        _context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Ok(JacobianStatus::exact(request_jacobian))
    }

    /// Mass term `M(u)·u̇`.
    ///
    /// Jacobian entries are taken with respect to `u`, including the
    /// `∂u̇/∂u` factor reported by the context.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] if the local state is non-physical.
    fn mass_residual(
        &self,
        request_jacobian: bool,
        _context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        Ok(JacobianStatus::exact(request_jacobian))
    }

    /// Adds handles to any internal scalar registered under `name`.
    fn register_parameter<'a>(&'a mut self, _name: &str, _handles: &mut ParameterHandles<'a>) {}
}
