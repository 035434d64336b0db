use nalgebra::{DMatrix, DVector};
use twine_core::Model;

use crate::physics::{JacobianStatus, Physics};

use super::{AssemblyContext, AssemblyError};

/// One of the assembly callbacks of [`Physics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    ElementTimeDerivative,
    ElementConstraint,
    MassResidual,
    SideTimeDerivative,
    SideConstraint,
}

impl Callback {
    /// Calls this callback on `physics`.
    ///
    /// # Errors
    ///
    /// Propagates the callback's [`AssemblyError`].
    pub fn invoke(
        self,
        physics: &dyn Physics,
        request_jacobian: bool,
        context: &mut AssemblyContext,
    ) -> Result<JacobianStatus, AssemblyError> {
        match self {
            Self::ElementTimeDerivative => physics.element_time_derivative(request_jacobian, context),
            Self::ElementConstraint => physics.element_constraint(request_jacobian, context),
            Self::MassResidual => physics.mass_residual(request_jacobian, context),
            Self::SideTimeDerivative => physics.side_time_derivative(request_jacobian, context),
            Self::SideConstraint => physics.side_constraint(request_jacobian, context),
        }
    }

    /// True if the callback reads `u̇`, which moves with `u` by `∂u̇/∂u`.
    #[must_use]
    pub fn perturbs_rate(self) -> bool {
        self == Self::MassResidual
    }
}

/// A shift of one local coefficient, addressed in variable-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Perturbation {
    dof: usize,
    delta: f64,
}

/// Model adapter exposing one callback's local residual as a function of
/// the local coefficients.
///
/// Every call works on a fresh copy of the base context with an empty cache,
/// so derived quantities are recomputed for the perturbed state.
struct LocalResidualModel<'a> {
    physics: &'a dyn Physics,
    callback: Callback,
    base: &'a AssemblyContext,
}

impl Model for LocalResidualModel<'_> {
    type Input = Perturbation;
    type Output = DVector<f64>;
    type Error = AssemblyError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let mut context = self.base.clone();

        let rate_shift = if self.callback.perturbs_rate() {
            input.delta * context.state().solution_rate_derivative()
        } else {
            0.0
        };
        context.state_mut().perturb(input.dof, input.delta, rate_shift);
        context.cache_mut().clear();
        context.local_mut().zero();

        self.callback.invoke(self.physics, false, &mut context)?;
        Ok(context.local().flat_residual())
    }
}

/// Central-difference Jacobian of one callback's local residual.
///
/// Each coefficient `u_j` is perturbed by `±step·max(1, |u_j|)`. The result is
/// a dense matrix in the variable-major local ordering of
/// [`LocalSystem::flat_jacobian`](super::LocalSystem::flat_jacobian).
///
/// # Errors
///
/// Returns the callback's [`AssemblyError`] if a perturbed state cannot be
/// evaluated.
pub fn central_difference(
    physics: &dyn Physics,
    callback: Callback,
    context: &AssemblyContext,
    step: f64,
) -> Result<DMatrix<f64>, AssemblyError> {
    let model = LocalResidualModel {
        physics,
        callback,
        base: context,
    };

    let n = context.state().total_dofs();
    let mut jacobian = DMatrix::zeros(n, n);

    for dof in 0..n {
        let h = step * context.state().flat_coefficient(dof).abs().max(1.0);
        let plus = model.call(&Perturbation { dof, delta: h })?;
        let minus = model.call(&Perturbation { dof, delta: -h })?;
        jacobian.set_column(dof, &((plus - minus) / (2.0 * h)));
    }

    Ok(jacobian)
}
