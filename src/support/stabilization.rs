//! Element metrics for SUPG/PSPG-style stabilized formulations.
//!
//! Stabilized formulations scale their added terms by a parameter `τ` that
//! depends on the local velocity, the diffusivity, and the element size. The
//! element size enters through two metrics built from the inverse mapping
//! Jacobian `M`, with `M[k][i] = ∂ξ_k/∂x_i`:
//!
//! - `g_i = Σ_k M[k][i]`, the contravariant metric contracted with the unit
//!   reference directions,
//! - `G = Mᵀ·M`, the rank-2 contravariant metric tensor.
//!
//! Everything here is a pure function of finite-element data, so it can be
//! shared freely across modules and concurrently assembled elements.

use nalgebra::{Matrix3, Vector3};

use crate::support::fe::FeData;

/// Computes `g` at quadrature point `qp`.
///
/// # Panics
///
/// Panics if the inverse map was not requested for `fe`.
#[must_use]
pub fn compute_g(fe: &FeData, qp: usize) -> Vector3<f64> {
    let inverse = &fe.inverse_map()[qp];
    Vector3::from_fn(|i, _| inverse.column(i).sum())
}

/// Computes the metric tensor `G` at quadrature point `qp`.
///
/// # Panics
///
/// Panics if the inverse map was not requested for `fe`.
#[must_use]
pub fn compute_g_tensor(fe: &FeData, qp: usize) -> Matrix3<f64> {
    let inverse = &fe.inverse_map()[qp];
    inverse.transpose() * inverse
}

/// Computes the steady advection-diffusion stabilization parameter
///
/// `τ = (U·G·U + c·κ²·(G:G))^(-1/2)`
///
/// where `κ` is the diffusivity (units of m²/s) and `c` the inverse-estimate
/// constant. Returns zero when neither advection nor diffusion is present.
#[must_use]
pub fn compute_tau(
    c: f64,
    diffusivity: f64,
    g_tensor: &Matrix3<f64>,
    velocity: &Vector3<f64>,
) -> f64 {
    let advective = velocity.dot(&(g_tensor * velocity));
    let diffusive = c * diffusivity * diffusivity * g_tensor.component_mul(g_tensor).sum();
    let denominator = advective + diffusive;

    if denominator > 0.0 {
        denominator.sqrt().recip()
    } else {
        0.0
    }
}
