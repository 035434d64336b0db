//! # Twine Multiphysics
//!
//! Composable finite-element physics for coupled nonlinear systems.
//!
//! Independently developed physics modules contribute residual vectors and
//! Jacobian matrices to one shared system. Modules share degrees of freedom,
//! quadrature data, and per-element cached quantities, and support both steady
//! and transient (mass-matrix) formulations with exact or finite-difference
//! Jacobians.
//!
//! ## Crate layout
//!
//! - [`physics`]: The [`physics::Physics`] contract and concrete modules.
//! - [`system`]: Variable registration, per-element assembly context, cached
//!   quantities, and the assembly driver that invokes every module.
//! - [`support`]: Supporting utilities (constraints, configuration,
//!   stabilization metrics, reference finite elements, mesh container).
//!
//! ## Sign convention
//!
//! Every module contributes to `R(u, u̇) = M(u)·u̇ + F(u)`, whose root is the
//! discrete solution. Mass residuals accumulate `M(u)·u̇` and time-derivative
//! callbacks accumulate the spatial operator `F(u)` moved to the left-hand side.
//!
//! ## Example
//!
//! ```
//! use nalgebra::DVector;
//! use twine_multiphysics::{
//!     physics::HeatConduction,
//!     support::{config::InputConfig, mesh::Mesh},
//!     system::{AssemblyOptions, AssemblySystem},
//! };
//!
//! let config = InputConfig::new()
//!     .with("Physics/HeatConduction/k", 2.0)
//!     .with("Physics/HeatConduction/T_order", "FIRST");
//!
//! let mut system = AssemblySystem::new(Mesh::line(4, 0.0, 1.0));
//! system.add_physics(Box::new(HeatConduction::from_config(&config).unwrap()));
//! system.init().unwrap();
//!
//! let u = DVector::from_element(system.n_dofs(), 300.0);
//! let u_dot = DVector::zeros(system.n_dofs());
//! let result = system.assemble(&u, &u_dot, &AssemblyOptions::steady()).unwrap();
//!
//! // A uniform temperature field carries no conductive flux.
//! assert!(result.residual.amax() < 1e-9);
//! ```

pub mod physics;
pub mod support;
pub mod system;

#[cfg(test)]
mod test_support;
