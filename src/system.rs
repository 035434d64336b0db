//! Variable registration, per-element assembly state, and the assembly driver.
//!
//! The [`AssemblySystem`] owns the mesh, the [`VariableRegistry`], and the
//! active physics modules. For each element (and each boundary side) it builds
//! an [`AssemblyContext`], asks every module for its contributions in
//! composition order, and adds the results into the global residual and
//! Jacobian.

mod assembly;
mod cache;
mod context;
mod dof_map;
mod error;
mod numerical_jacobian;
mod variable;

pub use assembly::{Assembled, AssemblyOptions, AssemblySystem};
pub use cache::{CachedQuantity, CachedValues};
pub use context::{AssemblyContext, AssemblyParts, ElementState, LocalSystem, SideInfo};
pub use dof_map::DofMap;
pub use error::AssemblyError;
pub use numerical_jacobian::{Callback, central_difference};
pub use variable::{Variable, VariableIndex, VariableRegistry};
