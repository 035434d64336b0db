use crate::support::{
    config::ConfigError,
    fe::{self, FeFamily, FeOrder},
    mesh::Mesh,
};

use super::{VariableIndex, VariableRegistry};

/// Global degree-of-freedom numbering.
///
/// Each variable owns a contiguous block of the global vector, in registration
/// order. Within a block, nodal dofs follow vertex numbering; second-order
/// edge midpoint dofs come after all vertex dofs, one per element; a `SCALAR`
/// variable owns exactly one dof shared by every element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofMap {
    offsets: Vec<usize>,
    n_dofs: usize,
    /// Indexed `[element][variable]`.
    element_dofs: Vec<Vec<Vec<usize>>>,
}

impl DofMap {
    /// Numbers the dofs of every registered variable on `mesh`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Discretization`] if a variable's discretization
    /// is not available on some element of the mesh.
    pub fn build(mesh: &Mesh, registry: &VariableRegistry) -> Result<Self, ConfigError> {
        let n_points = mesh.points().len();
        let n_elements = mesh.elements().len();

        let mut offsets = Vec::with_capacity(registry.len());
        let mut element_dofs = vec![Vec::with_capacity(registry.len()); n_elements];
        let mut next = 0;

        for variable in registry.iter() {
            let (family, order) = (variable.family(), variable.order());
            let offset = next;
            offsets.push(offset);

            for (id, element) in mesh.elements().iter().enumerate() {
                fe::n_dofs(element.kind, family, order)?;

                let dofs = match (family, order) {
                    (FeFamily::Scalar, _) => vec![offset],
                    (FeFamily::Lagrange, FeOrder::First) => {
                        element.nodes.iter().map(|&n| offset + n).collect()
                    }
                    (FeFamily::Lagrange, FeOrder::Second) => {
                        let mut dofs: Vec<usize> =
                            element.nodes.iter().map(|&n| offset + n).collect();
                        dofs.push(offset + n_points + id);
                        dofs
                    }
                };
                element_dofs[id].push(dofs);
            }

            next += match (family, order) {
                (FeFamily::Scalar, _) => 1,
                (FeFamily::Lagrange, FeOrder::First) => n_points,
                (FeFamily::Lagrange, FeOrder::Second) => n_points + n_elements,
            };

            log::debug!(
                "variable `{}` owns dofs {offset}..{next}",
                variable.name()
            );
        }

        Ok(Self {
            offsets,
            n_dofs: next,
            element_dofs,
        })
    }

    /// Total number of global dofs.
    #[must_use]
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    /// First global dof of `var`.
    #[must_use]
    pub fn offset(&self, var: VariableIndex) -> usize {
        self.offsets[var.get()]
    }

    /// Global dofs of `var` on `element`, in local shape function order.
    #[must_use]
    pub fn element_dofs(&self, element: usize, var: VariableIndex) -> &[usize] {
        &self.element_dofs[element][var.get()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::Point3;

    use crate::support::{
        fe::FeError,
        mesh::{Element, ElementKind},
    };

    #[test]
    fn blocks_follow_registration_order() {
        let mesh = Mesh::line(3, 0.0, 1.0);
        let mut registry = VariableRegistry::new(1);
        let y = registry
            .add_variable("Y", FeOrder::Second, FeFamily::Lagrange)
            .unwrap();
        let t = registry
            .add_variable("T", FeOrder::First, FeFamily::Lagrange)
            .unwrap();
        let m = registry
            .add_variable("Mdot", FeOrder::First, FeFamily::Scalar)
            .unwrap();

        let dof_map = DofMap::build(&mesh, &registry).unwrap();

        // 4 vertices + 3 midpoints, then 4 vertices, then 1 scalar
        assert_eq!(dof_map.n_dofs(), 12);
        assert_eq!(dof_map.offset(t), 7);
        assert_eq!(dof_map.element_dofs(1, y), &[1, 2, 5]);
        assert_eq!(dof_map.element_dofs(2, t), &[9, 10]);
        assert_eq!(dof_map.element_dofs(0, m), &[11]);
        assert_eq!(dof_map.element_dofs(2, m), &[11]);
    }

    #[test]
    fn unsupported_discretization_is_a_config_error() {
        let mesh = Mesh::new(
            2,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Element {
                kind: ElementKind::Tri3,
                nodes: vec![0, 1, 2],
            }],
            vec![],
        );
        let mut registry = VariableRegistry::new(2);
        registry
            .add_variable("T", FeOrder::Second, FeFamily::Lagrange)
            .unwrap();

        assert!(matches!(
            DofMap::build(&mesh, &registry),
            Err(ConfigError::Discretization(FeError::Unsupported { .. }))
        ));
    }
}
