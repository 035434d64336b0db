//! Shared fixtures for unit tests.

use approx::assert_relative_eq;
use nalgebra::{DVector, Point3};

use crate::{
    physics::Physics,
    support::mesh::{BoundarySide, Element, ElementKind, Mesh},
    system::{AssemblyOptions, AssemblySystem},
};

/// One triangle mapped from the unit right triangle by `x = A·ξ + (x0, 0)`
/// with `A = [[2, 1], [0, 3]]`, area 3.
///
/// Side `s` runs from vertex `s` to vertex `s + 1` and carries boundary id `s`.
pub(crate) fn sheared_triangle(x0: f64) -> Mesh {
    Mesh::new(
        2,
        vec![
            Point3::new(x0, 0.0, 0.0),
            Point3::new(x0 + 2.0, 0.0, 0.0),
            Point3::new(x0 + 1.0, 3.0, 0.0),
        ],
        vec![Element {
            kind: ElementKind::Tri3,
            nodes: vec![0, 1, 2],
        }],
        (0..3)
            .map(|side| BoundarySide {
                element: 0,
                side,
                boundary_id: side as u16,
            })
            .collect(),
    )
}

/// Builds and initializes a system with `physics` on `mesh`.
pub(crate) fn initialized(mesh: Mesh, physics: Vec<Box<dyn Physics>>) -> AssemblySystem {
    let mut system = AssemblySystem::new(mesh);
    for module in physics {
        system.add_physics(module);
    }
    system.init().unwrap();
    system
}

/// Checks the assembled Jacobian against central differences of the
/// assembled residual, perturbing `u̇` consistently with `∂u̇/∂u`.
pub(crate) fn assert_jacobian_matches_differences(
    system: &AssemblySystem,
    u: &DVector<f64>,
    u_dot: &DVector<f64>,
    options: &AssemblyOptions,
) {
    let analytic = system
        .assemble(u, u_dot, options)
        .unwrap()
        .jacobian
        .unwrap();
    let scale = analytic.amax().max(1.0);
    let residual_only = options.residual_only();

    for j in 0..u.len() {
        let h = 1e-6 * u[j].abs().max(1.0);
        let residual_at = |delta: f64| {
            let mut u = u.clone();
            let mut u_dot = u_dot.clone();
            u[j] += delta;
            u_dot[j] += options.rate_derivative * delta;
            system.assemble(&u, &u_dot, &residual_only).unwrap().residual
        };
        let column = (residual_at(h) - residual_at(-h)) / (2.0 * h);

        for i in 0..u.len() {
            assert_relative_eq!(
                analytic[(i, j)],
                column[i],
                epsilon = 1e-6 * scale,
                max_relative = 1e-6
            );
        }
    }
}
