//! Lagrange shape functions on reference elements.
//!
//! Edge nodes are ordered `[ξ = -1, ξ = +1, midpoint]`; triangle nodes follow
//! the vertex order of the unit right triangle.

use nalgebra::{Matrix3, Vector3};

use crate::support::{fe::FeOrder, mesh::ElementKind};

/// Shape function values and reference derivatives at one point.
pub(super) struct Shapes {
    pub(super) values: Vec<f64>,
    pub(super) gradients: Vec<Vector3<f64>>,
    pub(super) hessians: Vec<Matrix3<f64>>,
}

impl Shapes {
    /// The single unit basis function of a `SCALAR` variable.
    pub(super) fn unit() -> Self {
        Self {
            values: vec![1.0],
            gradients: vec![Vector3::zeros()],
            hessians: vec![Matrix3::zeros()],
        }
    }
}

/// Evaluates the Lagrange basis at a reference point.
///
/// Callers validate the discretization first; unsupported combinations fall
/// back to the first-order basis of the shape.
pub(super) fn evaluate(kind: ElementKind, order: FeOrder, reference: [f64; 2]) -> Shapes {
    let [xi, eta] = reference;
    match (kind, order) {
        (ElementKind::Edge2, FeOrder::Second) => Shapes {
            values: vec![
                0.5 * xi * (xi - 1.0),
                0.5 * xi * (xi + 1.0),
                1.0 - xi * xi,
            ],
            gradients: vec![
                Vector3::new(xi - 0.5, 0.0, 0.0),
                Vector3::new(xi + 0.5, 0.0, 0.0),
                Vector3::new(-2.0 * xi, 0.0, 0.0),
            ],
            hessians: [1.0, 1.0, -2.0]
                .into_iter()
                .map(|d2| {
                    let mut hessian = Matrix3::zeros();
                    hessian[(0, 0)] = d2;
                    hessian
                })
                .collect(),
        },
        (ElementKind::Edge2, FeOrder::First) => Shapes {
            values: vec![0.5 * (1.0 - xi), 0.5 * (1.0 + xi)],
            gradients: vec![Vector3::new(-0.5, 0.0, 0.0), Vector3::new(0.5, 0.0, 0.0)],
            hessians: vec![Matrix3::zeros(); 2],
        },
        (ElementKind::Tri3, _) => Shapes {
            values: vec![1.0 - xi - eta, xi, eta],
            gradients: vec![
                Vector3::new(-1.0, -1.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
            ],
            hessians: vec![Matrix3::zeros(); 3],
        },
    }
}
