//! Reference finite-element evaluation.
//!
//! Given a variable's family and order and an element's vertices, this module
//! produces the quadrature data an assembly context caches per variable:
//! Jacobian-weighted quadrature weights, shape function values, gradients and
//! Laplacians, physical quadrature point coordinates, the inverse mapping Jacobian used by
//! stabilization metrics, and outward normals on sides.
//!
//! Only the data named in an [`FeRequest`] is computed. Physics modules declare
//! what they need during `init_context`; reading data that was never requested
//! is a programming error and panics.
//!
//! Supported discretizations:
//!
//! | Family     | Order    | Elements       |
//! |------------|----------|----------------|
//! | `LAGRANGE` | `FIRST`  | `Edge2`, `Tri3` |
//! | `LAGRANGE` | `SECOND` | `Edge2`        |
//! | `SCALAR`   | `FIRST`  | any            |

mod lagrange;
mod quadrature;

use std::{fmt, str::FromStr};

use nalgebra::{Matrix3, Point3, Vector3};
use thiserror::Error;

use crate::support::{config::ConfigError, mesh::ElementKind};

/// Finite-element basis family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeFamily {
    /// Continuous nodal basis.
    Lagrange,
    /// A single global degree of freedom with a unit basis function.
    Scalar,
}

impl FromStr for FeFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LAGRANGE" => Ok(Self::Lagrange),
            "SCALAR" => Ok(Self::Scalar),
            _ => Err(ConfigError::UnknownFeFamily {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for FeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lagrange => "LAGRANGE",
            Self::Scalar => "SCALAR",
        })
    }
}

/// Polynomial order of a basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeOrder {
    First,
    Second,
}

impl FromStr for FeOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FIRST" => Ok(Self::First),
            "SECOND" => Ok(Self::Second),
            _ => Err(ConfigError::UnknownFeOrder {
                value: s.to_owned(),
            }),
        }
    }
}

impl fmt::Display for FeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::First => "FIRST",
            Self::Second => "SECOND",
        })
    }
}

/// Errors raised while evaluating finite-element data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeError {
    #[error("{family}/{order} is not available on {kind:?} elements")]
    Unsupported {
        family: FeFamily,
        order: FeOrder,
        kind: ElementKind,
    },

    /// The element mapping is singular (zero length or area).
    #[error("degenerate element mapping: measure = {measure}")]
    Degenerate { measure: f64 },

    #[error("side {side} does not exist on {kind:?} elements")]
    InvalidSide { kind: ElementKind, side: usize },
}

/// Which quadrature data to compute for a variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeRequest {
    pub jxw: bool,
    pub phi: bool,
    pub dphi: bool,
    pub laplacian: bool,
    pub xyz: bool,
    pub inverse_map: bool,
    pub normals: bool,
}

impl FeRequest {
    /// Requests Jacobian-weighted quadrature weights.
    pub fn jxw(&mut self) -> &mut Self {
        self.jxw = true;
        self
    }

    /// Requests shape function values.
    pub fn phi(&mut self) -> &mut Self {
        self.phi = true;
        self
    }

    /// Requests physical shape function gradients.
    pub fn dphi(&mut self) -> &mut Self {
        self.dphi = true;
        self
    }

    /// Requests physical shape function Laplacians.
    pub fn laplacian(&mut self) -> &mut Self {
        self.laplacian = true;
        self
    }

    /// Requests physical quadrature point coordinates.
    pub fn xyz(&mut self) -> &mut Self {
        self.xyz = true;
        self
    }

    /// Requests the inverse mapping Jacobian `∂ξ/∂x`.
    pub fn inverse_map(&mut self) -> &mut Self {
        self.inverse_map = true;
        self
    }

    /// Requests outward unit normals (sides only).
    pub fn normals(&mut self) -> &mut Self {
        self.normals = true;
        self
    }

    /// Returns true if nothing was requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Quadrature data for one variable on one element or side.
///
/// Shape function arrays are indexed `[dof][qp]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeData {
    request: FeRequest,
    n_dofs: usize,
    n_qpoints: usize,
    jxw: Vec<f64>,
    phi: Vec<Vec<f64>>,
    dphi: Vec<Vec<Vector3<f64>>>,
    laplacian: Vec<Vec<f64>>,
    xyz: Vec<Point3<f64>>,
    inverse_map: Vec<Matrix3<f64>>,
    normals: Vec<Vector3<f64>>,
}

impl FeData {
    #[must_use]
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    #[must_use]
    pub fn n_qpoints(&self) -> usize {
        self.n_qpoints
    }

    /// Jacobian-weighted quadrature weights.
    ///
    /// # Panics
    ///
    /// Panics if `JxW` was not requested.
    #[must_use]
    pub fn jxw(&self) -> &[f64] {
        self.requested(&self.jxw, self.request.jxw, "JxW")
    }

    /// Shape function values, `phi()[i][qp]`.
    ///
    /// # Panics
    ///
    /// Panics if shape function values were not requested.
    #[must_use]
    pub fn phi(&self) -> &[Vec<f64>] {
        self.requested(&self.phi, self.request.phi, "phi")
    }

    /// Physical shape function gradients, `dphi()[i][qp]`.
    ///
    /// # Panics
    ///
    /// Panics if gradients were not requested.
    #[must_use]
    pub fn dphi(&self) -> &[Vec<Vector3<f64>>] {
        self.requested(&self.dphi, self.request.dphi, "dphi")
    }

    /// Physical shape function Laplacians, `laplacian()[i][qp]`.
    ///
    /// Identically zero on first-order bases.
    ///
    /// # Panics
    ///
    /// Panics if Laplacians were not requested.
    #[must_use]
    pub fn laplacian(&self) -> &[Vec<f64>] {
        self.requested(&self.laplacian, self.request.laplacian, "laplacian")
    }

    /// Physical quadrature point coordinates.
    ///
    /// # Panics
    ///
    /// Panics if coordinates were not requested.
    #[must_use]
    pub fn xyz(&self) -> &[Point3<f64>] {
        self.requested(&self.xyz, self.request.xyz, "xyz")
    }

    /// Inverse mapping Jacobian per quadrature point.
    ///
    /// Entry `(k, i)` is `∂ξ_k/∂x_i`. Rows beyond the element's reference
    /// dimension are zero.
    ///
    /// # Panics
    ///
    /// Panics if the inverse map was not requested.
    #[must_use]
    pub fn inverse_map(&self) -> &[Matrix3<f64>] {
        self.requested(&self.inverse_map, self.request.inverse_map, "inverse map")
    }

    /// Outward unit normals at side quadrature points.
    ///
    /// # Panics
    ///
    /// Panics if normals were not requested.
    #[must_use]
    pub fn normals(&self) -> &[Vector3<f64>] {
        self.requested(&self.normals, self.request.normals, "normals")
    }

    fn requested<'a, T>(&self, data: &'a [T], flag: bool, what: &str) -> &'a [T] {
        assert!(flag, "{what} was not requested during init_context");
        data
    }
}

/// Returns the number of local degrees of freedom of a discretization.
///
/// # Errors
///
/// Returns [`FeError::Unsupported`] if the discretization is not available.
pub fn n_dofs(kind: ElementKind, family: FeFamily, order: FeOrder) -> Result<usize, FeError> {
    match (family, order, kind) {
        (FeFamily::Scalar, FeOrder::First, _) => Ok(1),
        (FeFamily::Lagrange, FeOrder::First, kind) => Ok(kind.n_vertices()),
        (FeFamily::Lagrange, FeOrder::Second, ElementKind::Edge2) => Ok(3),
        _ => Err(FeError::Unsupported {
            family,
            order,
            kind,
        }),
    }
}

/// Evaluates element-interior quadrature data.
///
/// # Errors
///
/// Returns an [`FeError`] for unsupported discretizations or degenerate geometry.
pub fn element_fe(
    kind: ElementKind,
    family: FeFamily,
    order: FeOrder,
    vertices: &[Point3<f64>],
    request: FeRequest,
) -> Result<FeData, FeError> {
    let n_dofs = n_dofs(kind, family, order)?;
    let map = AffineMap::new(kind, vertices)?;

    let points: Vec<_> = quadrature::element_rule(kind)
        .into_iter()
        .map(|qp| SamplePoint {
            reference: qp.reference,
            jxw: qp.weight * map.measure,
            normal: Vector3::zeros(),
        })
        .collect();

    Ok(evaluate(kind, family, order, n_dofs, &map, &points, request))
}

/// Evaluates quadrature data on side `side` of an element.
///
/// Shape functions are the element's own basis restricted to the side.
///
/// # Errors
///
/// Returns an [`FeError`] for unsupported discretizations, degenerate
/// geometry, or a side index the element does not have.
pub fn side_fe(
    kind: ElementKind,
    family: FeFamily,
    order: FeOrder,
    vertices: &[Point3<f64>],
    side: usize,
    request: FeRequest,
) -> Result<FeData, FeError> {
    if side >= kind.n_sides() {
        return Err(FeError::InvalidSide { kind, side });
    }

    let n_dofs = n_dofs(kind, family, order)?;
    let map = AffineMap::new(kind, vertices)?;

    let points = match kind {
        ElementKind::Edge2 => {
            let tangent = map.jacobian.column(0).normalize();
            let (xi, normal) = if side == 0 {
                (-1.0, -tangent)
            } else {
                (1.0, tangent)
            };
            vec![SamplePoint {
                reference: [xi, 0.0],
                jxw: 1.0,
                normal,
            }]
        }
        ElementKind::Tri3 => {
            const CORNERS: [[f64; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
            let (a, b, c) = (side, (side + 1) % 3, (side + 2) % 3);

            let edge = vertices[b] - vertices[a];
            let length = edge.norm();
            if !(length > 0.0) {
                return Err(FeError::Degenerate { measure: length });
            }
            let tangent = edge / length;
            let mut normal = Vector3::new(tangent.y, -tangent.x, 0.0);
            if normal.dot(&(vertices[c] - vertices[a])) > 0.0 {
                normal = -normal;
            }

            quadrature::line_rule()
                .into_iter()
                .map(|(t, weight)| {
                    let (wa, wb) = (0.5 * (1.0 - t), 0.5 * (1.0 + t));
                    SamplePoint {
                        reference: [
                            wa * CORNERS[a][0] + wb * CORNERS[b][0],
                            wa * CORNERS[a][1] + wb * CORNERS[b][1],
                        ],
                        jxw: weight * 0.5 * length,
                        normal,
                    }
                })
                .collect()
        }
    };

    Ok(evaluate(kind, family, order, n_dofs, &map, &points, request))
}

/// A reference-space sample with its physical weight and normal.
struct SamplePoint {
    reference: [f64; 2],
    jxw: f64,
    normal: Vector3<f64>,
}

fn evaluate(
    kind: ElementKind,
    family: FeFamily,
    order: FeOrder,
    n_dofs: usize,
    map: &AffineMap,
    points: &[SamplePoint],
    request: FeRequest,
) -> FeData {
    let n_qpoints = points.len();
    let mut data = FeData {
        request,
        n_dofs,
        n_qpoints,
        ..FeData::default()
    };

    if request.jxw {
        data.jxw = points.iter().map(|p| p.jxw).collect();
    }
    if request.xyz {
        data.xyz = points.iter().map(|p| map.map(p.reference)).collect();
    }
    if request.inverse_map {
        data.inverse_map = vec![map.inverse; n_qpoints];
    }
    if request.normals {
        data.normals = points.iter().map(|p| p.normal).collect();
    }

    if request.phi || request.dphi || request.laplacian {
        let mut phi = vec![vec![0.0; n_qpoints]; n_dofs];
        let mut dphi = vec![vec![Vector3::zeros(); n_qpoints]; n_dofs];
        let mut laplacian = vec![vec![0.0; n_qpoints]; n_dofs];

        for (qp, point) in points.iter().enumerate() {
            let shapes = match family {
                FeFamily::Scalar => lagrange::Shapes::unit(),
                FeFamily::Lagrange => lagrange::evaluate(kind, order, point.reference),
            };
            for i in 0..n_dofs {
                phi[i][qp] = shapes.values[i];
                dphi[i][qp] = map.inverse.transpose() * shapes.gradients[i];
                laplacian[i][qp] =
                    (map.inverse.transpose() * shapes.hessians[i] * map.inverse).trace();
            }
        }

        if request.phi {
            data.phi = phi;
        }
        if request.dphi {
            data.dphi = dphi;
        }
        if request.laplacian {
            data.laplacian = laplacian;
        }
    }

    data
}

/// Affine map from reference to physical coordinates.
struct AffineMap {
    origin: Point3<f64>,
    /// Columns are `∂x/∂ξ_k`.
    jacobian: Matrix3<f64>,
    /// Rows are `∂ξ_k/∂x`.
    inverse: Matrix3<f64>,
    /// Length (edges) or area scaling (triangles) of the map.
    measure: f64,
}

impl AffineMap {
    fn new(kind: ElementKind, vertices: &[Point3<f64>]) -> Result<Self, FeError> {
        match kind {
            ElementKind::Edge2 => {
                // x(ξ) = center + ξ·t for ξ ∈ [-1, 1]
                let t = 0.5 * (vertices[1] - vertices[0]);
                let length_sq = t.norm_squared();
                if !(length_sq > 0.0) || !length_sq.is_finite() {
                    return Err(FeError::Degenerate {
                        measure: length_sq.sqrt(),
                    });
                }

                let mut jacobian = Matrix3::zeros();
                jacobian.set_column(0, &t);
                let mut inverse = Matrix3::zeros();
                inverse.set_row(0, &(t / length_sq).transpose());

                Ok(Self {
                    origin: vertices[0] + t,
                    jacobian,
                    inverse,
                    measure: length_sq.sqrt(),
                })
            }
            ElementKind::Tri3 => {
                let e1 = vertices[1] - vertices[0];
                let e2 = vertices[2] - vertices[0];
                let det = e1.x * e2.y - e2.x * e1.y;
                if !(det.abs() > 0.0) || !det.is_finite() {
                    return Err(FeError::Degenerate { measure: det.abs() });
                }

                let mut jacobian = Matrix3::zeros();
                jacobian.set_column(0, &e1);
                jacobian.set_column(1, &e2);
                let inverse = Matrix3::new(
                    e2.y / det,
                    -e2.x / det,
                    0.0,
                    -e1.y / det,
                    e1.x / det,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                );

                Ok(Self {
                    origin: vertices[0],
                    jacobian,
                    inverse,
                    measure: det.abs(),
                })
            }
        }
    }

    fn map(&self, reference: [f64; 2]) -> Point3<f64> {
        self.origin + self.jacobian * Vector3::new(reference[0], reference[1], 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn all() -> FeRequest {
        let mut request = FeRequest::default();
        request
            .jxw()
            .phi()
            .dphi()
            .laplacian()
            .xyz()
            .inverse_map()
            .normals();
        request
    }

    fn triangle() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
        ]
    }

    #[test]
    fn parses_input_file_spellings() {
        assert_eq!("LAGRANGE".parse::<FeFamily>().unwrap(), FeFamily::Lagrange);
        assert_eq!("SCALAR".parse::<FeFamily>().unwrap(), FeFamily::Scalar);
        assert_eq!("SECOND".parse::<FeOrder>().unwrap(), FeOrder::Second);
        assert!("HERMITE".parse::<FeFamily>().is_err());
    }

    #[test]
    fn edge_weights_sum_to_length() {
        let vertices = [Point3::new(1.0, 0.0, 0.0), Point3::new(3.5, 0.0, 0.0)];
        for order in [FeOrder::First, FeOrder::Second] {
            let fe = element_fe(ElementKind::Edge2, FeFamily::Lagrange, order, &vertices, all())
                .unwrap();
            assert_relative_eq!(fe.jxw().iter().sum::<f64>(), 2.5, epsilon = 1e-14);
        }
    }

    #[test]
    fn shape_functions_partition_unity() {
        let fe = element_fe(
            ElementKind::Tri3,
            FeFamily::Lagrange,
            FeOrder::First,
            &triangle(),
            all(),
        )
        .unwrap();

        assert_relative_eq!(fe.jxw().iter().sum::<f64>(), 3.0, epsilon = 1e-14);
        for qp in 0..fe.n_qpoints() {
            let sum: f64 = (0..fe.n_dofs()).map(|i| fe.phi()[i][qp]).sum();
            let grad: Vector3<f64> = (0..fe.n_dofs()).map(|i| fe.dphi()[i][qp]).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
            assert_relative_eq!(grad.norm(), 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn linear_field_gradient_is_exact() {
        let vertices = triangle();
        let fe = element_fe(
            ElementKind::Tri3,
            FeFamily::Lagrange,
            FeOrder::First,
            &vertices,
            all(),
        )
        .unwrap();

        // u = 2x - y sampled at the vertices
        let nodal: Vec<f64> = vertices.iter().map(|p| 2.0 * p.x - p.y).collect();
        for qp in 0..fe.n_qpoints() {
            let grad: Vector3<f64> = (0..3).map(|i| nodal[i] * fe.dphi()[i][qp]).sum();
            assert_relative_eq!(grad.x, 2.0, epsilon = 1e-13);
            assert_relative_eq!(grad.y, -1.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn quadratic_edge_laplacian_is_exact() {
        let vertices = [Point3::new(1.0, 0.0, 0.0), Point3::new(3.0, 0.0, 0.0)];
        let fe = element_fe(
            ElementKind::Edge2,
            FeFamily::Lagrange,
            FeOrder::Second,
            &vertices,
            all(),
        )
        .unwrap();

        // u = x² sampled at the nodes x = 1, 3, 2
        let nodal = [1.0, 9.0, 4.0];
        for qp in 0..fe.n_qpoints() {
            let laplacian: f64 = (0..3).map(|i| nodal[i] * fe.laplacian()[i][qp]).sum();
            assert_relative_eq!(laplacian, 2.0, epsilon = 1e-12);
        }

        let linear = element_fe(
            ElementKind::Tri3,
            FeFamily::Lagrange,
            FeOrder::First,
            &triangle(),
            all(),
        )
        .unwrap();
        assert!(linear.laplacian().iter().flatten().all(|&l| l == 0.0));
    }

    #[test]
    fn triangle_side_normals_point_outward() {
        let vertices = triangle();
        for side in 0..3 {
            let fe = side_fe(
                ElementKind::Tri3,
                FeFamily::Lagrange,
                FeOrder::First,
                &vertices,
                side,
                all(),
            )
            .unwrap();

            let centroid = Point3::new(1.0, 1.0, 0.0);
            for qp in 0..fe.n_qpoints() {
                let outward = fe.xyz()[qp] - centroid;
                assert!(fe.normals()[qp].dot(&outward) > 0.0);
                assert_relative_eq!(fe.normals()[qp].norm(), 1.0, epsilon = 1e-14);
            }
        }

        let bottom = side_fe(
            ElementKind::Tri3,
            FeFamily::Lagrange,
            FeOrder::First,
            &vertices,
            0,
            all(),
        )
        .unwrap();
        assert_relative_eq!(bottom.jxw().iter().sum::<f64>(), 2.0, epsilon = 1e-14);
    }

    #[test]
    fn scalar_family_is_a_unit_constant() {
        let vertices = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let fe =
            element_fe(ElementKind::Edge2, FeFamily::Scalar, FeOrder::First, &vertices, all())
                .unwrap();

        assert_eq!(fe.n_dofs(), 1);
        assert!(fe.phi()[0].iter().all(|&v| v == 1.0));
        assert!(fe.dphi()[0].iter().all(|g| g.norm() == 0.0));
    }

    #[test]
    fn rejects_unsupported_and_degenerate() {
        assert!(matches!(
            element_fe(
                ElementKind::Tri3,
                FeFamily::Lagrange,
                FeOrder::Second,
                &triangle(),
                all()
            ),
            Err(FeError::Unsupported { .. })
        ));

        let collapsed = [Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert!(matches!(
            element_fe(
                ElementKind::Edge2,
                FeFamily::Lagrange,
                FeOrder::First,
                &collapsed,
                all()
            ),
            Err(FeError::Degenerate { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "dphi was not requested")]
    fn unrequested_data_panics() {
        let vertices = [Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let mut request = FeRequest::default();
        request.jxw();
        let fe = element_fe(
            ElementKind::Edge2,
            FeFamily::Lagrange,
            FeOrder::First,
            &vertices,
            request,
        )
        .unwrap();
        let _ = fe.dphi();
    }
}
