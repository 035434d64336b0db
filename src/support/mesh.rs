//! Minimal unstructured mesh container.
//!
//! Mesh generation and partitioning live elsewhere. This container only holds
//! what assembly needs: vertex coordinates, element connectivity, and the
//! boundary sides that carry natural or Robin conditions.

use nalgebra::Point3;

/// Supported element shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Two-node line segment.
    Edge2,
    /// Three-node triangle in the `xy` plane.
    Tri3,
}

impl ElementKind {
    /// Number of vertices.
    #[must_use]
    pub fn n_vertices(self) -> usize {
        match self {
            Self::Edge2 => 2,
            Self::Tri3 => 3,
        }
    }

    /// Number of sides (end points for edges, edges for triangles).
    #[must_use]
    pub fn n_sides(self) -> usize {
        self.n_vertices()
    }

    /// Reference dimension.
    #[must_use]
    pub fn dim(self) -> usize {
        match self {
            Self::Edge2 => 1,
            Self::Tri3 => 2,
        }
    }
}

/// An element: a shape and its vertex indices into [`Mesh::points`].
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub kind: ElementKind,
    pub nodes: Vec<usize>,
}

/// An element side lying on the domain boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundarySide {
    pub element: usize,
    pub side: usize,
    pub boundary_id: u16,
}

/// Vertices, elements, and boundary sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    dim: usize,
    points: Vec<Point3<f64>>,
    elements: Vec<Element>,
    boundary_sides: Vec<BoundarySide>,
}

impl Mesh {
    /// Creates a mesh from its parts.
    ///
    /// # Panics
    ///
    /// Panics if an element references a missing vertex, has the wrong vertex
    /// count, or a boundary side references a missing element or side.
    #[must_use]
    pub fn new(
        dim: usize,
        points: Vec<Point3<f64>>,
        elements: Vec<Element>,
        boundary_sides: Vec<BoundarySide>,
    ) -> Self {
        for (id, element) in elements.iter().enumerate() {
            assert_eq!(
                element.nodes.len(),
                element.kind.n_vertices(),
                "element {id} has the wrong vertex count"
            );
            assert!(
                element.nodes.iter().all(|&n| n < points.len()),
                "element {id} references a missing vertex"
            );
        }
        for side in &boundary_sides {
            assert!(
                side.element < elements.len()
                    && side.side < elements[side.element].kind.n_sides(),
                "boundary side {side:?} does not exist"
            );
        }

        Self {
            dim,
            points,
            elements,
            boundary_sides,
        }
    }

    /// Builds a uniform 1-D mesh of `n_elements` segments on `[x0, x1]`.
    ///
    /// The left end carries boundary id 0 and the right end boundary id 1.
    ///
    /// # Panics
    ///
    /// Panics if `n_elements` is zero.
    #[must_use]
    pub fn line(n_elements: usize, x0: f64, x1: f64) -> Self {
        assert!(n_elements > 0, "a line mesh needs at least one element");

        let h = (x1 - x0) / n_elements as f64;
        let points = (0..=n_elements)
            .map(|i| Point3::new(x0 + h * i as f64, 0.0, 0.0))
            .collect();
        let elements = (0..n_elements)
            .map(|i| Element {
                kind: ElementKind::Edge2,
                nodes: vec![i, i + 1],
            })
            .collect();
        let boundary_sides = vec![
            BoundarySide {
                element: 0,
                side: 0,
                boundary_id: 0,
            },
            BoundarySide {
                element: n_elements - 1,
                side: 1,
                boundary_id: 1,
            },
        ];

        Self::new(1, points, elements, boundary_sides)
    }

    /// Mesh dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    #[must_use]
    pub fn boundary_sides(&self) -> &[BoundarySide] {
        &self.boundary_sides
    }

    /// Returns the vertex coordinates of element `id`.
    #[must_use]
    pub fn element_vertices(&self, id: usize) -> Vec<Point3<f64>> {
        self.elements[id]
            .nodes
            .iter()
            .map(|&n| self.points[n])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn line_mesh_layout() {
        let mesh = Mesh::line(4, 0.0, 2.0);

        assert_eq!(mesh.dim(), 1);
        assert_eq!(mesh.points().len(), 5);
        assert_eq!(mesh.elements().len(), 4);
        assert_relative_eq!(mesh.points()[2].x, 1.0);

        let ends: Vec<_> = mesh
            .boundary_sides()
            .iter()
            .map(|s| (s.element, s.side, s.boundary_id))
            .collect();
        assert_eq!(ends, vec![(0, 0, 0), (3, 1, 1)]);
    }

    #[test]
    #[should_panic(expected = "references a missing vertex")]
    fn rejects_dangling_connectivity() {
        let _ = Mesh::new(
            1,
            vec![Point3::origin()],
            vec![Element {
                kind: ElementKind::Edge2,
                nodes: vec![0, 1],
            }],
            vec![],
        );
    }
}
