//! Fixed Gauss rules for the supported element shapes.

use crate::support::mesh::ElementKind;

/// A quadrature point in reference coordinates with its reference weight.
pub(super) struct QuadraturePoint {
    pub(super) reference: [f64; 2],
    pub(super) weight: f64,
}

/// Returns the interior rule for an element shape.
///
/// Edges use three-point Gauss-Legendre on `[-1, 1]` (exact to degree 5).
/// Triangles use the three-point interior rule on the unit right triangle
/// (exact to degree 2); weights sum to the reference area `1/2`.
pub(super) fn element_rule(kind: ElementKind) -> Vec<QuadraturePoint> {
    match kind {
        ElementKind::Edge2 => {
            let a = (3.0_f64 / 5.0).sqrt();
            [(-a, 5.0 / 9.0), (0.0, 8.0 / 9.0), (a, 5.0 / 9.0)]
                .into_iter()
                .map(|(xi, weight)| QuadraturePoint {
                    reference: [xi, 0.0],
                    weight,
                })
                .collect()
        }
        ElementKind::Tri3 => [[1.0 / 6.0, 1.0 / 6.0], [2.0 / 3.0, 1.0 / 6.0], [1.0 / 6.0, 2.0 / 3.0]]
            .into_iter()
            .map(|reference| QuadraturePoint {
                reference,
                weight: 1.0 / 6.0,
            })
            .collect(),
    }
}

/// Two-point Gauss-Legendre rule on `[-1, 1]` as `(t, weight)` pairs.
pub(super) fn line_rule() -> [(f64, f64); 2] {
    let a = 1.0 / 3.0_f64.sqrt();
    [(-a, 1.0), (a, 1.0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn edge_rule_integrates_quintic() {
        // ∫_{-1}^{1} (x⁵ + x⁴ + 1) dx = 2/5 + 2
        let integral: f64 = element_rule(ElementKind::Edge2)
            .iter()
            .map(|qp| {
                let x = qp.reference[0];
                qp.weight * (x.powi(5) + x.powi(4) + 1.0)
            })
            .sum();
        assert_relative_eq!(integral, 2.4, epsilon = 1e-14);
    }

    #[test]
    fn triangle_rule_integrates_quadratics() {
        // ∫ ξ² over the unit right triangle is 1/12, ∫ ξη is 1/24
        let rule = element_rule(ElementKind::Tri3);
        let xx: f64 = rule.iter().map(|qp| qp.weight * qp.reference[0].powi(2)).sum();
        let xy: f64 = rule
            .iter()
            .map(|qp| qp.weight * qp.reference[0] * qp.reference[1])
            .sum();
        assert_relative_eq!(xx, 1.0 / 12.0, epsilon = 1e-14);
        assert_relative_eq!(xy, 1.0 / 24.0, epsilon = 1e-14);
    }
}
