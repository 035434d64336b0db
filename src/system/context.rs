use nalgebra::{DMatrix, DVector, Point3, Vector3};

use crate::support::{
    fe::{self, FeData, FeFamily, FeOrder, FeRequest},
    mesh::{BoundarySide, ElementKind, Mesh},
};

use super::{AssemblyError, CachedValues, DofMap, VariableIndex};

/// The boundary side currently being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideInfo {
    pub side: usize,
    pub boundary_id: u16,
}

/// Read-only view of the element (and side) being assembled.
///
/// Holds per-variable finite-element data, the local solution coefficients,
/// and their time derivatives.
#[derive(Debug, Clone, Default)]
pub struct ElementState {
    element: usize,
    kind: Option<ElementKind>,
    vertices: Vec<Point3<f64>>,
    side: Option<SideInfo>,
    element_fe: Vec<Option<FeData>>,
    side_fe: Vec<Option<FeData>>,
    dof_indices: Vec<Vec<usize>>,
    coefficients: Vec<DVector<f64>>,
    rates: Vec<DVector<f64>>,
    rate_derivative: f64,
}

impl ElementState {
    /// Id of the element being assembled.
    #[must_use]
    pub fn element(&self) -> usize {
        self.element
    }

    /// Shape of the element being assembled.
    ///
    /// # Panics
    ///
    /// Panics if the context has not been positioned on an element.
    #[must_use]
    pub fn kind(&self) -> ElementKind {
        self.kind
            .unwrap_or_else(|| panic!("assembly context is not positioned on an element"))
    }

    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// The boundary side being assembled, if this is a side visit.
    #[must_use]
    pub fn side(&self) -> Option<SideInfo> {
        self.side
    }

    /// Boundary id of the side being assembled, if this is a side visit.
    #[must_use]
    pub fn boundary_id(&self) -> Option<u16> {
        self.side.map(|s| s.boundary_id)
    }

    /// Interior finite-element data for `var`.
    ///
    /// # Panics
    ///
    /// Panics if no interior data was requested for `var` during `init_context`.
    #[must_use]
    pub fn element_fe(&self, var: VariableIndex) -> &FeData {
        self.element_fe
            .get(var.get())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("no element FE data was requested for {var:?}"))
    }

    /// Side finite-element data for `var`.
    ///
    /// # Panics
    ///
    /// Panics outside a side visit or if no side data was requested for `var`.
    #[must_use]
    pub fn side_fe(&self, var: VariableIndex) -> &FeData {
        self.side_fe
            .get(var.get())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("no side FE data is available for {var:?}"))
    }

    /// Number of local degrees of freedom of `var` on this element.
    #[must_use]
    pub fn n_dofs(&self, var: VariableIndex) -> usize {
        self.coefficients[var.get()].len()
    }

    /// Global dof indices of `var` on this element, in local order.
    #[must_use]
    pub fn dof_indices(&self, var: VariableIndex) -> &[usize] {
        &self.dof_indices[var.get()]
    }

    /// Local solution coefficients of `var`.
    #[must_use]
    pub fn coefficients(&self, var: VariableIndex) -> &DVector<f64> {
        &self.coefficients[var.get()]
    }

    /// Local time-derivative coefficients of `var`.
    #[must_use]
    pub fn rates(&self, var: VariableIndex) -> &DVector<f64> {
        &self.rates[var.get()]
    }

    /// `∂u̇/∂u` of the time integrator, zero for steady assembly.
    #[must_use]
    pub fn solution_rate_derivative(&self) -> f64 {
        self.rate_derivative
    }

    /// Value of `var` at interior quadrature point `qp`.
    #[must_use]
    pub fn interior_value(&self, var: VariableIndex, qp: usize) -> f64 {
        value(self.element_fe(var), &self.coefficients[var.get()], qp)
    }

    /// Gradient of `var` at interior quadrature point `qp`.
    #[must_use]
    pub fn interior_gradient(&self, var: VariableIndex, qp: usize) -> Vector3<f64> {
        gradient(self.element_fe(var), &self.coefficients[var.get()], qp)
    }

    /// Time derivative of `var` at interior quadrature point `qp`.
    #[must_use]
    pub fn interior_rate(&self, var: VariableIndex, qp: usize) -> f64 {
        value(self.element_fe(var), &self.rates[var.get()], qp)
    }

    /// Value of `var` at side quadrature point `qp`.
    #[must_use]
    pub fn side_value(&self, var: VariableIndex, qp: usize) -> f64 {
        value(self.side_fe(var), &self.coefficients[var.get()], qp)
    }

    /// Gradient of `var` at side quadrature point `qp`.
    #[must_use]
    pub fn side_gradient(&self, var: VariableIndex, qp: usize) -> Vector3<f64> {
        gradient(self.side_fe(var), &self.coefficients[var.get()], qp)
    }

    /// Total number of local dofs across all variables.
    pub(crate) fn total_dofs(&self) -> usize {
        self.coefficients.iter().map(DVector::len).sum()
    }

    /// Shifts one local coefficient, addressed in variable-major order.
    ///
    /// The matching rate coefficient moves by `rate_shift`.
    pub(crate) fn perturb(&mut self, flat_index: usize, delta: f64, rate_shift: f64) {
        let (var, local) = locate(&self.coefficients, flat_index);
        self.coefficients[var][local] += delta;
        self.rates[var][local] += rate_shift;
    }

    /// Current value of one coefficient, addressed in variable-major order.
    pub(crate) fn flat_coefficient(&self, flat_index: usize) -> f64 {
        let (var, local) = locate(&self.coefficients, flat_index);
        self.coefficients[var][local]
    }
}

fn value(fe: &FeData, coefficients: &DVector<f64>, qp: usize) -> f64 {
    fe.phi()
        .iter()
        .zip(coefficients.iter())
        .map(|(phi, u)| u * phi[qp])
        .sum()
}

fn gradient(fe: &FeData, coefficients: &DVector<f64>, qp: usize) -> Vector3<f64> {
    fe.dphi()
        .iter()
        .zip(coefficients.iter())
        .map(|(dphi, u)| *u * dphi[qp])
        .sum()
}

fn locate(blocks: &[DVector<f64>], mut flat_index: usize) -> (usize, usize) {
    for (var, block) in blocks.iter().enumerate() {
        if flat_index < block.len() {
            return (var, flat_index);
        }
        flat_index -= block.len();
    }
    panic!("local dof index is out of range");
}

/// Local residual and Jacobian blocks, one per variable (pair).
///
/// Block `(row, col)` holds `∂R_row/∂u_col`.
#[derive(Debug, Clone, Default)]
pub struct LocalSystem {
    residuals: Vec<DVector<f64>>,
    jacobian: Vec<Vec<DMatrix<f64>>>,
}

impl LocalSystem {
    /// Residual block of `var`.
    pub fn residual_mut(&mut self, var: VariableIndex) -> &mut DVector<f64> {
        &mut self.residuals[var.get()]
    }

    #[must_use]
    pub fn residual(&self, var: VariableIndex) -> &DVector<f64> {
        &self.residuals[var.get()]
    }

    /// Jacobian block coupling equation `row` to unknown `col`.
    pub fn jacobian_mut(&mut self, row: VariableIndex, col: VariableIndex) -> &mut DMatrix<f64> {
        &mut self.jacobian[row.get()][col.get()]
    }

    #[must_use]
    pub fn jacobian(&self, row: VariableIndex, col: VariableIndex) -> &DMatrix<f64> {
        &self.jacobian[row.get()][col.get()]
    }

    /// Zeroes every block without changing its shape.
    pub fn zero(&mut self) {
        self.residuals.iter_mut().for_each(|r| r.fill(0.0));
        self.jacobian
            .iter_mut()
            .flatten()
            .for_each(|block| block.fill(0.0));
    }

    /// Concatenates the residual blocks in variable order.
    #[must_use]
    pub fn flat_residual(&self) -> DVector<f64> {
        let values: Vec<f64> = self.residuals.iter().flat_map(|r| r.iter().copied()).collect();
        DVector::from_vec(values)
    }

    /// Assembles the blocks into one dense matrix in variable-major order.
    #[must_use]
    pub fn flat_jacobian(&self) -> DMatrix<f64> {
        let sizes = self.sizes();
        let n = sizes.iter().sum();
        let mut flat = DMatrix::zeros(n, n);

        let mut row0 = 0;
        for (row, &rows) in sizes.iter().enumerate() {
            let mut col0 = 0;
            for (col, &cols) in sizes.iter().enumerate() {
                flat.view_mut((row0, col0), (rows, cols))
                    .copy_from(&self.jacobian[row][col]);
                col0 += cols;
            }
            row0 += rows;
        }
        flat
    }

    /// Adds a dense variable-major matrix into the blocks.
    pub(crate) fn add_flat_jacobian(&mut self, flat: &DMatrix<f64>) {
        let sizes = self.sizes();

        let mut row0 = 0;
        for (row, &rows) in sizes.iter().enumerate() {
            let mut col0 = 0;
            for (col, &cols) in sizes.iter().enumerate() {
                self.jacobian[row][col] += flat.view((row0, col0), (rows, cols));
                col0 += cols;
            }
            row0 += rows;
        }
    }

    fn sizes(&self) -> Vec<usize> {
        self.residuals.iter().map(DVector::len).collect()
    }

    fn resize(&mut self, sizes: &[usize]) {
        self.residuals = sizes.iter().map(|&n| DVector::zeros(n)).collect();
        self.jacobian = sizes
            .iter()
            .map(|&rows| sizes.iter().map(|&cols| DMatrix::zeros(rows, cols)).collect())
            .collect();
    }
}

/// Disjoint borrows of an [`AssemblyContext`].
///
/// Physics callbacks read the element state while writing the local system
/// and the cache.
pub struct AssemblyParts<'a> {
    pub state: &'a ElementState,
    pub local: &'a mut LocalSystem,
    pub cache: &'a mut CachedValues,
}

/// Per-element workspace handed to physics callbacks.
///
/// One context exists per concurrently assembled element. Physics modules
/// declare the data they need through [`request_element_fe`] and
/// [`request_side_fe`] once, during `init_context`; the assembly system then
/// repositions copies of that template on each element and side.
///
/// [`request_element_fe`]: Self::request_element_fe
/// [`request_side_fe`]: Self::request_side_fe
#[derive(Debug, Clone)]
pub struct AssemblyContext {
    discretizations: Vec<(FeFamily, FeOrder)>,
    element_requests: Vec<FeRequest>,
    side_requests: Vec<FeRequest>,
    state: ElementState,
    local: LocalSystem,
    cache: CachedValues,
}

impl AssemblyContext {
    pub(crate) fn new(discretizations: Vec<(FeFamily, FeOrder)>) -> Self {
        let n_vars = discretizations.len();
        Self {
            discretizations,
            element_requests: vec![FeRequest::default(); n_vars],
            side_requests: vec![FeRequest::default(); n_vars],
            state: ElementState::default(),
            local: LocalSystem::default(),
            cache: CachedValues::new(),
        }
    }

    /// Requests interior quadrature data for `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a registered variable.
    pub fn request_element_fe(&mut self, var: VariableIndex) -> &mut FeRequest {
        &mut self.element_requests[var.get()]
    }

    /// Requests side quadrature data for `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` is not a registered variable.
    pub fn request_side_fe(&mut self, var: VariableIndex) -> &mut FeRequest {
        &mut self.side_requests[var.get()]
    }

    #[must_use]
    pub fn state(&self) -> &ElementState {
        &self.state
    }

    #[must_use]
    pub fn local(&self) -> &LocalSystem {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut LocalSystem {
        &mut self.local
    }

    #[must_use]
    pub fn cache(&self) -> &CachedValues {
        &self.cache
    }

    pub fn parts(&mut self) -> AssemblyParts<'_> {
        AssemblyParts {
            state: &self.state,
            local: &mut self.local,
            cache: &mut self.cache,
        }
    }

    pub(crate) fn state_mut(&mut self) -> &mut ElementState {
        &mut self.state
    }

    pub(crate) fn cache_mut(&mut self) -> &mut CachedValues {
        &mut self.cache
    }

    /// Positions the context on element `element` for interior assembly.
    pub(crate) fn reinit_element(
        &mut self,
        mesh: &Mesh,
        dof_map: &DofMap,
        element: usize,
        solution: &DVector<f64>,
        rate: &DVector<f64>,
        rate_derivative: f64,
    ) -> Result<(), AssemblyError> {
        self.reinit(mesh, dof_map, element, None, solution, rate, rate_derivative)
    }

    /// Positions the context on a boundary side.
    pub(crate) fn reinit_side(
        &mut self,
        mesh: &Mesh,
        dof_map: &DofMap,
        side: BoundarySide,
        solution: &DVector<f64>,
        rate: &DVector<f64>,
        rate_derivative: f64,
    ) -> Result<(), AssemblyError> {
        let info = SideInfo {
            side: side.side,
            boundary_id: side.boundary_id,
        };
        self.reinit(
            mesh,
            dof_map,
            side.element,
            Some(info),
            solution,
            rate,
            rate_derivative,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn reinit(
        &mut self,
        mesh: &Mesh,
        dof_map: &DofMap,
        element: usize,
        side: Option<SideInfo>,
        solution: &DVector<f64>,
        rate: &DVector<f64>,
        rate_derivative: f64,
    ) -> Result<(), AssemblyError> {
        self.cache.clear();

        let kind = mesh.elements()[element].kind;
        let vertices = mesh.element_vertices(element);
        let fe_error = |source| AssemblyError::Fe { element, source };

        let n_vars = self.discretizations.len();
        let mut element_fe = Vec::with_capacity(n_vars);
        let mut side_fe = Vec::with_capacity(n_vars);
        let mut dof_indices = Vec::with_capacity(n_vars);
        let mut coefficients = Vec::with_capacity(n_vars);
        let mut rates = Vec::with_capacity(n_vars);

        for (var, &(family, order)) in self.discretizations.iter().enumerate() {
            let request = self.element_requests[var];
            element_fe.push(if request.is_empty() {
                None
            } else {
                Some(fe::element_fe(kind, family, order, &vertices, request).map_err(fe_error)?)
            });

            let request = self.side_requests[var];
            side_fe.push(match side {
                Some(info) if !request.is_empty() => Some(
                    fe::side_fe(kind, family, order, &vertices, info.side, request)
                        .map_err(fe_error)?,
                ),
                _ => None,
            });

            let dofs = dof_map
                .element_dofs(element, VariableIndex::new(var))
                .to_vec();
            coefficients.push(DVector::from_iterator(
                dofs.len(),
                dofs.iter().map(|&d| solution[d]),
            ));
            rates.push(DVector::from_iterator(
                dofs.len(),
                dofs.iter().map(|&d| rate[d]),
            ));
            dof_indices.push(dofs);
        }

        let sizes: Vec<usize> = dof_indices.iter().map(Vec::len).collect();
        self.local.resize(&sizes);

        self.state = ElementState {
            element,
            kind: Some(kind),
            vertices,
            side,
            element_fe,
            side_fe,
            dof_indices,
            coefficients,
            rates,
            rate_derivative,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    use crate::system::VariableRegistry;

    fn edge_context() -> (AssemblyContext, VariableIndex) {
        let mesh = Mesh::line(2, 0.0, 2.0);
        let mut registry = VariableRegistry::new(1);
        let t = registry
            .add_variable("T", FeOrder::First, FeFamily::Lagrange)
            .unwrap();
        let dof_map = DofMap::build(&mesh, &registry).unwrap();

        let mut context = AssemblyContext::new(vec![(FeFamily::Lagrange, FeOrder::First)]);
        context.request_element_fe(t).jxw().phi().dphi();
        context.request_side_fe(t).phi().normals();

        // u = 3x, u̇ = 1
        let u = DVector::from_vec(vec![0.0, 3.0, 6.0]);
        let u_dot = DVector::from_element(3, 1.0);
        context
            .reinit_element(&mesh, &dof_map, 1, &u, &u_dot, 0.5)
            .unwrap();
        (context, t)
    }

    #[test]
    fn interpolates_local_fields() {
        let (context, t) = edge_context();
        let state = context.state();

        assert_eq!(state.element(), 1);
        assert_eq!(state.dof_indices(t), &[1, 2]);
        assert_eq!(state.side(), None);
        assert_relative_eq!(state.solution_rate_derivative(), 0.5);

        let fe = state.element_fe(t);
        for qp in 0..fe.n_qpoints() {
            let x = fe.phi()[0][qp] * 1.0 + fe.phi()[1][qp] * 2.0;
            assert_relative_eq!(state.interior_value(t, qp), 3.0 * x, epsilon = 1e-13);
            assert_relative_eq!(state.interior_gradient(t, qp).x, 3.0, epsilon = 1e-13);
            assert_relative_eq!(state.interior_rate(t, qp), 1.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn flat_layout_is_variable_major() {
        let mut local = LocalSystem::default();
        local.resize(&[2, 1]);
        let (a, b) = {
            let mut registry = VariableRegistry::new(1);
            let a = registry
                .add_variable("a", FeOrder::First, FeFamily::Lagrange)
                .unwrap();
            let b = registry
                .add_variable("b", FeOrder::First, FeFamily::Scalar)
                .unwrap();
            (a, b)
        };

        local.residual_mut(b)[0] = 7.0;
        local.jacobian_mut(a, b)[(1, 0)] = 2.0;
        local.jacobian_mut(b, a)[(0, 0)] = -1.0;

        assert_eq!(local.flat_residual().as_slice(), &[0.0, 0.0, 7.0]);
        let flat = local.flat_jacobian();
        assert_relative_eq!(flat[(1, 2)], 2.0);
        assert_relative_eq!(flat[(2, 0)], -1.0);

        local.add_flat_jacobian(&flat);
        assert_relative_eq!(local.jacobian(a, b)[(1, 0)], 4.0);

        local.zero();
        assert_relative_eq!(local.flat_jacobian().amax(), 0.0);
        assert_eq!(local.residual(a).len(), 2);
    }

    #[test]
    #[should_panic(expected = "no side FE data is available")]
    fn side_data_is_absent_on_interior_visits() {
        let (context, t) = edge_context();
        let _ = context.state().side_fe(t);
    }
}
