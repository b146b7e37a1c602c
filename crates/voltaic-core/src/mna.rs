//! Modified Nodal Analysis matrix structures.
//!
//! [`MnaSystem`] holds the full `(n+m) x (n+m)` matrix `A` and the
//! right-hand side `z`, where `n` counts circuit nodes (including the
//! ground reference at row 0) and `m` counts auxiliary current unknowns.
//! Device stamps add into the full buffers, ground row included; the
//! ground row and column are sliced away by [`MnaSystem::reduced`] just
//! before solving. The scalar type is generic so DC/Transient (`f64`)
//! and AC (`Complex<f64>`) share one code path.

use std::ops::{AddAssign, SubAssign};

use nalgebra::{ComplexField, DMatrix, DVector};

use crate::node::NodeId;

/// Scalar type usable in MNA buffers (real or complex).
pub trait MnaScalar: ComplexField + Copy + AddAssign + SubAssign {}
impl<T: ComplexField + Copy + AddAssign + SubAssign> MnaScalar for T {}

/// The MNA matrix pair `A`, `z` for one analysis.
#[derive(Debug, Clone)]
pub struct MnaSystem<T: MnaScalar> {
    num_nodes: usize,
    num_aux: usize,
    matrix: DMatrix<T>,
    rhs: DVector<T>,
}

impl<T: MnaScalar> MnaSystem<T> {
    /// Create zeroed buffers for `num_nodes` nodes (ground included) and
    /// `num_aux` auxiliary current unknowns.
    pub fn new(num_nodes: usize, num_aux: usize) -> Self {
        let size = num_nodes + num_aux;
        Self {
            num_nodes,
            num_aux,
            matrix: DMatrix::zeros(size, size),
            rhs: DVector::zeros(size),
        }
    }

    /// Full system dimension `n + m`.
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_aux
    }

    /// Dimension of the reduced (solvable) system, `n + m - 1`.
    pub fn reduced_size(&self) -> usize {
        self.size() - 1
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_aux(&self) -> usize {
        self.num_aux
    }

    /// Zero both buffers. Called before every assembly.
    pub fn clear(&mut self) {
        self.matrix.fill(T::zero());
        self.rhs.fill(T::zero());
    }

    /// Add `value` into `A[row, col]`.
    pub fn add(&mut self, row: usize, col: usize, value: T) {
        self.matrix[(row, col)] += value;
    }

    /// Add `value` into `z[row]`.
    pub fn add_rhs(&mut self, row: usize, value: T) {
        self.rhs[row] += value;
    }

    /// Stamp a conductance (or admittance) `g` between nodes `a` and `b`.
    pub fn stamp_conductance(&mut self, a: NodeId, b: NodeId, g: T) {
        let (i, j) = (a.row(), b.row());
        self.matrix[(i, i)] += g;
        self.matrix[(j, j)] += g;
        self.matrix[(i, j)] -= g;
        self.matrix[(j, i)] -= g;
    }

    /// Stamp a current source driving `current` through itself from
    /// `from` to `to` (extracted at `from`, injected at `to`).
    pub fn stamp_current_source(&mut self, from: NodeId, to: NodeId, current: T) {
        self.rhs[from.row()] -= current;
        self.rhs[to.row()] += current;
    }

    /// Stamp the node/branch couplings of an auxiliary current unknown
    /// flowing from `a` to `b` through the branch occupying `aux_row`.
    ///
    /// Writes the unit entries tying the branch current into KCL at both
    /// nodes and the node voltages into the branch equation. The caller
    /// adds the branch equation's own terms (source value on the RHS,
    /// impedance on the diagonal, ...).
    pub fn stamp_branch(&mut self, a: NodeId, b: NodeId, aux_row: usize) {
        let (i, j) = (a.row(), b.row());
        self.matrix[(i, aux_row)] += T::one();
        self.matrix[(j, aux_row)] -= T::one();
        self.matrix[(aux_row, i)] += T::one();
        self.matrix[(aux_row, j)] -= T::one();
    }

    /// Add `gmin` to every diagonal entry, auxiliary rows included.
    pub fn add_gmin(&mut self, gmin: T) {
        for d in 0..self.size() {
            self.matrix[(d, d)] += gmin;
        }
    }

    /// The reduced system with ground row and column removed.
    pub fn reduced(&self) -> (DMatrix<T>, DVector<T>) {
        (
            self.matrix.view_range(1.., 1..).into_owned(),
            self.rhs.rows_range(1..).into_owned(),
        )
    }

    /// The full matrix, ground row included (inspection and tests).
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// The full right-hand side, ground row included.
    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }
}
