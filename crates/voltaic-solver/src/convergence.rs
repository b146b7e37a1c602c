//! Newton-Raphson convergence criteria.

use nalgebra::DVector;

/// Tolerances of the two-band convergence test.
///
/// Node voltages are tested against `reltol`/`vabstol`, auxiliary
/// currents against `reltol`/`iabstol`.
#[derive(Debug, Clone, Copy)]
pub struct ConvergenceCriteria {
    /// Relative tolerance.
    pub reltol: f64,
    /// Absolute voltage tolerance (V).
    pub vabstol: f64,
    /// Absolute current tolerance (A).
    pub iabstol: f64,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            reltol: 1e-3,
            vabstol: 1e-6,
            iabstol: 1e-12,
        }
    }
}

impl ConvergenceCriteria {
    /// Did the update from `xk` to `x` converge? The first
    /// `num_nodes - 1` entries are node voltages, the rest auxiliary
    /// currents.
    pub fn converged(&self, xk: &DVector<f64>, x: &DVector<f64>, num_nodes: usize) -> bool {
        let voltages = num_nodes - 1;
        for i in 0..x.len() {
            let abstol = if i < voltages {
                self.vabstol
            } else {
                self.iabstol
            };
            if (x[i] - xk[i]).abs() > self.reltol * xk[i].abs() + abstol {
                return false;
            }
        }
        true
    }
}
