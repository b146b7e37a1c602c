//! The contract every circuit element implements.

use nalgebra::DVector;
use num_complex::Complex64;

use crate::mna::MnaSystem;
use crate::node::NodeId;

/// The analysis kinds an engine can run. Auxiliary-row bookkeeping is
/// keyed by this: a device may request different auxiliary counts per
/// analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analysis {
    /// DC operating point.
    Dc,
    /// Small-signal AC sweep.
    Ac,
    /// Large-signal time-domain.
    Tran,
}

/// One committed `(t, x)` pair of a transient history.
#[derive(Debug, Clone)]
pub struct TimePoint {
    /// Simulated time (s).
    pub time: f64,
    /// Solution vector at that time (node voltages, then auxiliary
    /// currents).
    pub solution: DVector<f64>,
}

/// A circuit element.
///
/// Stamp methods may only *add into* the MNA buffers; they must be
/// commutative across devices and idempotent given identical device
/// state. Engines call [`Device::calc_oppoint`] on nonlinear devices
/// before assembling; stamps read the stored operating point and never
/// recompute it.
///
/// A nonlinear device stamps the Jacobian of its I-V relation on the
/// left-hand side and the excess current `I - g*V` on the right-hand
/// side, so the Newton correction emerges from one linear solve.
pub trait Device {
    /// Device name, for diagnostics.
    fn name(&self) -> &str;

    /// The nodes this device connects to.
    fn nodes(&self) -> Vec<NodeId>;

    /// Number of auxiliary current unknowns this device introduces for
    /// the given analysis.
    fn aux_count(&self, _analysis: Analysis) -> usize {
        0
    }

    /// Does this device require Newton iteration?
    fn is_nonlinear(&self) -> bool {
        false
    }

    /// One-shot per analysis; clears voltage-limit and integrator state.
    fn init(&mut self) {}

    /// Update the operating point from a candidate solution, applying
    /// voltage limiting first.
    fn calc_oppoint(&mut self, _x: &DVector<f64>) {}

    /// Commit the operating point (called when a transient step
    /// converges).
    fn save_oppoint(&mut self) {}

    /// Roll the operating point back to the last committed copy.
    fn restore_oppoint(&mut self) {}

    /// Contribute the DC stamp, linearized about the current operating
    /// point. `aux` is the device's first auxiliary row, if any.
    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, x: &DVector<f64>, aux: Option<usize>);

    /// Contribute the complex small-signal stamp at frequency `freq`
    /// (Hz), linearized about the DC solution `x_dc`.
    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        x_dc: &DVector<f64>,
        aux: Option<usize>,
        freq: f64,
    );

    /// Contribute the companion-model stamp for one Newton step of one
    /// time step. `history` is the committed `(t, x)` sequence, read
    /// only; `dt` is the step being attempted towards time `t`.
    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        xk: &DVector<f64>,
        aux: Option<usize>,
        history: &[TimePoint],
        t: f64,
        dt: f64,
    );

    /// Is the limited junction voltage consistent with the newly
    /// produced solution? Returning false forces another Newton
    /// iteration.
    fn check_vlimit(&self, _x: &DVector<f64>, _vabstol: f64) -> bool {
        true
    }

    /// Update per-device integrator state after a committed step.
    fn save_tran(&mut self, _history: &[TimePoint], _dt: f64) {}
}
