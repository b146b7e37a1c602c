//! Passive element models: resistor, capacitor, inductor.

use std::f64::consts::PI;

use nalgebra::DVector;
use num_complex::Complex64;

use voltaic_core::{Analysis, Device, MnaSystem, NodeId, TimePoint, unknown, voltage};

/// A linear resistor between two nodes.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    pub a: NodeId,
    pub b: NodeId,
    /// Resistance (ohm).
    pub resistance: f64,
}

impl Resistor {
    pub fn new(name: impl Into<String>, a: NodeId, b: NodeId, resistance: f64) -> Self {
        Self {
            name: name.into(),
            a,
            b,
            resistance,
        }
    }

    fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl Device for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.a, self.b]
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, _aux: Option<usize>) {
        mna.stamp_conductance(self.a, self.b, self.conductance());
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        _aux: Option<usize>,
        _freq: f64,
    ) {
        mna.stamp_conductance(self.a, self.b, Complex64::new(self.conductance(), 0.0));
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        _xk: &DVector<f64>,
        _aux: Option<usize>,
        _history: &[TimePoint],
        _t: f64,
        _dt: f64,
    ) {
        mna.stamp_conductance(self.a, self.b, self.conductance());
    }
}

/// A linear capacitor.
///
/// Open circuit at DC, admittance `j*2*pi*f*C` in AC, and a trapezoidal
/// companion model in transient. The companion current through the
/// capacitor at the last committed step is the only integrator state; it
/// is updated in `save_tran`, so rejected steps leave it untouched.
#[derive(Debug, Clone)]
pub struct Capacitor {
    pub name: String,
    pub a: NodeId,
    pub b: NodeId,
    /// Capacitance (F).
    pub capacitance: f64,
    i_prev: f64,
}

impl Capacitor {
    pub fn new(name: impl Into<String>, a: NodeId, b: NodeId, capacitance: f64) -> Self {
        Self {
            name: name.into(),
            a,
            b,
            capacitance,
            i_prev: 0.0,
        }
    }

    fn branch_voltage(&self, x: &DVector<f64>) -> f64 {
        voltage(x, self.a) - voltage(x, self.b)
    }
}

impl Device for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.a, self.b]
    }

    fn init(&mut self) {
        // No current flows at the DC operating point
        self.i_prev = 0.0;
    }

    fn stamp_dc(&self, _mna: &mut MnaSystem<f64>, _x: &DVector<f64>, _aux: Option<usize>) {
        // Open circuit at DC; Gmin keeps otherwise floating nodes pinned
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        _aux: Option<usize>,
        freq: f64,
    ) {
        let y = Complex64::new(0.0, 2.0 * PI * freq * self.capacitance);
        mna.stamp_conductance(self.a, self.b, y);
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        _xk: &DVector<f64>,
        _aux: Option<usize>,
        history: &[TimePoint],
        _t: f64,
        dt: f64,
    ) {
        let Some(last) = history.last() else { return };
        let v_prev = self.branch_voltage(&last.solution);

        // Trapezoidal: C replaced by Geq = 2C/dt in parallel with
        // Ieq = Geq * v_prev + i_prev
        let geq = 2.0 * self.capacitance / dt;
        let ieq = geq * v_prev + self.i_prev;

        mna.stamp_conductance(self.a, self.b, geq);
        mna.stamp_current_source(self.b, self.a, ieq);
    }

    fn save_tran(&mut self, history: &[TimePoint], dt: f64) {
        if history.len() < 2 {
            return;
        }
        let v_new = self.branch_voltage(&history[history.len() - 1].solution);
        let v_old = self.branch_voltage(&history[history.len() - 2].solution);
        self.i_prev = 2.0 * self.capacitance / dt * (v_new - v_old) - self.i_prev;
    }
}

/// A linear inductor.
///
/// Carries one auxiliary current unknown in every analysis: a short
/// (`V+ - V- = 0`) at DC, impedance `j*2*pi*f*L` in AC, and the
/// trapezoidal integration of `v = L di/dt` in transient. The transient
/// branch row reads its own committed current and voltage from the
/// history, so the device caches no integrator state.
#[derive(Debug, Clone)]
pub struct Inductor {
    pub name: String,
    pub a: NodeId,
    pub b: NodeId,
    /// Inductance (H).
    pub inductance: f64,
}

impl Inductor {
    pub fn new(name: impl Into<String>, a: NodeId, b: NodeId, inductance: f64) -> Self {
        Self {
            name: name.into(),
            a,
            b,
            inductance,
        }
    }
}

impl Device for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.a, self.b]
    }

    fn aux_count(&self, _analysis: Analysis) -> usize {
        1
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, aux: Option<usize>) {
        let Some(row) = aux else { return };
        // Branch row: V_a - V_b = 0
        mna.stamp_branch(self.a, self.b, row);
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        aux: Option<usize>,
        freq: f64,
    ) {
        let Some(row) = aux else { return };
        // Branch row: V_a - V_b - j*2*pi*f*L * I = 0
        mna.stamp_branch(self.a, self.b, row);
        mna.add(
            row,
            row,
            Complex64::new(0.0, -2.0 * PI * freq * self.inductance),
        );
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        _xk: &DVector<f64>,
        aux: Option<usize>,
        history: &[TimePoint],
        _t: f64,
        dt: f64,
    ) {
        let Some(row) = aux else { return };
        let Some(last) = history.last() else { return };
        let i_prev = unknown(&last.solution, row);
        let v_prev = voltage(&last.solution, self.a) - voltage(&last.solution, self.b);

        // Trapezoidal integration of v = L di/dt:
        // V_a - V_b - (2L/dt) * I = -(2L/dt) * i_prev - v_prev
        let req = 2.0 * self.inductance / dt;
        mna.stamp_branch(self.a, self.b, row);
        mna.add(row, row, -req);
        mna.add_rhs(row, -req * i_prev - v_prev);
    }
}
