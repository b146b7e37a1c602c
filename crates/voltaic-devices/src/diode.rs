//! Junction diode model.
//!
//! DC current law with forward and recombination branches and a
//! high-injection knee:
//!
//! ```text
//! Idf = Is * (exp(Vd/(N*Vt)) - 1)        forward
//! Idr = Isr * (exp(Vd/(Nr*Vt)) - 1)      recombination
//! Idf *= sqrt(Ikf / (Ikf + Idf))         knee, when Ikf > 0
//! ```
//!
//! The small-signal capacitance combines a linear part, the diffusion
//! charge and the depletion capacitance with the usual `Fc` crossover:
//! `Cd = Cp + Tt*gd + Cj`.

use nalgebra::DVector;
use num_complex::Complex64;
use std::f64::consts::PI;

use voltaic_core::consts::thermal_voltage;
use voltaic_core::{Device, MnaSystem, NodeId, TimePoint, voltage};

/// Diode model parameters.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (A).
    pub is: f64,
    /// Emission coefficient.
    pub n: f64,
    /// Recombination current parameter (A).
    pub isr: f64,
    /// Emission coefficient of the recombination branch.
    pub nr: f64,
    /// High-injection knee current (A); values `<= 0` disable the knee.
    pub ikf: f64,
    /// Zero-bias junction capacitance (F).
    pub cj0: f64,
    /// Grading coefficient.
    pub m: f64,
    /// Junction potential (V).
    pub vj: f64,
    /// Forward-bias depletion capacitance coefficient.
    pub fc: f64,
    /// Linear capacitance (F).
    pub cp: f64,
    /// Transit time (s).
    pub tt: f64,
    /// Device temperature (K).
    pub temp: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            is: 1e-15,
            n: 1.0,
            isr: 0.0,
            nr: 2.0,
            ikf: 1e12,
            cj0: 0.0,
            m: 0.5,
            vj: 0.7,
            fc: 0.5,
            cp: 0.0,
            tt: 0.0,
            temp: 300.0,
        }
    }
}

/// Electrical quantities at the last linearization point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiodeOpPoint {
    /// Limited junction voltage (V).
    pub vd: f64,
    /// Junction current (A).
    pub id: f64,
    /// Junction conductance (S).
    pub gd: f64,
    /// Depletion capacitance (F).
    pub cj: f64,
    /// Total small-signal capacitance (F).
    pub cd: f64,
}

/// A junction diode between anode and cathode.
#[derive(Debug, Clone)]
pub struct Diode {
    pub name: String,
    pub anode: NodeId,
    pub cathode: NodeId,
    pub params: DiodeParams,
    oppoint: DiodeOpPoint,
    saved: DiodeOpPoint,
    vd_prev: f64,
    ic_prev: f64,
}

impl Diode {
    pub fn new(name: impl Into<String>, anode: NodeId, cathode: NodeId) -> Self {
        Self::with_params(name, anode, cathode, DiodeParams::default())
    }

    pub fn with_params(
        name: impl Into<String>,
        anode: NodeId,
        cathode: NodeId,
        params: DiodeParams,
    ) -> Self {
        Self {
            name: name.into(),
            anode,
            cathode,
            params,
            oppoint: DiodeOpPoint::default(),
            saved: DiodeOpPoint::default(),
            vd_prev: 0.0,
            ic_prev: 0.0,
        }
    }

    /// The operating point produced by the last `calc_oppoint`.
    pub fn oppoint(&self) -> &DiodeOpPoint {
        &self.oppoint
    }

    fn junction_voltage(&self, x: &DVector<f64>) -> f64 {
        voltage(x, self.anode) - voltage(x, self.cathode)
    }

    /// Limit a candidate junction voltage to keep `exp()` bounded.
    ///
    /// Above `Vcrit = N*Vt*ln(N*Vt/(sqrt(2)*Is))` the update is pulled
    /// onto the logarithmic curve through the previous iterate.
    fn limit_voltage(&mut self, vd: f64, vt: f64) -> f64 {
        let nvt = self.params.n * vt;
        let vcrit = nvt * (nvt / (std::f64::consts::SQRT_2 * self.params.is)).ln();

        let mut vd = vd;
        if vd > 0.0 && vd > vcrit {
            let arg = (vd - self.vd_prev) / nvt;
            // log1p domain: an update reversing past -1 falls back to Vcrit
            vd = if arg > -1.0 {
                self.vd_prev + nvt * arg.ln_1p()
            } else {
                vcrit
            };
        }
        self.vd_prev = vd;
        vd
    }
}

impl Device for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.anode, self.cathode]
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn init(&mut self) {
        self.oppoint = DiodeOpPoint::default();
        self.saved = DiodeOpPoint::default();
        self.vd_prev = 0.0;
        self.ic_prev = 0.0;
    }

    fn calc_oppoint(&mut self, x: &DVector<f64>) {
        let p = self.params.clone();
        let vt = thermal_voltage(p.temp);
        let vd = self.limit_voltage(self.junction_voltage(x), vt);

        // Forward branch
        let nvt = p.n * vt;
        let mut idf = p.is * (vd / nvt).exp_m1();
        let mut gdf = p.is / nvt * (vd / nvt).exp();

        // Recombination branch
        let nrvt = p.nr * vt;
        let (idr, gdr) = if p.isr > 0.0 {
            (
                p.isr * (vd / nrvt).exp_m1(),
                p.isr / nrvt * (vd / nrvt).exp(),
            )
        } else {
            (0.0, 0.0)
        };

        // High-injection knee
        if p.ikf > 0.0 {
            idf *= (p.ikf / (p.ikf + idf)).sqrt();
            gdf *= (1.0 - 0.5 * idf / (p.ikf + idf)) * (p.ikf / (p.ikf + idf)).sqrt();
        }

        let id = idf + idr;
        let gd = gdf + gdr;

        // Depletion capacitance, linearly extrapolated above Fc
        let ratio = vd / p.vj;
        let cj = if ratio <= p.fc {
            p.cj0 * (1.0 - ratio).powf(-p.m)
        } else {
            p.cj0 / (1.0 - p.fc).powf(p.m) * (1.0 + p.m * (ratio - p.fc) / (1.0 - p.fc))
        };
        let cd = p.cp + p.tt * gd + cj;

        self.oppoint = DiodeOpPoint { vd, id, gd, cj, cd };
    }

    fn save_oppoint(&mut self) {
        self.saved = self.oppoint;
    }

    fn restore_oppoint(&mut self) {
        self.oppoint = self.saved;
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, _aux: Option<usize>) {
        let DiodeOpPoint { vd, id, gd, .. } = self.oppoint;
        let ieq = id - gd * vd;
        mna.stamp_conductance(self.anode, self.cathode, gd);
        mna.stamp_current_source(self.anode, self.cathode, ieq);
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        _aux: Option<usize>,
        freq: f64,
    ) {
        let DiodeOpPoint { gd, cd, .. } = self.oppoint;
        let y = Complex64::new(gd, 2.0 * PI * freq * cd);
        mna.stamp_conductance(self.anode, self.cathode, y);
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        x: &DVector<f64>,
        aux: Option<usize>,
        history: &[TimePoint],
        _t: f64,
        dt: f64,
    ) {
        self.stamp_dc(mna, x, aux);

        // Trapezoidal companion of the junction capacitance
        let cd = self.oppoint.cd;
        if cd > 0.0 {
            let Some(last) = history.last() else { return };
            let v_prev = self.junction_voltage(&last.solution);
            let geq = 2.0 * cd / dt;
            let ieq = geq * v_prev + self.ic_prev;
            mna.stamp_conductance(self.anode, self.cathode, geq);
            mna.stamp_current_source(self.cathode, self.anode, ieq);
        }
    }

    fn check_vlimit(&self, x: &DVector<f64>, vabstol: f64) -> bool {
        (self.junction_voltage(x) - self.oppoint.vd).abs() <= vabstol
    }

    fn save_tran(&mut self, history: &[TimePoint], dt: f64) {
        let cd = self.oppoint.cd;
        if cd <= 0.0 || history.len() < 2 {
            return;
        }
        let v_new = self.junction_voltage(&history[history.len() - 1].solution);
        let v_old = self.junction_voltage(&history[history.len() - 2].solution);
        self.ic_prev = 2.0 * cd / dt * (v_new - v_old) - self.ic_prev;
    }
}
