//! Bipolar junction transistor, Ebers-Moll transport model.
//!
//! Terminal currents in the device frame (NPN; PNP negates voltages and
//! currents):
//!
//! ```text
//! If = Is * (exp(Vbe/(Nf*Vt)) - 1)
//! Ir = Is * (exp(Vbc/(Nr*Vt)) - 1)
//! Ic = If - Ir * (1 + 1/Br)
//! Ib = If/Bf + Ir/Br
//! ```
//!
//! Both junctions use the diode voltage-limiting scheme. The junction
//! capacitances `Cje`, `Cjc` are constant; they enter the AC stamp and
//! the transient companion models.

use nalgebra::DVector;
use num_complex::Complex64;
use std::f64::consts::{PI, SQRT_2};

use voltaic_core::consts::thermal_voltage;
use voltaic_core::{Device, MnaSystem, NodeId, TimePoint, voltage};

/// NPN or PNP polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BjtType {
    Npn,
    Pnp,
}

impl BjtType {
    fn polarity(self) -> f64 {
        match self {
            BjtType::Npn => 1.0,
            BjtType::Pnp => -1.0,
        }
    }
}

/// BJT model parameters.
#[derive(Debug, Clone)]
pub struct BjtParams {
    /// Transport saturation current (A).
    pub is: f64,
    /// Forward current gain.
    pub bf: f64,
    /// Reverse current gain.
    pub br: f64,
    /// Forward emission coefficient.
    pub nf: f64,
    /// Reverse emission coefficient.
    pub nr: f64,
    /// Base-emitter junction capacitance (F).
    pub cje: f64,
    /// Base-collector junction capacitance (F).
    pub cjc: f64,
    /// Device temperature (K).
    pub temp: f64,
}

impl Default for BjtParams {
    fn default() -> Self {
        Self {
            is: 1e-16,
            bf: 100.0,
            br: 1.0,
            nf: 1.0,
            nr: 1.0,
            cje: 0.0,
            cjc: 0.0,
            temp: 300.0,
        }
    }
}

/// Electrical quantities at the last linearization point (device frame).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct BjtOpPoint {
    /// Limited base-emitter voltage (V).
    vbe: f64,
    /// Limited base-collector voltage (V).
    vbc: f64,
    /// Collector current (A).
    ic: f64,
    /// Base current (A).
    ib: f64,
    /// Forward junction conductance `dIf/dVbe` (S).
    gif: f64,
    /// Reverse junction conductance `dIr/dVbc` (S).
    gir: f64,
}

/// A bipolar junction transistor.
#[derive(Debug, Clone)]
pub struct Bjt {
    pub name: String,
    pub collector: NodeId,
    pub base: NodeId,
    pub emitter: NodeId,
    pub kind: BjtType,
    pub params: BjtParams,
    oppoint: BjtOpPoint,
    saved: BjtOpPoint,
    vbe_prev: f64,
    vbc_prev: f64,
    ibe_cap_prev: f64,
    ibc_cap_prev: f64,
}

impl Bjt {
    pub fn npn(name: impl Into<String>, collector: NodeId, base: NodeId, emitter: NodeId) -> Self {
        Self::with_params(
            name,
            collector,
            base,
            emitter,
            BjtType::Npn,
            BjtParams::default(),
        )
    }

    pub fn pnp(name: impl Into<String>, collector: NodeId, base: NodeId, emitter: NodeId) -> Self {
        Self::with_params(
            name,
            collector,
            base,
            emitter,
            BjtType::Pnp,
            BjtParams::default(),
        )
    }

    pub fn with_params(
        name: impl Into<String>,
        collector: NodeId,
        base: NodeId,
        emitter: NodeId,
        kind: BjtType,
        params: BjtParams,
    ) -> Self {
        Self {
            name: name.into(),
            collector,
            base,
            emitter,
            kind,
            params,
            oppoint: BjtOpPoint::default(),
            saved: BjtOpPoint::default(),
            vbe_prev: 0.0,
            vbc_prev: 0.0,
            ibe_cap_prev: 0.0,
            ibc_cap_prev: 0.0,
        }
    }

    /// Collector current at the last linearization point, in the
    /// external sign convention.
    pub fn collector_current(&self) -> f64 {
        self.kind.polarity() * self.oppoint.ic
    }

    /// Base current at the last linearization point, in the external
    /// sign convention.
    pub fn base_current(&self) -> f64 {
        self.kind.polarity() * self.oppoint.ib
    }

    /// Device-frame junction voltages from a candidate solution.
    fn junction_voltages(&self, x: &DVector<f64>) -> (f64, f64) {
        let p = self.kind.polarity();
        let vb = voltage(x, self.base);
        let vc = voltage(x, self.collector);
        let ve = voltage(x, self.emitter);
        (p * (vb - ve), p * (vb - vc))
    }

    fn limit_junction(v: f64, v_prev: &mut f64, n: f64, is: f64, vt: f64) -> f64 {
        let nvt = n * vt;
        let vcrit = nvt * (nvt / (SQRT_2 * is)).ln();

        let mut v = v;
        if v > 0.0 && v > vcrit {
            let arg = (v - *v_prev) / nvt;
            v = if arg > -1.0 {
                *v_prev + nvt * arg.ln_1p()
            } else {
                vcrit
            };
        }
        *v_prev = v;
        v
    }

    /// Conductance rows for collector and base (the emitter row is the
    /// negated sum), ordered (collector, base, emitter).
    fn conductance_rows(&self) -> [[f64; 3]; 2] {
        let BjtOpPoint { gif, gir, .. } = self.oppoint;
        let gpi = gif / self.params.bf;
        let gmu = gir / self.params.br;
        let gr_tot = gir * (1.0 + 1.0 / self.params.br);
        [
            [gr_tot, gif - gr_tot, -gif],
            [-gmu, gpi + gmu, -gpi],
        ]
    }

    /// Excess currents for collector and base in the external sign
    /// convention, `I - G*v` evaluated at the limited junction voltages.
    fn excess_currents(&self) -> [f64; 2] {
        let p = self.kind.polarity();
        let BjtOpPoint {
            vbe,
            vbc,
            ic,
            ib,
            gif,
            gir,
        } = self.oppoint;
        let gpi = gif / self.params.bf;
        let gmu = gir / self.params.br;
        let gr_tot = gir * (1.0 + 1.0 / self.params.br);
        [
            p * (ic - gif * vbe + gr_tot * vbc),
            p * (ib - gpi * vbe - gmu * vbc),
        ]
    }

    fn terminals(&self) -> [NodeId; 3] {
        [self.collector, self.base, self.emitter]
    }
}

impl Device for Bjt {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.collector, self.base, self.emitter]
    }

    fn is_nonlinear(&self) -> bool {
        true
    }

    fn init(&mut self) {
        self.oppoint = BjtOpPoint::default();
        self.saved = BjtOpPoint::default();
        self.vbe_prev = 0.0;
        self.vbc_prev = 0.0;
        self.ibe_cap_prev = 0.0;
        self.ibc_cap_prev = 0.0;
    }

    fn calc_oppoint(&mut self, x: &DVector<f64>) {
        let p = self.params.clone();
        let vt = thermal_voltage(p.temp);

        let (vbe_raw, vbc_raw) = self.junction_voltages(x);
        let vbe = Self::limit_junction(vbe_raw, &mut self.vbe_prev, p.nf, p.is, vt);
        let vbc = Self::limit_junction(vbc_raw, &mut self.vbc_prev, p.nr, p.is, vt);

        let nfvt = p.nf * vt;
        let nrvt = p.nr * vt;
        let i_f = p.is * (vbe / nfvt).exp_m1();
        let gif = p.is / nfvt * (vbe / nfvt).exp();
        let i_r = p.is * (vbc / nrvt).exp_m1();
        let gir = p.is / nrvt * (vbc / nrvt).exp();

        let ic = i_f - i_r * (1.0 + 1.0 / p.br);
        let ib = i_f / p.bf + i_r / p.br;

        self.oppoint = BjtOpPoint {
            vbe,
            vbc,
            ic,
            ib,
            gif,
            gir,
        };
    }

    fn save_oppoint(&mut self) {
        self.saved = self.oppoint;
    }

    fn restore_oppoint(&mut self) {
        self.oppoint = self.saved;
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, _aux: Option<usize>) {
        let rows = self.conductance_rows();
        let ieq = self.excess_currents();
        let terminals = self.terminals();

        for col in 0..3 {
            let u = terminals[col].row();
            mna.add(terminals[0].row(), u, rows[0][col]);
            mna.add(terminals[1].row(), u, rows[1][col]);
            // KCL: the emitter row balances the other two
            mna.add(terminals[2].row(), u, -(rows[0][col] + rows[1][col]));
        }
        mna.add_rhs(terminals[0].row(), -ieq[0]);
        mna.add_rhs(terminals[1].row(), -ieq[1]);
        mna.add_rhs(terminals[2].row(), ieq[0] + ieq[1]);
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        _aux: Option<usize>,
        freq: f64,
    ) {
        let rows = self.conductance_rows();
        let terminals = self.terminals();

        for col in 0..3 {
            let u = terminals[col].row();
            mna.add(terminals[0].row(), u, Complex64::new(rows[0][col], 0.0));
            mna.add(terminals[1].row(), u, Complex64::new(rows[1][col], 0.0));
            mna.add(
                terminals[2].row(),
                u,
                Complex64::new(-(rows[0][col] + rows[1][col]), 0.0),
            );
        }

        let w = 2.0 * PI * freq;
        if self.params.cje > 0.0 {
            let y = Complex64::new(0.0, w * self.params.cje);
            mna.stamp_conductance(self.base, self.emitter, y);
        }
        if self.params.cjc > 0.0 {
            let y = Complex64::new(0.0, w * self.params.cjc);
            mna.stamp_conductance(self.base, self.collector, y);
        }
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

        let Some(last) = history.last() else { return };
        let xp = &last.solution;

        if self.params.cje > 0.0 {
            let v_prev = voltage(xp, self.base) - voltage(xp, self.emitter);
            let geq = 2.0 * self.params.cje / dt;
            mna.stamp_conductance(self.base, self.emitter, geq);
            mna.stamp_current_source(
                self.emitter,
                self.base,
                geq * v_prev + self.ibe_cap_prev,
            );
        }
        if self.params.cjc > 0.0 {
            let v_prev = voltage(xp, self.base) - voltage(xp, self.collector);
            let geq = 2.0 * self.params.cjc / dt;
            mna.stamp_conductance(self.base, self.collector, geq);
            mna.stamp_current_source(
                self.collector,
                self.base,
                geq * v_prev + self.ibc_cap_prev,
            );
        }
    }

    fn check_vlimit(&self, x: &DVector<f64>, vabstol: f64) -> bool {
        let (vbe, vbc) = self.junction_voltages(x);
        (vbe - self.oppoint.vbe).abs() <= vabstol && (vbc - self.oppoint.vbc).abs() <= vabstol
    }

    fn save_tran(&mut self, history: &[TimePoint], dt: f64) {
        if history.len() < 2 {
            return;
        }
        let x_new = &history[history.len() - 1].solution;
        let x_old = &history[history.len() - 2].solution;

        if self.params.cje > 0.0 {
            let v_new = voltage(x_new, self.base) - voltage(x_new, self.emitter);
            let v_old = voltage(x_old, self.base) - voltage(x_old, self.emitter);
            self.ibe_cap_prev = 2.0 * self.params.cje / dt * (v_new - v_old) - self.ibe_cap_prev;
        }
        if self.params.cjc > 0.0 {
            let v_new = voltage(x_new, self.base) - voltage(x_new, self.collector);
            let v_old = voltage(x_old, self.base) - voltage(x_old, self.collector);
            self.ibc_cap_prev = 2.0 * self.params.cjc / dt * (v_new - v_old) - self.ibc_cap_prev;
        }
    }
}
