//! Independent source models.

use nalgebra::DVector;
use num_complex::Complex64;

use voltaic_core::{Analysis, Device, MnaSystem, NodeId, TimePoint};

use crate::waveforms::Waveform;

/// An independent voltage source.
///
/// Introduces one auxiliary current unknown in every analysis. The DC
/// value is the waveform at `t = 0`; the AC stamp applies the
/// small-signal phasor `ac_mag` at `ac_phase` degrees.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub name: String,
    pub pos: NodeId,
    pub neg: NodeId,
    pub waveform: Waveform,
    /// Small-signal magnitude (V); 0 for a DC-only source.
    pub ac_mag: f64,
    /// Small-signal phase (degrees).
    pub ac_phase: f64,
}

impl VoltageSource {
    /// DC source with no AC component.
    pub fn dc(name: impl Into<String>, pos: NodeId, neg: NodeId, value: f64) -> Self {
        Self::new(name, pos, neg, Waveform::dc(value))
    }

    pub fn new(name: impl Into<String>, pos: NodeId, neg: NodeId, waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            pos,
            neg,
            waveform,
            ac_mag: 0.0,
            ac_phase: 0.0,
        }
    }

    pub fn with_ac(mut self, mag: f64, phase: f64) -> Self {
        self.ac_mag = mag;
        self.ac_phase = phase;
        self
    }

    fn ac_phasor(&self) -> Complex64 {
        Complex64::from_polar(self.ac_mag, self.ac_phase.to_radians())
    }
}

impl Device for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.pos, self.neg]
    }

    fn aux_count(&self, _analysis: Analysis) -> usize {
        1
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, aux: Option<usize>) {
        let Some(row) = aux else { return };
        mna.stamp_branch(self.pos, self.neg, row);
        mna.add_rhs(row, self.waveform.dc_value());
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        aux: Option<usize>,
        _freq: f64,
    ) {
        let Some(row) = aux else { return };
        mna.stamp_branch(self.pos, self.neg, row);
        mna.add_rhs(row, self.ac_phasor());
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        _xk: &DVector<f64>,
        aux: Option<usize>,
        _history: &[TimePoint],
        t: f64,
        _dt: f64,
    ) {
        let Some(row) = aux else { return };
        mna.stamp_branch(self.pos, self.neg, row);
        mna.add_rhs(row, self.waveform.value_at(t));
    }
}

/// An independent current source.
///
/// Positive current flows from `pos` through the source to `neg`, i.e.
/// it is extracted at `pos` and injected at `neg`.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    pub name: String,
    pub pos: NodeId,
    pub neg: NodeId,
    pub waveform: Waveform,
    /// Small-signal magnitude (A); 0 for a DC-only source.
    pub ac_mag: f64,
    /// Small-signal phase (degrees).
    pub ac_phase: f64,
}

impl CurrentSource {
    /// DC source with no AC component.
    pub fn dc(name: impl Into<String>, pos: NodeId, neg: NodeId, value: f64) -> Self {
        Self::new(name, pos, neg, Waveform::dc(value))
    }

    pub fn new(name: impl Into<String>, pos: NodeId, neg: NodeId, waveform: Waveform) -> Self {
        Self {
            name: name.into(),
            pos,
            neg,
            waveform,
            ac_mag: 0.0,
            ac_phase: 0.0,
        }
    }

    pub fn with_ac(mut self, mag: f64, phase: f64) -> Self {
        self.ac_mag = mag;
        self.ac_phase = phase;
        self
    }
}

impl Device for CurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn nodes(&self) -> Vec<NodeId> {
        vec![self.pos, self.neg]
    }

    fn stamp_dc(&self, mna: &mut MnaSystem<f64>, _x: &DVector<f64>, _aux: Option<usize>) {
        mna.stamp_current_source(self.pos, self.neg, self.waveform.dc_value());
    }

    fn stamp_ac(
        &self,
        mna: &mut MnaSystem<Complex64>,
        _x_dc: &DVector<f64>,
        _aux: Option<usize>,
        _freq: f64,
    ) {
        let phasor = Complex64::from_polar(self.ac_mag, self.ac_phase.to_radians());
        mna.stamp_current_source(self.pos, self.neg, phasor);
    }

    fn stamp_tran(
        &self,
        mna: &mut MnaSystem<f64>,
        _xk: &DVector<f64>,
        _aux: Option<usize>,
        _history: &[TimePoint],
        t: f64,
        _dt: f64,
    ) {
        mna.stamp_current_source(self.pos, self.neg, self.waveform.value_at(t));
    }
}
