//! Small-signal AC analysis.
//!
//! AC is linear: there is no Newton loop. Each nonlinear device is
//! linearized once at the DC operating point, then a complex MNA is
//! assembled and solved per frequency. A singular frequency stores
//! zeros and is recorded in [`AcSolution::failed`]; the sweep never
//! aborts.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use voltaic_core::{Analysis, MnaSystem, Netlist, NodeId};

use crate::dc::{Dc, DcConfig};
use crate::error::Result;
use crate::linear;

/// Frequency spacing of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Equally spaced points.
    Linear,
    /// Geometrically spaced points.
    Logarithmic,
}

impl SweepKind {
    /// Parse a textual sweep kind; `None` for anything unknown.
    pub fn parse(s: &str) -> Option<SweepKind> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "lin" => Some(SweepKind::Linear),
            "logarithm" | "logarithmic" | "log" => Some(SweepKind::Logarithmic),
            _ => None,
        }
    }
}

/// A frequency sweep descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FrequencySweep {
    /// First frequency (Hz).
    pub start: f64,
    /// Last frequency (Hz).
    pub stop: f64,
    /// Number of points.
    pub points: usize,
    pub kind: SweepKind,
}

impl FrequencySweep {
    pub fn linear(start: f64, stop: f64, points: usize) -> Self {
        Self {
            start,
            stop,
            points,
            kind: SweepKind::Linear,
        }
    }

    pub fn logarithmic(start: f64, stop: f64, points: usize) -> Self {
        Self {
            start,
            stop,
            points,
            kind: SweepKind::Logarithmic,
        }
    }

    /// Build a sweep from a textual kind. An unknown kind degrades to a
    /// two-point linear sweep with a warning instead of failing.
    pub fn from_kind_str(start: f64, stop: f64, points: usize, kind: &str) -> Self {
        match SweepKind::parse(kind) {
            Some(kind) => Self {
                start,
                stop,
                points,
                kind,
            },
            None => {
                log::warn!("unknown sweep kind '{kind}'; falling back to a two-point sweep");
                Self::linear(start, stop, 2)
            }
        }
    }

    /// The frequency list.
    pub fn frequencies(&self) -> Vec<f64> {
        if self.points <= 1 {
            return vec![self.start];
        }
        let steps = (self.points - 1) as f64;
        match self.kind {
            SweepKind::Linear => (0..self.points)
                .map(|i| self.start + (self.stop - self.start) * i as f64 / steps)
                .collect(),
            SweepKind::Logarithmic => {
                let ratio = (self.stop / self.start).powf(1.0 / steps);
                (0..self.points)
                    .map(|i| self.start * ratio.powi(i as i32))
                    .collect()
            }
        }
    }
}

/// AC engine options.
#[derive(Debug, Clone, Copy)]
pub struct AcConfig {
    /// Use the sparse LU path.
    pub is_sparse: bool,
    /// Conductance added to every diagonal entry.
    pub gmin: f64,
}

impl Default for AcConfig {
    fn default() -> Self {
        Self {
            is_sparse: false,
            gmin: 1e-12,
        }
    }
}

/// Result of an AC sweep: one complex solution row per frequency.
#[derive(Debug, Clone)]
pub struct AcSolution {
    /// Swept frequencies (Hz).
    pub freqs: Vec<f64>,
    /// `(F, n+m-1)` solution matrix; failed frequencies hold zeros.
    pub data: DMatrix<Complex64>,
    /// The DC operating point the sweep was linearized around.
    pub xdc: DVector<f64>,
    /// Indices of frequencies whose system was singular.
    pub failed: Vec<usize>,
}

impl AcSolution {
    /// Complex node voltage at frequency index `k`. Ground reads zero.
    pub fn voltage(&self, k: usize, node: NodeId) -> Complex64 {
        match node.unknown_index() {
            Some(i) => self.data[(k, i)],
            None => Complex64::new(0.0, 0.0),
        }
    }
}

/// The AC sweep engine.
pub struct Ac {
    pub sweep: FrequencySweep,
    pub config: AcConfig,
}

impl Ac {
    pub fn new(sweep: FrequencySweep) -> Self {
        Self {
            sweep,
            config: AcConfig::default(),
        }
    }

    pub fn with_config(sweep: FrequencySweep, config: AcConfig) -> Self {
        Self { sweep, config }
    }

    /// Sweep the circuit. Without `x0` a DC analysis supplies the
    /// operating point; the devices' limit state then carries over from
    /// that solve, so the linearization sees the converged voltages.
    pub fn run(&self, netlist: &mut Netlist, x0: Option<&DVector<f64>>) -> Result<AcSolution> {
        let xdc = match x0 {
            Some(x) => x.clone(),
            None => {
                let dc = Dc::with_config(DcConfig {
                    is_sparse: self.config.is_sparse,
                    ..DcConfig::default()
                });
                dc.run(netlist, None)?
            }
        };

        for dev in netlist.devices_mut() {
            if dev.is_nonlinear() {
                dev.calc_oppoint(&xdc);
            }
        }

        let num_nodes = netlist.num_nodes();
        let aux = netlist.aux_map(Analysis::Ac);
        let freqs = self.sweep.frequencies();
        let unknowns = netlist.unknown_count(Analysis::Ac);
        let mut data = DMatrix::zeros(freqs.len(), unknowns);
        let mut failed = Vec::new();
        let mut mna = MnaSystem::<Complex64>::new(num_nodes, netlist.num_aux(Analysis::Ac));

        log::info!("starting AC analysis ({} frequencies)", freqs.len());
        for (k, &freq) in freqs.iter().enumerate() {
            mna.clear();
            for (dev, aux) in netlist.devices().iter().zip(&aux) {
                dev.stamp_ac(&mut mna, &xdc, *aux, freq);
            }
            mna.add_gmin(Complex64::new(self.config.gmin, 0.0));

            let (a, z) = mna.reduced();
            match linear::solve(&a, &z, self.config.is_sparse) {
                Ok(x) => data.row_mut(k).tr_copy_from(&x),
                Err(err) => {
                    log::error!("failed to solve AC at {freq:.6e} Hz: {err}");
                    failed.push(k);
                }
            }
        }
        log::info!("finished AC analysis");

        Ok(AcSolution {
            freqs,
            data,
            xdc,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_sweep_endpoints_and_spacing() {
        let freqs = FrequencySweep::linear(100.0, 200.0, 5).frequencies();
        assert_eq!(freqs, vec![100.0, 125.0, 150.0, 175.0, 200.0]);
    }

    #[test]
    fn logarithmic_sweep_is_geometric() {
        let freqs = FrequencySweep::logarithmic(1.0, 1e4, 5).frequencies();
        assert_eq!(freqs.len(), 5);
        for (i, expected) in [1.0, 10.0, 100.0, 1e3, 1e4].iter().enumerate() {
            assert!(
                (freqs[i] - expected).abs() / expected < 1e-12,
                "freqs[{i}] = {}",
                freqs[i]
            );
        }
    }

    #[test]
    fn single_point_sweep_collapses_to_start() {
        let freqs = FrequencySweep::linear(42.0, 100.0, 1).frequencies();
        assert_eq!(freqs, vec![42.0]);
    }

    #[test]
    fn unknown_kind_degrades_to_two_points() {
        let sweep = FrequencySweep::from_kind_str(10.0, 20.0, 50, "octave");
        assert_eq!(sweep.kind, SweepKind::Linear);
        assert_eq!(sweep.frequencies(), vec![10.0, 20.0]);
    }

    #[test]
    fn kind_parsing_accepts_the_usual_spellings() {
        assert_eq!(SweepKind::parse("linear"), Some(SweepKind::Linear));
        assert_eq!(SweepKind::parse("LOG"), Some(SweepKind::Logarithmic));
        assert_eq!(SweepKind::parse("bogus"), None);
    }
}
