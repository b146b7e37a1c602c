//! DC operating point analysis.

use nalgebra::DVector;

use voltaic_core::{Analysis, Netlist};

use crate::convergence::ConvergenceCriteria;
use crate::error::Result;
use crate::newton::{NewtonSettings, StampContext, solve_newton};

/// DC engine options.
#[derive(Debug, Clone, Copy)]
pub struct DcConfig {
    /// Use the sparse LU path.
    pub is_sparse: bool,
    /// Newton iteration cap.
    pub max_iterations: usize,
    /// Conductance added to every diagonal entry.
    pub gmin: f64,
    pub criteria: ConvergenceCriteria,
}

impl Default for DcConfig {
    fn default() -> Self {
        Self {
            is_sparse: false,
            max_iterations: 150,
            gmin: 1e-12,
            criteria: ConvergenceCriteria::default(),
        }
    }
}

/// The DC operating point engine.
pub struct Dc {
    pub config: DcConfig,
}

impl Dc {
    pub fn new() -> Self {
        Self {
            config: DcConfig::default(),
        }
    }

    pub fn with_config(config: DcConfig) -> Self {
        Self { config }
    }

    /// Solve the operating point, optionally warm-started from `x0`.
    ///
    /// Plain Newton-Raphson runs first; if it fails (iteration cap or a
    /// singular solve), a gmin-stepping homotopy ramps the diagonal
    /// conductance from 1e-3 down by decades to the configured value,
    /// warm-starting each stage from the previous one.
    pub fn run(&self, netlist: &mut Netlist, x0: Option<&DVector<f64>>) -> Result<DVector<f64>> {
        let unknowns = netlist.unknown_count(Analysis::Dc);
        let x0 = match x0 {
            Some(x) => x.clone(),
            None => DVector::zeros(unknowns),
        };

        for dev in netlist.devices_mut() {
            dev.init();
        }

        log::info!("starting DC analysis ({unknowns} unknowns)");
        let settings = self.settings();

        match solve_newton(netlist, &x0, &settings, StampContext::Dc) {
            Ok((x, k)) => {
                log::info!("DC analysis converged in {k} iterations");
                Ok(x)
            }
            Err(err) => {
                log::warn!("DC analysis failed ({err}); trying gmin stepping");
                self.gmin_stepping(netlist, &x0)
            }
        }
    }

    fn settings(&self) -> NewtonSettings {
        NewtonSettings {
            is_sparse: self.config.is_sparse,
            max_iterations: self.config.max_iterations,
            gmin: self.config.gmin,
            criteria: self.config.criteria,
        }
    }

    fn gmin_stepping(&self, netlist: &mut Netlist, x0: &DVector<f64>) -> Result<DVector<f64>> {
        let mut x = x0.clone();
        let mut gmin = 1e-3;

        while gmin > self.config.gmin {
            let stage = NewtonSettings {
                gmin,
                ..self.settings()
            };
            let (xs, k) = solve_newton(netlist, &x, &stage, StampContext::Dc)?;
            log::debug!("gmin step {gmin:.1e} converged in {k} iterations");
            x = xs;
            gmin /= 10.0;
        }

        let (x, k) = solve_newton(netlist, &x, &self.settings(), StampContext::Dc)?;
        log::info!("gmin stepping converged in {k} iterations at the target gmin");
        Ok(x)
    }
}

impl Default for Dc {
    fn default() -> Self {
        Self::new()
    }
}
