//! The shared Newton-Raphson driver.
//!
//! DC uses it directly; Transient runs it once per time step with the
//! companion-model stamps. Per iteration: nonlinear devices recompute
//! their operating point from `xk` (voltage limiting applied inside),
//! the MNA is assembled and reduced, the linear system is solved, and
//! the three-part convergence test (voltages, currents, limit
//! consistency) decides whether to iterate again.

use nalgebra::DVector;

use voltaic_core::{Analysis, MnaSystem, Netlist, TimePoint};

use crate::convergence::ConvergenceCriteria;
use crate::error::{Error, Result};
use crate::linear;

/// Which stamps an iteration uses.
#[derive(Clone, Copy)]
pub(crate) enum StampContext<'a> {
    Dc,
    Tran {
        history: &'a [TimePoint],
        t: f64,
        dt: f64,
    },
}

impl StampContext<'_> {
    fn analysis(&self) -> Analysis {
        match self {
            StampContext::Dc => Analysis::Dc,
            StampContext::Tran { .. } => Analysis::Tran,
        }
    }
}

#[derive(Clone, Copy)]
pub(crate) struct NewtonSettings {
    pub is_sparse: bool,
    pub max_iterations: usize,
    pub gmin: f64,
    pub criteria: ConvergenceCriteria,
}

/// Run Newton-Raphson from the initial guess `x0`.
///
/// Returns the solution and the iteration count on convergence. A
/// singular linear solve fails the attempt immediately; exhausting the
/// iteration cap fails with [`Error::NonConvergence`].
pub(crate) fn solve_newton(
    netlist: &mut Netlist,
    x0: &DVector<f64>,
    settings: &NewtonSettings,
    ctx: StampContext<'_>,
) -> Result<(DVector<f64>, usize)> {
    let analysis = ctx.analysis();
    let num_nodes = netlist.num_nodes();
    let aux = netlist.aux_map(analysis);
    let mut mna = MnaSystem::<f64>::new(num_nodes, netlist.num_aux(analysis));
    let mut xk = x0.clone();

    for k in 1..=settings.max_iterations {
        for dev in netlist.devices_mut() {
            if dev.is_nonlinear() {
                dev.calc_oppoint(&xk);
            }
        }

        mna.clear();
        for (dev, aux) in netlist.devices().iter().zip(&aux) {
            match ctx {
                StampContext::Dc => dev.stamp_dc(&mut mna, &xk, *aux),
                StampContext::Tran { history, t, dt } => {
                    dev.stamp_tran(&mut mna, &xk, *aux, history, t, dt);
                }
            }
        }
        mna.add_gmin(settings.gmin);

        let (a, z) = mna.reduced();
        let x = linear::solve(&a, &z, settings.is_sparse)?;

        let numeric = settings.criteria.converged(&xk, &x, num_nodes);
        let limits = netlist
            .devices()
            .iter()
            .all(|d| d.check_vlimit(&x, settings.criteria.vabstol));

        if numeric && limits {
            log::debug!("Newton-Raphson converged in {k} iterations");
            return Ok((x, k));
        }
        xk = x;
    }

    Err(Error::NonConvergence {
        iterations: settings.max_iterations,
    })
}
