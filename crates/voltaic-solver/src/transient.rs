//! Large-signal transient analysis.
//!
//! An outer loop over simulated time wraps the Newton driver: each step
//! targets `t + dt` with the last committed solution as the guess. A
//! converged step is committed (appended to the history, device state
//! saved) and the step size adapted from the iteration count; a failed
//! step rolls `t` back, restores device operating points and retries
//! with `dt/10`. The committed history is never mutated, only grown.

use nalgebra::DVector;

use voltaic_core::{Analysis, Netlist, NodeId, TimePoint, voltage};

use crate::convergence::ConvergenceCriteria;
use crate::dc::{Dc, DcConfig};
use crate::error::{Error, Result};
use crate::newton::{NewtonSettings, StampContext, solve_newton};

/// First attempted step size (s).
const INITIAL_TSTEP: f64 = 1e-12;

/// Transient engine options.
#[derive(Debug, Clone, Copy)]
pub struct TranConfig {
    /// Use the sparse LU path.
    pub is_sparse: bool,
    /// Newton iteration cap per time step.
    pub max_iterations: usize,
    /// Conductance added to every diagonal entry.
    pub gmin: f64,
    pub criteria: ConvergenceCriteria,
    /// Minimum step size before the analysis aborts (s).
    pub mintstep: f64,
}

impl Default for TranConfig {
    fn default() -> Self {
        Self {
            is_sparse: false,
            max_iterations: 150,
            gmin: 1e-12,
            criteria: ConvergenceCriteria::default(),
            mintstep: 1e-16,
        }
    }
}

/// Result of a transient run: the committed history plus step
/// statistics.
#[derive(Debug, Clone)]
pub struct TransientSolution {
    /// Committed `(t, x)` pairs, strictly increasing in time.
    pub points: Vec<TimePoint>,
    /// Node count of the netlist, ground included.
    pub num_nodes: usize,
    /// Attempted steps, including rejected ones.
    pub total_steps: usize,
    /// Steps that failed to converge and were retried.
    pub rejected_steps: usize,
    /// Step-size reductions (rejections and slow-convergence halvings).
    pub step_reductions: usize,
    /// Smallest accepted step (s).
    pub min_step_used: f64,
    /// Largest accepted step (s).
    pub max_step_used: f64,
}

impl TransientSolution {
    /// The committed time axis.
    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.time).collect()
    }

    /// Voltage of `node` over the whole run.
    pub fn voltages(&self, node: NodeId) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| voltage(&p.solution, node))
            .collect()
    }

    /// Time of the last committed point.
    pub fn final_time(&self) -> f64 {
        self.points.last().map(|p| p.time).unwrap_or(0.0)
    }
}

/// The transient engine.
pub struct Transient {
    /// Stop time (s).
    pub tstop: f64,
    /// Largest step the adaption may reach (s).
    pub dt_max: f64,
    pub config: TranConfig,
}

impl Transient {
    pub fn new(tstop: f64, dt_max: f64) -> Self {
        Self {
            tstop,
            dt_max,
            config: TranConfig::default(),
        }
    }

    pub fn with_config(tstop: f64, dt_max: f64, config: TranConfig) -> Self {
        Self {
            tstop,
            dt_max,
            config,
        }
    }

    /// Run the analysis. Without `x0` a DC analysis supplies the
    /// initial condition; `t = 0` is committed with that solution.
    pub fn run(&self, netlist: &mut Netlist, x0: Option<&DVector<f64>>) -> Result<TransientSolution> {
        let num_nodes = netlist.num_nodes();
        let unknowns = netlist.unknown_count(Analysis::Tran);

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

        // The history follows the transient layout; copy what the DC
        // vector shares with it
        let x_init = if xdc.len() == unknowns {
            xdc
        } else {
            let mut v = DVector::zeros(unknowns);
            for i in 0..unknowns.min(xdc.len()) {
                v[i] = xdc[i];
            }
            v
        };

        for dev in netlist.devices_mut() {
            dev.init();
        }
        for dev in netlist.devices_mut() {
            if dev.is_nonlinear() {
                dev.calc_oppoint(&x_init);
                dev.save_oppoint();
            }
        }

        let mut history = vec![TimePoint {
            time: 0.0,
            solution: x_init,
        }];
        let mut t = 0.0;
        let mut dt = INITIAL_TSTEP;

        let settings = NewtonSettings {
            is_sparse: self.config.is_sparse,
            max_iterations: self.config.max_iterations,
            gmin: self.config.gmin,
            criteria: self.config.criteria,
        };

        let mut total_steps = 0usize;
        let mut rejected_steps = 0usize;
        let mut step_reductions = 0usize;
        let mut min_step_used = f64::INFINITY;
        let mut max_step_used = 0.0f64;

        log::info!("starting transient analysis to {:.3e} s", self.tstop);
        while t < self.tstop {
            t += dt;
            total_steps += 1;

            let xk = history[history.len() - 1].solution.clone();
            let attempt = solve_newton(
                netlist,
                &xk,
                &settings,
                StampContext::Tran {
                    history: &history,
                    t,
                    dt,
                },
            );

            match attempt {
                Ok((x, k)) => {
                    history.push(TimePoint { time: t, solution: x });
                    for dev in netlist.devices_mut() {
                        dev.save_tran(&history, dt);
                    }
                    for dev in netlist.devices_mut() {
                        if dev.is_nonlinear() {
                            dev.save_oppoint();
                        }
                    }

                    min_step_used = min_step_used.min(dt);
                    max_step_used = max_step_used.max(dt);

                    if k < 5 {
                        dt = (dt * 2.0).min(self.dt_max);
                        log::debug!("t = {t:.6e} s ({k} iterations); dt grows to {dt:.3e} s");
                    } else if k > 10 {
                        dt /= 2.0;
                        step_reductions += 1;
                        log::debug!("t = {t:.6e} s ({k} iterations); dt shrinks to {dt:.3e} s");
                    }
                }
                Err(err) => {
                    rejected_steps += 1;
                    step_reductions += 1;
                    t -= dt;
                    dt /= 10.0;

                    for dev in netlist.devices_mut() {
                        if dev.is_nonlinear() {
                            dev.restore_oppoint();
                        }
                    }
                    log::debug!(
                        "step past t = {t:.6e} s failed ({err}); retrying with dt = {dt:.3e} s"
                    );

                    if dt < self.config.mintstep {
                        log::error!(
                            "timestep {dt:.3e} s fell below the minimum {:.3e} s",
                            self.config.mintstep
                        );
                        return Err(Error::TimestepUnderflow {
                            tstep: dt,
                            min: self.config.mintstep,
                            time: t,
                        });
                    }
                }
            }
        }
        log::info!(
            "finished transient analysis: {} points, {} rejected steps",
            history.len(),
            rejected_steps
        );

        Ok(TransientSolution {
            points: history,
            num_nodes,
            total_steps,
            rejected_steps,
            step_reductions,
            min_step_used,
            max_step_used,
        })
    }
}
