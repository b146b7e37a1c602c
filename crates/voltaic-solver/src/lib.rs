//! Analysis engines for Voltaic.
//!
//! Three engines share one numerical core:
//!
//! - [`Dc`] - Newton-Raphson operating point with voltage limiting and a
//!   gmin-stepping fallback
//! - [`Ac`] - complex small-signal sweep around the DC operating point
//! - [`Transient`] - adaptive time stepping wrapped around the DC
//!   engine's Newton machinery
//!
//! The linear layer ([`linear::solve`]) works on real and complex
//! systems alike and offers dense LU with partial pivoting or sparse LU.

pub mod ac;
pub mod convergence;
pub mod dc;
pub mod error;
pub mod linear;
mod newton;
pub mod transient;

pub use ac::{Ac, AcConfig, AcSolution, FrequencySweep, SweepKind};
pub use convergence::ConvergenceCriteria;
pub use dc::{Dc, DcConfig};
pub use error::{Error, Result};
pub use transient::{TranConfig, Transient, TransientSolution};
