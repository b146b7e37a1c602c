//! Solver error types.

/// Errors produced by the linear layer and the analysis engines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The factorization hit a singular system or produced non-finite
    /// values.
    #[error("matrix is singular or produced a non-finite solution")]
    Singular,

    /// Matrix and right-hand side dimensions disagree.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Newton-Raphson hit the iteration cap without converging.
    #[error("Newton-Raphson did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    /// The transient step size fell below the configured minimum.
    #[error("timestep {tstep:.3e} s fell below the minimum {min:.3e} s at t = {time:.3e} s")]
    TimestepUnderflow { tstep: f64, min: f64, time: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
