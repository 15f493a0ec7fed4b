//! Error taxonomy shared by every stage of the lens pipeline.

use thiserror::Error;

/// Failures raised anywhere between parameter validation and file export.
/// None of them are recovered inside the library.
#[derive(Debug, Error)]
pub enum LensError {
    /// Degenerate optical parameters or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The root search found no sign change before hitting its ceiling.
    #[error("no sign change in [{a}, {b}] (bracket ceiling {ceiling})")]
    NoBracket { a: f64, b: f64, ceiling: f64 },

    /// An iterative solver ran out of iterations.
    #[error("{solver} failed to converge in {iterations} iterations (residual = {residual})")]
    Convergence {
        solver: &'static str,
        iterations: usize,
        residual: f64,
    },

    /// The Newton linear system could not be solved.
    #[error("Jacobian is singular at ({}, {})", .at[0], .at[1])]
    SingularJacobian { at: [f64; 2] },

    /// The two trimmed curves do not end at the same point.
    #[error("trimmed curves end {distance} apart (tolerance {tolerance})")]
    GeometryMismatch { distance: f64, tolerance: f64 },

    /// A function evaluation produced NaN or infinity.
    #[error("{solver} evaluated a non-finite value at {location}")]
    NonFinite {
        solver: &'static str,
        location: String,
    },

    #[error("STL parse error on line {line}: {reason}")]
    StlParse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LensError>;

impl LensError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        LensError::Configuration(message.into())
    }
}
