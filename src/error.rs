//! Error types for Smriti.

use crate::config::ConfigLoadError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Smriti error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input data (non-finite points, invalid transforms)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Scan id outside the stored history
    #[error("Scan {id} not found (index holds {len} scans)")]
    NotFound {
        /// Requested scan id
        id: usize,
        /// Number of stored scans
        len: usize,
    },

    /// Pose node registered twice
    #[error("Pose node {0} is already registered")]
    DuplicateId(u64),

    /// Factor or anchor references a node that was never registered
    #[error("Pose node {0} is not registered")]
    UnknownNode(u64),

    /// Information matrix is not symmetric positive semi-definite
    #[error("Invalid information matrix: {0}")]
    InvalidInformation(String),

    /// No anchor node: the normal equations would be rank-deficient
    #[error("Pose graph has no fixed node; the system is singular")]
    SingularSystem,

    /// Iteration budget exhausted before reaching tolerance
    #[error(
        "Optimization did not converge after {iterations} iterations (error {initial_error:.6e} -> {final_error:.6e})"
    )]
    NonConvergence {
        /// Iterations performed
        iterations: u32,
        /// Chi-squared error before optimization
        initial_error: f64,
        /// Chi-squared error of the last accepted step
        final_error: f64,
    },

    /// Estimates requested before a successful optimization
    #[error("No solution available; optimize() has not succeeded since the last change")]
    NotSolved,

    /// Configuration value outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed text record
    #[error("Parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading error
    #[error(transparent)]
    Config(#[from] ConfigLoadError),
}

impl Error {
    /// Whether the caller should treat this as an expected, loggable condition.
    ///
    /// Contract violations (`DuplicateId`, `UnknownNode`, `SingularSystem`)
    /// indicate a caller bug and return `false`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NonConvergence { .. } | Error::NotSolved | Error::InvalidInput(_)
        )
    }
}
