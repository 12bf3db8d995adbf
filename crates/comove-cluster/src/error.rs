//! Error types for clustering.

use thiserror::Error;

/// Result type for clustering operations.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur while clustering a matrix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterError {
    /// k is zero, the matrix is empty, or k exceeds the number of rows.
    #[error("Invalid cluster count: k={k} with {rows} row(s), need 1 <= k <= rows")]
    InvalidClusterCount {
        /// Requested cluster count
        k: usize,
        /// Number of rows in the matrix
        rows: usize,
    },

    /// A cluster lost all of its rows during one restart.
    #[error("Degenerate run for k={k}: cluster {cluster} is empty (attempt {attempt})")]
    DegenerateCluster {
        /// Requested cluster count
        k: usize,
        /// Index of the empty cluster
        cluster: usize,
        /// Attempt that produced the empty cluster
        attempt: usize,
    },

    /// Every attempt ended with an empty cluster.
    #[error("No valid partition for k={k} after {attempts} attempt(s)")]
    ConvergenceFailure {
        /// Requested cluster count
        k: usize,
        /// Number of attempts made
        attempts: usize,
    },

    /// Matrix contains NaN or infinity.
    #[error("Non-finite value at row {row}, column {column}")]
    NonFiniteInput {
        /// Row of the offending cell
        row: usize,
        /// Column of the offending cell
        column: usize,
    },

    /// Vector length does not match the centroid dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// Number of row labels differs from the number of matrix rows.
    #[error("Symbol count mismatch: {symbols} symbol(s) for {rows} row(s)")]
    SymbolCountMismatch {
        /// Number of symbols supplied
        symbols: usize,
        /// Number of rows in the fit
        rows: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A sweep worker panicked or was cancelled.
    #[error("Worker failed for k={k}: {message}")]
    Worker {
        /// Cluster count the worker was fitting
        k: usize,
        /// Join error description
        message: String,
    },
}

impl ClusterError {
    /// Cluster count the error refers to, if any.
    pub const fn k(&self) -> Option<usize> {
        match self {
            Self::InvalidClusterCount { k, .. }
            | Self::DegenerateCluster { k, .. }
            | Self::ConvergenceFailure { k, .. }
            | Self::Worker { k, .. } => Some(*k),
            _ => None,
        }
    }
}
