//! Error types for projection.

use thiserror::Error;

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Errors that can occur while projecting rows to 2-D.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbedError {
    /// Nothing to project.
    #[error("Cannot project an empty matrix")]
    EmptyInput,

    /// Input matrix contains NaN or infinity.
    #[error("Non-finite value at row {row}, column {column}")]
    NonFiniteInput {
        /// Row of the offending cell
        row: usize,
        /// Column of the offending cell
        column: usize,
    },

    /// Row labels and matrix rows differ in number.
    #[error("Symbol count mismatch: {symbols} symbol(s) for {rows} row(s)")]
    SymbolCountMismatch {
        /// Number of symbols supplied
        symbols: usize,
        /// Number of matrix rows
        rows: usize,
    },

    /// The service returned a different number of points than input rows.
    #[error("{service} returned {actual} point(s) for {expected} row(s)")]
    RowCountMismatch {
        /// Service name
        service: String,
        /// Number of input rows
        expected: usize,
        /// Number of returned points
        actual: usize,
    },

    /// The service returned points that are not two-dimensional.
    #[error("{service} returned {actual}-dimensional points, expected 2")]
    WrongDimension {
        /// Service name
        service: String,
        /// Number of returned columns
        actual: usize,
    },

    /// The service returned a NaN or infinite coordinate.
    #[error("{service} returned a non-finite coordinate for row {row}")]
    NonFiniteOutput {
        /// Service name
        service: String,
        /// Row of the offending point
        row: usize,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
