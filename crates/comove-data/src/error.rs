//! Error types for data operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while preparing price and return data.
#[derive(Debug, Error)]
pub enum DataError {
    /// Fewer than two price observations remain for a symbol after the cutoff.
    #[error("Insufficient history for {symbol}: {observations} observation(s) after cutoff, need at least 2")]
    InsufficientHistory {
        /// Symbol that was being processed
        symbol: String,
        /// Number of observations left after the cutoff
        observations: usize,
    },

    /// Nothing to assemble.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Adjusted price is zero, negative or not finite.
    #[error("Invalid price for {symbol} on {date}: {price}")]
    InvalidPrice {
        /// Symbol of the observation
        symbol: String,
        /// Date of the observation
        date: NaiveDate,
        /// Offending price
        price: f64,
    },

    /// Return value is not finite.
    #[error("Invalid return for {symbol} on {date}: {value}")]
    InvalidReturn {
        /// Symbol of the observation
        symbol: String,
        /// Date of the observation
        date: NaiveDate,
        /// Offending return
        value: f64,
    },

    /// Two observations share the same symbol and date.
    #[error("Duplicate observation for {symbol} on {date}")]
    DuplicateObservation {
        /// Symbol of the observation
        symbol: String,
        /// Date that appears twice
        date: NaiveDate,
    },

    /// Matrix parts do not fit together.
    #[error("Dimension mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    DimensionMismatch {
        /// Expected number of rows
        expected_rows: usize,
        /// Expected number of columns
        expected_cols: usize,
        /// Actual number of rows
        rows: usize,
        /// Actual number of columns
        cols: usize,
    },

    /// Row or column labels are not strictly ascending.
    #[error("Labels must be unique and sorted: {0}")]
    UnsortedLabels(String),

    /// A required column is absent from a frame or file.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    /// Symbol the error refers to, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::InsufficientHistory { symbol, .. }
            | Self::InvalidPrice { symbol, .. }
            | Self::InvalidReturn { symbol, .. }
            | Self::DuplicateObservation { symbol, .. } => Some(symbol),
            _ => None,
        }
    }
}
