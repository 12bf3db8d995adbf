//! Dense symbol x date return matrix.
//!
//! Rows are symbols in lexicographic order, columns are the sorted union of
//! every date observed across all symbols. Because both axes are sorted, the
//! assembled matrix does not depend on the order of the input observations.

use crate::error::{DataError, Result};
use crate::types::ReturnObservation;
use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// How cells without an observation are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Absent (symbol, date) pairs are treated as a zero return.
    #[default]
    Zero,
    /// Symbols missing any date of the union are dropped.
    DropIncomplete,
}

/// Return matrix with symbol rows and date columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnMatrix {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    values: Array2<f64>,
}

impl ReturnMatrix {
    /// Create a matrix from its parts.
    ///
    /// # Errors
    /// Returns an error if `values` is not `symbols.len() x dates.len()` or if
    /// either label axis is not strictly ascending.
    pub fn new(symbols: Vec<String>, dates: Vec<NaiveDate>, values: Array2<f64>) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != symbols.len() || cols != dates.len() {
            return Err(DataError::DimensionMismatch {
                expected_rows: symbols.len(),
                expected_cols: dates.len(),
                rows,
                cols,
            });
        }
        if symbols.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataError::UnsortedLabels("symbols".to_string()));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(DataError::UnsortedLabels("dates".to_string()));
        }

        Ok(Self {
            symbols,
            dates,
            values,
        })
    }

    /// Row labels.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Column labels.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Numeric part of the matrix, without labels.
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of symbols (rows).
    pub fn n_symbols(&self) -> usize {
        self.symbols.len()
    }

    /// Number of dates (columns).
    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    /// Row index of a symbol.
    pub fn row_index(&self, symbol: &str) -> Option<usize> {
        self.symbols
            .binary_search_by(|s| s.as_str().cmp(symbol))
            .ok()
    }

    /// Return vector of a symbol.
    pub fn row(&self, symbol: &str) -> Option<ArrayView1<'_, f64>> {
        self.row_index(symbol).map(|i| self.values.row(i))
    }

    /// Single cell lookup.
    pub fn get(&self, symbol: &str, date: NaiveDate) -> Option<f64> {
        let row = self.row_index(symbol)?;
        let col = self.dates.binary_search(&date).ok()?;
        Some(self.values[[row, col]])
    }

    /// Wide polars frame: a `symbol` column followed by one column per date.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.dates.len() + 1);
        columns.push(Column::new("symbol".into(), self.symbols.clone()));

        for (j, date) in self.dates.iter().enumerate() {
            let name = date.format("%Y-%m-%d").to_string();
            columns.push(Column::new(name.into(), self.values.column(j).to_vec()));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Pivots long-format returns into a [`ReturnMatrix`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MatrixAssembler {
    policy: FillPolicy,
}

impl MatrixAssembler {
    /// Create an assembler with the given fill policy.
    pub const fn new(policy: FillPolicy) -> Self {
        Self { policy }
    }

    /// Get the fill policy.
    pub const fn policy(&self) -> FillPolicy {
        self.policy
    }

    /// Assemble the matrix.
    ///
    /// # Errors
    /// * `EmptyInput` if `returns` is empty, or every symbol was dropped
    /// * `DuplicateObservation` if a (symbol, date) pair occurs twice
    /// * `InvalidReturn` if a return is not finite
    pub fn assemble(&self, returns: &[ReturnObservation]) -> Result<ReturnMatrix> {
        if returns.is_empty() {
            return Err(DataError::EmptyInput(
                "no return observations to assemble".to_string(),
            ));
        }

        let mut rows: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut all_dates: BTreeSet<NaiveDate> = BTreeSet::new();

        for obs in returns {
            if !obs.pct_return.is_finite() {
                return Err(DataError::InvalidReturn {
                    symbol: obs.symbol.clone(),
                    date: obs.date,
                    value: obs.pct_return,
                });
            }
            let previous = rows
                .entry(obs.symbol.as_str())
                .or_default()
                .insert(obs.date, obs.pct_return);
            if previous.is_some() {
                return Err(DataError::DuplicateObservation {
                    symbol: obs.symbol.clone(),
                    date: obs.date,
                });
            }
            all_dates.insert(obs.date);
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();

        if self.policy == FillPolicy::DropIncomplete {
            rows.retain(|symbol, cells| {
                let complete = cells.len() == dates.len();
                if !complete {
                    tracing::warn!(
                        symbol,
                        observed = cells.len(),
                        expected = dates.len(),
                        "dropping symbol with incomplete history"
                    );
                }
                complete
            });
            if rows.is_empty() {
                return Err(DataError::EmptyInput(
                    "every symbol has an incomplete history".to_string(),
                ));
            }
        }

        let date_index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(j, d)| (*d, j)).collect();

        let mut values = Array2::<f64>::zeros((rows.len(), dates.len()));
        let mut symbols = Vec::with_capacity(rows.len());

        for (i, (symbol, cells)) in rows.into_iter().enumerate() {
            for (date, value) in cells {
                values[[i, date_index[&date]]] = value;
            }
            symbols.push(symbol.to_string());
        }

        tracing::info!(
            symbols = symbols.len(),
            dates = dates.len(),
            policy = ?self.policy,
            "assembled return matrix"
        );

        ReturnMatrix::new(symbols, dates, values)
    }
}
