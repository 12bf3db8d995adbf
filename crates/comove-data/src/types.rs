//! Input and intermediate records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Adjusted closing price of a symbol on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    /// Ticker symbol.
    pub symbol: String,
    /// Trading date.
    pub date: NaiveDate,
    /// Split/dividend adjusted price, must be positive.
    #[serde(alias = "adjusted_close", alias = "adjustedPrice")]
    pub adjusted_price: f64,
}

impl PriceObservation {
    /// Create a new price observation.
    pub fn new(symbol: impl Into<String>, date: NaiveDate, adjusted_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            adjusted_price,
        }
    }
}

/// Daily percentage return of a symbol, relative to its previous observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnObservation {
    /// Ticker symbol.
    pub symbol: String,
    /// Date of the later price in the pair.
    pub date: NaiveDate,
    /// `(p[i] - p[i-1]) / p[i-1]`.
    pub pct_return: f64,
}

impl ReturnObservation {
    /// Create a new return observation.
    pub fn new(symbol: impl Into<String>, date: NaiveDate, pct_return: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            pct_return,
        }
    }
}

/// Descriptive information about a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyMetadata {
    /// Ticker symbol.
    pub symbol: String,
    /// Company name.
    pub company: String,
    /// Sector label, free text.
    pub sector: String,
}

impl CompanyMetadata {
    /// Create a new metadata record.
    pub fn new(
        symbol: impl Into<String>,
        company: impl Into<String>,
        sector: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            company: company.into(),
            sector: sector.into(),
        }
    }
}

/// 2-D coordinates of a symbol produced by a projection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// Ticker symbol.
    pub symbol: String,
    /// First embedding coordinate.
    pub x: f64,
    /// Second embedding coordinate.
    pub y: f64,
}

impl ProjectionPoint {
    /// Create a new projection point.
    pub fn new(symbol: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            symbol: symbol.into(),
            x,
            y,
        }
    }
}
