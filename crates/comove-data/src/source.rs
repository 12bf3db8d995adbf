//! Boundaries to the external collaborators that supply prices, metadata and
//! projection coordinates.
//!
//! Acquisition from a market-data provider is not part of this crate. Sources
//! here read already materialized data: CSV files, or a long polars frame as
//! produced by a provider client.

use crate::error::{DataError, Result};
use crate::types::{CompanyMetadata, PriceObservation, ProjectionPoint};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Supplies adjusted price observations.
pub trait PriceSource {
    /// Load every price observation.
    fn load(&self) -> Result<Vec<PriceObservation>>;
}

/// Supplies descriptive company metadata.
pub trait MetadataSource {
    /// Load every metadata record.
    fn load(&self) -> Result<Vec<CompanyMetadata>>;
}

/// Supplies externally computed 2-D coordinates.
pub trait ProjectionPointSource {
    /// Load every projection point.
    fn load(&self) -> Result<Vec<ProjectionPoint>>;
}

impl PriceSource for Vec<PriceObservation> {
    fn load(&self) -> Result<Vec<PriceObservation>> {
        Ok(self.clone())
    }
}

impl MetadataSource for Vec<CompanyMetadata> {
    fn load(&self) -> Result<Vec<CompanyMetadata>> {
        Ok(self.clone())
    }
}

impl ProjectionPointSource for Vec<ProjectionPoint> {
    fn load(&self) -> Result<Vec<ProjectionPoint>> {
        Ok(self.clone())
    }
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;

    tracing::debug!(path = %path.display(), records = records.len(), "read csv");
    Ok(records)
}

/// CSV file with `symbol,date,adjusted_price` columns.
#[derive(Debug, Clone)]
pub struct CsvPriceFile {
    path: PathBuf,
}

impl CsvPriceFile {
    /// Create a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PriceSource for CsvPriceFile {
    fn load(&self) -> Result<Vec<PriceObservation>> {
        read_csv(&self.path)
    }
}

/// CSV file with `symbol,company,sector` columns.
#[derive(Debug, Clone)]
pub struct CsvMetadataFile {
    path: PathBuf,
}

impl CsvMetadataFile {
    /// Create a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetadataSource for CsvMetadataFile {
    fn load(&self) -> Result<Vec<CompanyMetadata>> {
        read_csv(&self.path)
    }
}

/// CSV file with `symbol,x,y` columns.
#[derive(Debug, Clone)]
pub struct CsvProjectionFile {
    path: PathBuf,
}

impl CsvProjectionFile {
    /// Create a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProjectionPointSource for CsvProjectionFile {
    fn load(&self) -> Result<Vec<ProjectionPoint>> {
        read_csv(&self.path)
    }
}

/// Convert a long quotes frame into price observations.
///
/// The frame needs a `symbol` string column, a `date` column (date or ISO
/// string) and a float `price_column`, typically `adjusted_close`.
pub fn prices_from_frame(df: &DataFrame, price_column: &str) -> Result<Vec<PriceObservation>> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|_| DataError::MissingColumn(name.to_string()))
    };

    let symbols = column("symbol")?.str()?;
    let dates = column("date")?.cast(&DataType::String)?;
    let dates = dates.str()?;
    let prices = column(price_column)?.cast(&DataType::Float64)?;
    let prices = prices.f64()?;

    let mut observations = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let symbol = symbols
            .get(i)
            .ok_or_else(|| DataError::Parse(format!("Missing symbol in row {i}")))?;
        let date = dates
            .get(i)
            .ok_or_else(|| DataError::Parse(format!("Missing date in row {i}")))?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| DataError::Parse(format!("Invalid date '{date}' in row {i}: {e}")))?;
        let price = prices
            .get(i)
            .ok_or_else(|| DataError::Parse(format!("Missing {price_column} in row {i}")))?;

        observations.push(PriceObservation::new(symbol, date, price));
    }

    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_csv_price_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "symbol,date,adjusted_close").unwrap();
        writeln!(file, "AAPL,2024-01-02,185.5").unwrap();
        writeln!(file, "AAPL,2024-01-03, 184.25").unwrap();

        let prices = CsvPriceFile::new(file.path()).load().unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].symbol, "AAPL");
        assert_eq!(prices[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(prices[1].adjusted_price, 184.25);
    }

    #[test]
    fn test_csv_metadata_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "symbol,company,sector").unwrap();
        writeln!(file, "XOM,Exxon Mobil,Energy").unwrap();

        let metadata = CsvMetadataFile::new(file.path()).load().unwrap();
        assert_eq!(metadata, vec![CompanyMetadata::new("XOM", "Exxon Mobil", "Energy")]);
    }

    #[test]
    fn test_csv_missing_file() {
        let err = CsvProjectionFile::new("/nonexistent/points.csv")
            .load()
            .unwrap_err();
        assert!(matches!(err, DataError::Csv(_)));
    }

    #[test]
    fn test_prices_from_frame() {
        let df = DataFrame::new(vec![
            Column::new("symbol".into(), vec!["MSFT", "MSFT"]),
            Column::new("date".into(), vec!["2024-01-02", "2024-01-03"]),
            Column::new("adjusted_close".into(), vec![370.0, 372.5]),
        ])
        .unwrap();

        let prices = prices_from_frame(&df, "adjusted_close").unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].adjusted_price, 372.5);
    }

    #[test]
    fn test_prices_from_frame_missing_column() {
        let df = DataFrame::new(vec![Column::new("symbol".into(), vec!["MSFT"])]).unwrap();

        let err = prices_from_frame(&df, "adjusted_close").unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(ref c) if c == "date"));
    }
}
