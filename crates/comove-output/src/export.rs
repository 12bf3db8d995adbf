//! Export of segmentation tables and sweep curves.

use crate::join::SegmentationTable;
use comove_cluster::{SweepPoint, SweepResult};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized CSV was not valid UTF-8.
    #[error("Invalid UTF-8 in output: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension (`.json` is pretty JSON).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            _ => Err(ExportError::InvalidFormat(format!(
                "cannot infer format from {}",
                path.display()
            ))),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "prettyjson" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "exported");
        Ok(())
    }
}

fn to_csv<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

impl Exporter for SegmentationTable {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => to_csv(self.rows()),
            ExportFormat::Json => Ok(serde_json::to_string(self.rows())?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self.rows())?),
        }
    }
}

/// Serializable view of a sweep outcome.
#[derive(Debug, Serialize)]
struct SweepExport<'a> {
    points: &'a [SweepPoint],
    failures: Vec<FailureExport>,
    pending: &'a [usize],
}

#[derive(Debug, Serialize)]
struct FailureExport {
    k: usize,
    error: String,
}

impl<'a> From<&'a SweepResult> for SweepExport<'a> {
    fn from(result: &'a SweepResult) -> Self {
        Self {
            points: result.points(),
            failures: result
                .failures()
                .iter()
                .map(|f| FailureExport {
                    k: f.k,
                    error: f.error.to_string(),
                })
                .collect(),
            pending: result.pending(),
        }
    }
}

impl Exporter for SweepResult {
    /// CSV holds only the curve points; JSON also lists failed and pending k.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => to_csv(self.points()),
            ExportFormat::Json => Ok(serde_json::to_string(&SweepExport::from(self))?),
            ExportFormat::PrettyJson => {
                Ok(serde_json::to_string_pretty(&SweepExport::from(self))?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_format_from_str(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_from_str_invalid() {
        assert!("parquet".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("out/segments.csv")).unwrap(),
            ExportFormat::Csv
        );
        assert_eq!(
            ExportFormat::from_path(&PathBuf::from("curve.json")).unwrap(),
            ExportFormat::PrettyJson
        );
        assert!(ExportFormat::from_path(&PathBuf::from("curve")).is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }
}
