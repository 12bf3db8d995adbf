#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/comove/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decomposition;
pub mod error;
pub mod pca;

pub use error::{EmbedError, Result};
pub use pca::{PcaConfig, PcaProjection};

use comove_data::ProjectionPoint;
use ndarray::Array2;

/// A service embedding matrix rows into two coordinates.
///
/// Implementations must return an `n x 2` matrix for an `n`-row input, with
/// row `i` of the output corresponding to row `i` of the input.
pub trait ProjectionService: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Embed every row of `rows`.
    fn embed(&self, rows: &Array2<f64>) -> Result<Array2<f64>>;
}

/// Run `service` on `rows` and label the points with `symbols`.
///
/// # Errors
/// * `SymbolCountMismatch` if `symbols` and `rows` differ in length
/// * `RowCountMismatch`, `WrongDimension` or `NonFiniteOutput` if the service
///   breaks its output contract
pub fn project_points<S>(
    service: &S,
    symbols: &[String],
    rows: &Array2<f64>,
) -> Result<Vec<ProjectionPoint>>
where
    S: ProjectionService + ?Sized,
{
    if symbols.len() != rows.nrows() {
        return Err(EmbedError::SymbolCountMismatch {
            symbols: symbols.len(),
            rows: rows.nrows(),
        });
    }

    let coordinates = service.embed(rows)?;

    if coordinates.nrows() != rows.nrows() {
        return Err(EmbedError::RowCountMismatch {
            service: service.name().to_string(),
            expected: rows.nrows(),
            actual: coordinates.nrows(),
        });
    }
    if coordinates.ncols() != 2 {
        return Err(EmbedError::WrongDimension {
            service: service.name().to_string(),
            actual: coordinates.ncols(),
        });
    }
    if let Some(row) = coordinates
        .outer_iter()
        .position(|p| !p.iter().all(|v| v.is_finite()))
    {
        return Err(EmbedError::NonFiniteOutput {
            service: service.name().to_string(),
            row,
        });
    }

    tracing::info!(service = service.name(), points = symbols.len(), "projected rows");

    Ok(symbols
        .iter()
        .zip(coordinates.outer_iter())
        .map(|(symbol, p)| ProjectionPoint::new(symbol.clone(), p[0], p[1]))
        .collect())
}
