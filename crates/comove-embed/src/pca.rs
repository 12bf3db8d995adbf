//! Linear 2-D projection by principal component analysis.
//!
//! For a matrix X with n rows and d columns, the rows are centred and the two
//! leading principal axes are extracted from whichever Gram matrix is
//! smaller:
//!
//! - d <= n: covariance C = Xc^T Xc / (n - 1), scores = Xc v
//! - d > n:  row Gram G = Xc Xc^T, scores = u sqrt(lambda)
//!
//! Both give the same scores up to sign. Each score column is then flipped so
//! that its largest-magnitude entry is positive, which makes the output
//! independent of the route and of the power-iteration start vector.

use crate::ProjectionService;
use crate::decomposition::leading_eigenpairs;
use crate::error::{EmbedError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// PCA projection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    /// Power-iteration cap per component (default: 1000)
    pub max_iterations: usize,
    /// Convergence tolerance on the eigenvector change (default: 1e-10)
    pub tolerance: f64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-10,
        }
    }
}

/// Built-in PCA projection service.
#[derive(Debug, Clone, Default)]
pub struct PcaProjection {
    config: PcaConfig,
}

impl PcaProjection {
    /// Create a new PCA projection.
    pub fn new(config: PcaConfig) -> Result<Self> {
        if config.max_iterations == 0 {
            return Err(EmbedError::InvalidParameter(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(config.tolerance.is_finite() && config.tolerance > 0.0) {
            return Err(EmbedError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                config.tolerance
            )));
        }
        Ok(Self { config })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &PcaConfig {
        &self.config
    }

    fn scores(&self, centered: &Array2<f64>) -> Array2<f64> {
        let (n, d) = centered.dim();
        if n < 2 || d == 0 {
            return Array2::zeros((n, 2));
        }

        let mut scores = if d <= n {
            self.covariance_scores(centered)
        } else {
            self.gram_scores(centered)
        };
        normalize_signs(&mut scores);
        scores
    }

    fn covariance_scores(&self, centered: &Array2<f64>) -> Array2<f64> {
        let n = centered.nrows();
        let covariance = centered.t().dot(centered) / (n as f64 - 1.0);

        let mut scores = Array2::zeros((n, 2));
        let pairs = leading_eigenpairs(
            &covariance,
            2,
            self.config.max_iterations,
            self.config.tolerance,
        );
        for (j, pair) in pairs.into_iter().enumerate() {
            if pair.value > 0.0 {
                scores.column_mut(j).assign(&centered.dot(&pair.vector));
            }
        }
        scores
    }

    fn gram_scores(&self, centered: &Array2<f64>) -> Array2<f64> {
        let n = centered.nrows();
        let gram = centered.dot(&centered.t());

        let mut scores = Array2::zeros((n, 2));
        let pairs = leading_eigenpairs(&gram, 2, self.config.max_iterations, self.config.tolerance);
        for (j, pair) in pairs.into_iter().enumerate() {
            scores
                .column_mut(j)
                .assign(&(pair.vector * pair.value.sqrt()));
        }
        scores
    }
}

impl ProjectionService for PcaProjection {
    fn name(&self) -> &str {
        "pca"
    }

    fn embed(&self, rows: &Array2<f64>) -> Result<Array2<f64>> {
        if rows.nrows() == 0 {
            return Err(EmbedError::EmptyInput);
        }
        if let Some(((row, column), _)) = rows.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(EmbedError::NonFiniteInput { row, column });
        }

        let Some(mean) = rows.mean_axis(Axis(0)) else {
            return Err(EmbedError::EmptyInput);
        };
        let centered = rows - &mean;

        tracing::debug!(rows = rows.nrows(), columns = rows.ncols(), "pca projection");
        Ok(self.scores(&centered))
    }
}

fn normalize_signs(scores: &mut Array2<f64>) {
    for mut column in scores.columns_mut() {
        let pivot = column
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            column.mapv_inplace(|v| -v);
        }
    }
}
