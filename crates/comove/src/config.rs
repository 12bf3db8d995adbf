//! Pipeline configuration.

use crate::error::{PipelineError, Result};
use comove_cluster::{KMeansConfig, SweepConfig};
use comove_data::{FillPolicy, ReturnSeriesConfig};
use comove_embed::{PcaConfig, PcaProjection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of every pipeline stage.
///
/// Missing fields in a JSON document take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Return series construction
    pub returns: ReturnSeriesConfig,
    /// Handling of missing matrix cells (default: zero fill)
    pub fill_policy: FillPolicy,
    /// K-means engine
    pub kmeans: KMeansConfig,
    /// k range, workers and deadline of the sweep
    pub sweep: SweepConfig,
    /// Built-in PCA projection
    pub pca: PcaConfig,
    /// Exclude symbols with fewer than two prices instead of failing (default: true)
    pub skip_insufficient_history: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            returns: ReturnSeriesConfig::default(),
            fill_policy: FillPolicy::default(),
            kmeans: KMeansConfig::default(),
            sweep: SweepConfig::default(),
            pca: PcaConfig::default(),
            skip_insufficient_history: true,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.
    ///
    /// # Errors
    /// `ConfigIo` if the file cannot be read, `ConfigParse` if it is not a
    /// valid configuration document.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(PipelineError::ConfigIo)?;
        let config: Self = serde_json::from_str(&content).map_err(PipelineError::ConfigParse)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(PipelineError::ConfigParse)
    }

    /// Check every stage configuration.
    ///
    /// # Errors
    /// `Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        self.kmeans
            .validate()
            .map_err(|e| PipelineError::Config(format!("kmeans: {e}")))?;
        self.sweep
            .validate()
            .map_err(|e| PipelineError::Config(format!("sweep: {e}")))?;
        PcaProjection::new(self.pca.clone())
            .map_err(|e| PipelineError::Config(format!("pca: {e}")))?;
        Ok(())
    }
}
