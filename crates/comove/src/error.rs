//! Pipeline error types.

use comove_cluster::ClusterError;
use comove_data::DataError;
use comove_embed::EmbedError;
use comove_output::{ExportError, JoinError, ReportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage a failure originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Price to return conversion.
    Returns,
    /// Return matrix assembly.
    Matrix,
    /// Sweep over k.
    Sweep,
    /// Fit of the chosen k.
    Cluster,
    /// 2-D projection.
    Projection,
    /// Join with points and metadata.
    Join,
    /// Export and reports.
    Export,
    /// Configuration loading or validation.
    Config,
}

impl Stage {
    /// Lowercase stage name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Returns => "returns",
            Self::Matrix => "matrix",
            Self::Sweep => "sweep",
            Self::Cluster => "cluster",
            Self::Projection => "projection",
            Self::Join => "join",
            Self::Export => "export",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the pipeline, tagged with their stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Return series construction failed.
    #[error("returns stage: {0}")]
    Returns(#[source] DataError),

    /// Matrix assembly failed.
    #[error("matrix stage: {0}")]
    Matrix(#[source] DataError),

    /// The sweep could not start.
    #[error("sweep stage: {0}")]
    Sweep(#[source] ClusterError),

    /// Fitting the chosen k failed.
    #[error("cluster stage (k={k}): {source}")]
    Cluster {
        /// Requested cluster count
        k: usize,
        /// Underlying error
        #[source]
        source: ClusterError,
    },

    /// Projection failed.
    #[error("projection stage: {0}")]
    Projection(#[source] EmbedError),

    /// Join failed.
    #[error("join stage: {0}")]
    Join(#[source] JoinError),

    /// Export failed.
    #[error("export stage: {0}")]
    Export(#[source] ExportError),

    /// Report rendering or writing failed.
    #[error("export stage: {0}")]
    Report(#[source] ReportError),

    /// Configuration is invalid.
    #[error("config stage: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("config stage: {0}")]
    ConfigIo(#[source] std::io::Error),

    /// Configuration file is not valid JSON.
    #[error("config stage: {0}")]
    ConfigParse(#[source] serde_json::Error),
}

impl PipelineError {
    /// Stage the failure originated in.
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Returns(_) => Stage::Returns,
            Self::Matrix(_) => Stage::Matrix,
            Self::Sweep(_) => Stage::Sweep,
            Self::Cluster { .. } => Stage::Cluster,
            Self::Projection(_) => Stage::Projection,
            Self::Join(_) => Stage::Join,
            Self::Export(_) | Self::Report(_) => Stage::Export,
            Self::Config(_) | Self::ConfigIo(_) | Self::ConfigParse(_) => Stage::Config,
        }
    }

    /// Cluster count the failure refers to, if any.
    pub const fn k(&self) -> Option<usize> {
        match self {
            Self::Cluster { k, .. } => Some(*k),
            Self::Sweep(source) => source.k(),
            _ => None,
        }
    }

    /// Symbol the failure refers to, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            Self::Returns(source) | Self::Matrix(source) => source.symbol(),
            _ => None,
        }
    }
}

impl From<ExportError> for PipelineError {
    fn from(err: ExportError) -> Self {
        Self::Export(err)
    }
}

impl From<ReportError> for PipelineError {
    fn from(err: ReportError) -> Self {
        Self::Report(err)
    }
}

impl From<JoinError> for PipelineError {
    fn from(err: JoinError) -> Self {
        Self::Join(err)
    }
}

impl From<EmbedError> for PipelineError {
    fn from(err: EmbedError) -> Self {
        Self::Projection(err)
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
