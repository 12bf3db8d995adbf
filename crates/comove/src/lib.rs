#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/comove/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod pipeline;

// Re-export stage crates
pub use comove_cluster as cluster;
pub use comove_data as data;
pub use comove_embed as embed;
pub use comove_output as output;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result, Stage};
pub use pipeline::{Pipeline, ReturnStage};

// Re-export common types
pub use comove_cluster::{ClusterModel, KMeansConfig, SweepConfig, SweepResult};
pub use comove_data::{
    CompanyMetadata, CsvMetadataFile, CsvPriceFile, CsvProjectionFile, FillPolicy,
    MetadataSource, PriceObservation, PriceSource, ProjectionPoint, ProjectionPointSource,
    ReturnMatrix,
};
pub use comove_embed::{PcaConfig, PcaProjection, ProjectionService};
pub use comove_output::{
    ExportFormat, Exporter, ScreeReport, SegmentationReport, SegmentationResult,
    SegmentationTable,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
