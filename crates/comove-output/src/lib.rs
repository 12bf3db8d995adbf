#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/comove/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod join;
pub mod report;

pub use export::{ExportError, ExportFormat, Exporter};
pub use join::{
    ClusterProjectionJoiner, ClusterSummary, JoinError, SegmentationResult, SegmentationTable,
};
pub use report::{ReportError, ScreeReport, ScreeRow, SegmentationReport};
