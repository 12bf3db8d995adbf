#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/comove/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod matrix;
pub mod returns;
pub mod source;
pub mod types;

pub use error::{DataError, Result};
pub use matrix::{FillPolicy, MatrixAssembler, ReturnMatrix};
pub use returns::{ReturnBatch, ReturnSeriesBuilder, ReturnSeriesConfig, reconstruct_prices};
pub use source::{
    CsvMetadataFile, CsvPriceFile, CsvProjectionFile, MetadataSource, PriceSource,
    ProjectionPointSource, prices_from_frame,
};
pub use types::{CompanyMetadata, PriceObservation, ProjectionPoint, ReturnObservation};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
