#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/comove/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod kmeans;
pub mod metrics;
pub mod model;
pub mod sweep;

// Re-export main types
pub use error::{ClusterError, Result};
pub use kmeans::{InitMethod, KMeansConfig, KMeansEngine, KMeansFit};
pub use model::ClusterModel;
pub use sweep::{ModelSweep, SweepConfig, SweepFailure, SweepPoint, SweepResult};
