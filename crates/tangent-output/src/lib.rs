#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tangent/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod growth;
pub mod report;

pub use export::{ExportError, ExportFormat, Exporter};
pub use growth::{GrowthError, GrowthPoint, GrowthSeries, simulate_growth};
pub use report::{AllocationReport, AllocationRow, DroppedAsset};
