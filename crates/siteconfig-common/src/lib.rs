//! Common types for siteconfig: CRD views, condition helpers, errors and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default field manager for status patches written by this operator
pub const DEFAULT_FIELD_MANAGER: &str = "siteconfig-clusterdeployment-reconciler";
