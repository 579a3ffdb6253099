//! siteconfig operator - wiring for the ClusterDeployment status controller

pub mod config;
pub mod controller_runner;

pub use config::{ControllerArgs, EnvConfig, OperatorConfig, OsEnvConfig};
pub use controller_runner::build_deployment_controller;
