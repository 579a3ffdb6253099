//! Custom Resource views for the siteconfig operator

mod cluster_deployment;
mod cluster_instance;
mod conditions;
mod types;

pub use cluster_deployment::{
    ClusterDeployment, ClusterDeploymentSpec, ClusterDeploymentStatus, InstallConditionType,
};
pub use cluster_instance::{
    ClusterInstance, ClusterInstanceSpec, ClusterInstanceStatus, PROVISIONED_CONDITION,
};
pub use conditions::{ConditionRecord, ConditionSet, Transition};
pub use types::{Condition, ConditionStatus, DeploymentCondition, LocalObjectReference};
