//! ClusterDeployment status projection for ClusterInstances
//!
//! This crate provides the controller that mirrors hive ClusterDeployment
//! install progress onto the owning ClusterInstance's status.
//!
//! - `resolver`: owner-reference lookup in both directions
//! - `projector`: mirrors the install conditions
//! - `provisioned`: derives the Provisioned summary condition
//! - `controller`: reconcile loop, context and Kubernetes client

pub mod controller;
pub mod projector;
pub mod provisioned;
pub mod resolver;

pub use controller::{
    error_policy, project_status, reconcile, status_merge_patch, Context, ContextBuilder,
    KubeClient, KubeClientImpl,
};
pub use resolver::{cluster_instance_to_deployment, is_owned_by_cluster_instance};

pub use siteconfig_common::{Error, Result};
