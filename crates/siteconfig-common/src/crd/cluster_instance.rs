//! ClusterInstance CRD (partial view)
//!
//! A ClusterInstance describes the desired configuration of a cluster. This
//! operator only writes to three status fields; the rest of the resource is
//! owned by other controllers and read here as a partial view.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::ConditionSet;
use super::types::{Condition, DeploymentCondition, LocalObjectReference};

/// Condition type of the aggregate provisioning summary
pub const PROVISIONED_CONDITION: &str = "Provisioned";

/// ClusterInstance specification (fields relevant to status projection)
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "siteconfig.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ClusterInstance",
    namespaced,
    status = "ClusterInstanceStatus",
    printcolumn = r#"{"name":"ClusterName","type":"string","jsonPath":".spec.clusterName"}"#,
    printcolumn = r#"{"name":"Provisioned","type":"string","jsonPath":".status.conditions[?(@.type==\"Provisioned\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstanceSpec {
    /// Name of the cluster
    #[serde(default)]
    pub cluster_name: String,

    /// Base DNS domain of the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_domain: Option<String>,

    /// Name of the ClusterImageSet used to install the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_image_set_name_ref: Option<String>,
}

/// ClusterInstance status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInstanceStatus {
    /// The ClusterDeployment provisioned for this instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_deployment_ref: Option<LocalObjectReference>,

    /// Mirror of the ClusterDeployment install conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deployment_conditions: Vec<DeploymentCondition>,

    /// General-purpose conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ClusterInstanceStatus {
    /// Name of the referenced ClusterDeployment, if set and non-empty
    pub fn cluster_deployment_name(&self) -> Option<&str> {
        self.cluster_deployment_ref
            .as_ref()
            .map(|r| r.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Look up a general condition by type
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == condition_type)
    }

    /// Look up a mirrored deployment condition by type
    pub fn deployment_condition(&self, condition_type: &str) -> Option<&DeploymentCondition> {
        self.deployment_conditions
            .iter()
            .find(|c| c.type_ == condition_type)
    }

    /// Take the general conditions as a keyed set
    pub fn take_conditions(&mut self) -> ConditionSet<Condition> {
        ConditionSet::from_records(std::mem::take(&mut self.conditions))
    }

    /// Take the mirrored deployment conditions as a keyed set
    pub fn take_deployment_conditions(&mut self) -> ConditionSet<DeploymentCondition> {
        ConditionSet::from_records(std::mem::take(&mut self.deployment_conditions))
    }
}
