//! ClusterDeployment CRD (partial, read-only view)
//!
//! ClusterDeployments are created by the ClusterInstance rendering pipeline and
//! driven by the installer. This operator never writes them; it only reads the
//! `installed` flag and the install conditions.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::ConditionSet;
use super::types::DeploymentCondition;

/// Install condition types mirrored from a ClusterDeployment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstallConditionType {
    /// Prerequisites for the install are met
    RequirementsMet,
    /// The install finished successfully
    Completed,
    /// The install failed
    Failed,
    /// The install process is no longer running
    Stopped,
}

impl InstallConditionType {
    /// All mirrored types, in the order they are first inserted into the mirror
    pub const ALL: [InstallConditionType; 4] = [
        InstallConditionType::RequirementsMet,
        InstallConditionType::Completed,
        InstallConditionType::Failed,
        InstallConditionType::Stopped,
    ];

    /// Wire name of the condition type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequirementsMet => "ClusterInstallRequirementsMet",
            Self::Completed => "ClusterInstallCompleted",
            Self::Failed => "ClusterInstallFailed",
            Self::Stopped => "ClusterInstallStopped",
        }
    }
}

impl std::fmt::Display for InstallConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ClusterDeployment specification (fields relevant to status projection)
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "hive.openshift.io",
    version = "v1",
    kind = "ClusterDeployment",
    namespaced,
    status = "ClusterDeploymentStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentSpec {
    /// Name of the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,

    /// Set by the installer once the cluster has been installed
    #[serde(default)]
    pub installed: bool,
}

/// ClusterDeployment status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeploymentStatus {
    /// Conditions reported by the installer
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<DeploymentCondition>,
}

impl ClusterDeployment {
    /// Whether the installer has declared the cluster installed
    pub fn is_installed(&self) -> bool {
        self.spec.installed
    }

    /// Reported conditions as a keyed set
    pub fn condition_set(&self) -> ConditionSet<DeploymentCondition> {
        ConditionSet::from_records(
            self.status
                .as_ref()
                .map(|s| s.conditions.clone())
                .unwrap_or_default(),
        )
    }
}
