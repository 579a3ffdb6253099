//! Ownership resolution between ClusterDeployments and ClusterInstances
//!
//! A ClusterDeployment points at its ClusterInstance through an owner
//! reference; a ClusterInstance points back through
//! `status.clusterDeploymentRef`. The first direction resolves which instance
//! to update, the second maps instance changes back onto deployment keys.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use tracing::info;

use siteconfig_common::crd::{ClusterDeployment, ClusterInstance};
use siteconfig_common::kube_utils::HasOwnerOfKind;
use siteconfig_common::Error;

use crate::controller::KubeClient;

/// Name of the ClusterInstance owning this ClusterDeployment, if any
pub fn cluster_instance_owner(cd: &ClusterDeployment) -> Option<&str> {
    cd.owner_of_kind(&ClusterInstance::kind(&()))
}

/// Whether a ClusterDeployment is owned by a ClusterInstance
///
/// Used to drop watch events for deployments this controller does not manage.
pub fn is_owned_by_cluster_instance(cd: &ClusterDeployment) -> bool {
    cluster_instance_owner(cd).is_some()
}

/// Fetch the ClusterInstance that owns a ClusterDeployment
///
/// Returns `Ok(None)` when the deployment has no ClusterInstance owner or the
/// owner no longer exists; both end the reconciliation without an error.
/// Any other API failure is propagated.
pub async fn resolve_cluster_instance(
    kube: &dyn KubeClient,
    cd: &ClusterDeployment,
) -> Result<Option<ClusterInstance>, Error> {
    let Some(owner) = cluster_instance_owner(cd) else {
        info!(
            cluster_deployment = %cd.name_any(),
            "ClusterInstance owner-reference not found for ClusterDeployment"
        );
        return Ok(None);
    };

    let namespace = cd
        .namespace()
        .ok_or_else(|| Error::missing_namespace(ClusterDeployment::kind(&()), cd.name_any()))?;

    match kube.get_cluster_instance(owner, &namespace).await? {
        Some(ci) => Ok(Some(ci)),
        None => {
            info!(cluster_instance = %owner, namespace = %namespace, "ClusterInstance not found");
            Ok(None)
        }
    }
}

/// Map a ClusterInstance to the ClusterDeployment recorded in its status
///
/// An unset or empty `clusterDeploymentRef` maps to nothing.
pub fn cluster_instance_to_deployment(ci: &ClusterInstance) -> Option<ObjectRef<ClusterDeployment>> {
    let name = ci.status.as_ref()?.cluster_deployment_name()?;
    let namespace = ci.namespace()?;
    Some(ObjectRef::new(name).within(&namespace))
}

/// Change fingerprint of a ClusterInstance for filtering its watch events
///
/// Covers the generation and the whole status except mirror probe times, so
/// any spec edit or foreign status write maps back to the deployment while a
/// write that only refreshed `lastProbeTime` does not.
pub fn cluster_instance_fingerprint(ci: &ClusterInstance) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    ci.metadata.generation.hash(&mut hasher);
    if let Some(status) = &ci.status {
        let mut status = status.clone();
        for condition in &mut status.deployment_conditions {
            condition.last_probe_time = None;
        }
        serde_json::to_string(&status).ok()?.hash(&mut hasher);
    }
    Some(hasher.finish())
}
