//! ClusterDeployment controller implementation
//!
//! Projects the install progress of a hive ClusterDeployment onto the status
//! of the ClusterInstance that owns it. Every pass recomputes the full mirror
//! and the Provisioned summary from the current ClusterDeployment and writes
//! back only what changed, in a single status merge patch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use siteconfig_common::crd::{
    ClusterDeployment, ClusterInstance, ClusterInstanceStatus, LocalObjectReference,
    PROVISIONED_CONDITION,
};
use siteconfig_common::kube_utils::{merge_patch_diff, object_key};
use siteconfig_common::{Error, DEFAULT_FIELD_MANAGER};

use crate::projector::project_install_conditions;
use crate::provisioned::{initialize_provisioned, update_provisioned, ProvisionedUpdate};
use crate::resolver::resolve_cluster_instance;

/// Deadline for a single reconciliation when none is configured
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Requeue delay after a retryable failure when none is configured
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Permanent errors are retried this many times slower than transient ones
const PERMANENT_ERROR_BACKOFF_FACTOR: u32 = 12;

/// Trait abstracting Kubernetes client operations for the ClusterDeployment controller
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a ClusterDeployment, `None` if it does not exist
    async fn get_cluster_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ClusterDeployment>, Error>;

    /// Get a ClusterInstance, `None` if it does not exist
    async fn get_cluster_instance(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ClusterInstance>, Error>;

    /// Apply a JSON merge patch to the status subresource of a ClusterInstance
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the ClusterInstance
    /// * `namespace` - Namespace of the ClusterInstance
    /// * `patch` - Full patch body, including any `metadata.resourceVersion` precondition
    async fn patch_cluster_instance_status(
        &self,
        name: &str,
        namespace: &str,
        patch: &Value,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
    field_manager: String,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_cluster_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ClusterDeployment>, Error> {
        let api: Api<ClusterDeployment> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(cd) => Ok(Some(cd)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_cluster_instance(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ClusterInstance>, Error> {
        let api: Api<ClusterInstance> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(ci) => Ok(Some(ci)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn patch_cluster_instance_status(
        &self,
        name: &str,
        namespace: &str,
        patch: &Value,
    ) -> Result<(), Error> {
        let api: Api<ClusterInstance> = Api::namespaced(self.client.clone(), namespace);
        let params = PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        api.patch_status(name, &params, &Patch::Merge(patch))
            .await?;
        Ok(())
    }
}

/// Controller context shared by every reconciliation
///
/// Use [`ContextBuilder`] to construct instances:
///
/// ```text
/// let ctx = Context::builder(client)
///     .field_manager("my-manager")
///     .reconcile_timeout(Duration::from_secs(10))
///     .build();
/// ```
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Deadline for one reconciliation, covering every API call it makes
    pub reconcile_timeout: Duration,
    /// Base requeue delay after a failed reconciliation
    pub error_requeue: Duration,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with a mock client
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>) -> Self {
        Self {
            kube,
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }
}

/// Builder for constructing [`Context`] instances
pub struct ContextBuilder {
    client: Client,
    field_manager: String,
    reconcile_timeout: Duration,
    error_requeue: Duration,
}

impl ContextBuilder {
    fn new(client: Client) -> Self {
        Self {
            client,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Field manager recorded on status patches
    pub fn field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Deadline for one reconciliation
    pub fn reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// Base requeue delay after a failure
    pub fn error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Build the Context
    pub fn build(self) -> Context {
        Context {
            kube: Arc::new(KubeClientImpl::new(self.client, self.field_manager)),
            reconcile_timeout: self.reconcile_timeout,
            error_requeue: self.error_requeue,
        }
    }
}

/// Reconcile a ClusterDeployment
///
/// The triggering object only supplies the key: the deployment is fetched
/// again so the projection works from the latest stored state. The whole pass
/// runs under the context's deadline; expiry is reported as a retryable
/// [`Error::Timeout`].
///
/// Returns `Action::await_change()` on success. The controller is purely
/// reactive and never schedules itself.
#[instrument(skip(cd, ctx), fields(cluster_deployment = %object_key(cd.as_ref())))]
pub async fn reconcile(cd: Arc<ClusterDeployment>, ctx: Arc<Context>) -> Result<Action, Error> {
    let name = cd.name_any();
    let namespace = cd
        .namespace()
        .ok_or_else(|| Error::missing_namespace(ClusterDeployment::kind(&()), name.as_str()))?;

    debug!("reconciling cluster deployment");

    match tokio::time::timeout(
        ctx.reconcile_timeout,
        reconcile_deployment(&name, &namespace, &ctx),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(
            format!("{}/{}", namespace, name),
            ctx.reconcile_timeout,
        )),
    }
}

async fn reconcile_deployment(name: &str, namespace: &str, ctx: &Context) -> Result<Action, Error> {
    let Some(cd) = ctx.kube.get_cluster_deployment(name, namespace).await? else {
        info!(cluster_deployment = %name, namespace = %namespace, "ClusterDeployment not found");
        return Ok(Action::await_change());
    };

    let Some(ci) = resolve_cluster_instance(ctx.kube.as_ref(), &cd).await? else {
        return Ok(Action::await_change());
    };

    let now = Utc::now().trunc_subsecs(0);
    let snapshot = ci.status.clone().unwrap_or_default();
    if snapshot.condition(PROVISIONED_CONDITION).is_none() {
        info!(
            cluster_instance = %ci.name_any(),
            cluster_deployment = %cd.name_any(),
            namespace = %namespace,
            "Initializing Provisioned condition"
        );
    }
    let desired = project_status(&cd, &snapshot, now);

    apply_status_patch(ctx.kube.as_ref(), &ci, &snapshot, &desired).await?;
    Ok(Action::await_change())
}

/// Compute the ClusterInstance status for the current ClusterDeployment state
///
/// Works on a copy of `snapshot`; the caller diffs the two to build the patch.
/// All timestamps written during this pass use `now`.
pub fn project_status(
    cd: &ClusterDeployment,
    snapshot: &ClusterInstanceStatus,
    now: DateTime<Utc>,
) -> ClusterInstanceStatus {
    let mut status = snapshot.clone();
    let cluster_deployment = cd.name_any();

    if status.cluster_deployment_name().is_none() {
        status.cluster_deployment_ref = Some(LocalObjectReference {
            name: cluster_deployment.clone(),
        });
    }

    let mut conditions = status.take_conditions();
    initialize_provisioned(&mut conditions, now);

    match update_provisioned(cd, &mut conditions, now) {
        ProvisionedUpdate::Set { state, transition } => {
            debug!(
                cluster_deployment = %cluster_deployment,
                state = state.reason(),
                ?transition,
                "evaluated Provisioned condition"
            );
        }
        ProvisionedUpdate::NoRuleMatched => {
            debug!(
                cluster_deployment = %cluster_deployment,
                "install signals matched no rule, keeping Provisioned condition"
            );
        }
        ProvisionedUpdate::MissingSignals(missing) => {
            let missing: Vec<&str> = missing.iter().map(|t| t.as_str()).collect();
            info!(
                cluster_deployment = %cluster_deployment,
                missing = ?missing,
                "Failed to extract condition(s)"
            );
        }
    }
    status.conditions = conditions.into_records();

    let mut mirror = status.take_deployment_conditions();
    project_install_conditions(&cd.condition_set(), &mut mirror, now);
    status.deployment_conditions = mirror.into_records();

    status
}

/// JSON merge patch taking the `status` of a ClusterInstance from `before` to `after`
///
/// `None` when the two are identical.
pub fn status_merge_patch(
    before: &ClusterInstanceStatus,
    after: &ClusterInstanceStatus,
) -> Result<Option<Value>, Error> {
    merge_patch_diff(before, after)
}

/// Write the status changes, if any, guarded by the snapshot's resourceVersion
///
/// Returns whether a patch was sent.
async fn apply_status_patch(
    kube: &dyn KubeClient,
    ci: &ClusterInstance,
    snapshot: &ClusterInstanceStatus,
    desired: &ClusterInstanceStatus,
) -> Result<bool, Error> {
    let Some(diff) = status_merge_patch(snapshot, desired)? else {
        debug!(cluster_instance = %ci.name_any(), "ClusterInstance status up to date");
        return Ok(false);
    };

    let name = ci.name_any();
    let namespace = ci
        .namespace()
        .ok_or_else(|| Error::missing_namespace(ClusterInstance::kind(&()), name.as_str()))?;

    let mut patch = json!({ "status": diff });
    if let Some(rv) = ci.resource_version() {
        patch["metadata"] = json!({ "resourceVersion": rv });
    }

    kube.patch_cluster_instance_status(&name, &namespace, &patch)
        .await?;
    info!(cluster_instance = %name, namespace = %namespace, "updated ClusterInstance status");
    Ok(true)
}

/// Error policy for the controller
///
/// Transient failures are retried after the configured delay; failures that
/// will not resolve on their own are retried much less often.
pub fn error_policy(cd: Arc<ClusterDeployment>, error: &Error, ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        if error.is_conflict() {
            warn!(cluster_deployment = %object_key(cd.as_ref()), "status patch conflicted, retrying");
        } else {
            error!(?error, cluster_deployment = %object_key(cd.as_ref()), "reconciliation failed");
        }
        Action::requeue(ctx.error_requeue)
    } else {
        error!(
            ?error,
            cluster_deployment = %object_key(cd.as_ref()),
            "reconciliation failed with non-retryable error"
        );
        Action::requeue(ctx.error_requeue * PERMANENT_ERROR_BACKOFF_FACTOR)
    }
}
