//! Controller runner - builds the ClusterDeployment controller future
//!
//! Construction is kept separate from `main` so the watch wiring can be
//! composed by the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::{future, StreamExt, TryStreamExt};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{reflector, watcher, Controller, WatchStreamExt};
use kube::{Api, Client, Resource};

use siteconfig_common::crd::{ClusterDeployment, ClusterInstance};
use siteconfig_deployment::controller::{error_policy, reconcile, Context};
use siteconfig_deployment::resolver::{
    cluster_instance_fingerprint, cluster_instance_to_deployment, is_owned_by_cluster_instance,
};

use crate::config::OperatorConfig;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Build the ClusterDeployment controller future
///
/// ClusterDeployments are watched through a reflector; only create/update
/// events for deployments owned by a ClusterInstance trigger a reconcile.
/// ClusterInstance changes are mapped back to the deployment recorded in
/// their `status.clusterDeploymentRef`, except writes that only refreshed
/// mirror probe times.
pub fn build_deployment_controller(
    client: Client,
    config: &OperatorConfig,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let ctx = Arc::new(
        Context::builder(client.clone())
            .field_manager(config.field_manager.clone())
            .reconcile_timeout(config.reconcile_timeout)
            .error_requeue(config.error_requeue)
            .build(),
    );

    let deployments: Api<ClusterDeployment> = scoped_api(&client, config.namespace.as_deref());
    let instances: Api<ClusterInstance> = scoped_api(&client, config.namespace.as_deref());

    let watcher_config = WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);

    let (reader, writer) = reflector::store();
    let owned_deployments = watcher(deployments, watcher_config.clone())
        .default_backoff()
        .reflect(writer)
        .applied_objects()
        .try_filter(|cd| future::ready(is_owned_by_cluster_instance(cd)));

    let instance_changes = watcher(instances, watcher_config)
        .default_backoff()
        .applied_objects()
        .predicate_filter(cluster_instance_fingerprint);

    tracing::info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        field_manager = %config.field_manager,
        "- {} controller",
        ClusterDeployment::kind(&())
    );

    Box::pin(
        Controller::for_stream(owned_deployments, reader)
            .watches_stream(instance_changes, |ci| cluster_instance_to_deployment(&ci))
            .shutdown_on_signal()
            .run(reconcile, error_policy, ctx)
            .for_each(log_reconcile_result("ClusterDeployment")),
    )
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Log the outcome of each reconciliation
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::warn!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
