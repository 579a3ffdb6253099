//! Shared setup for the integration tests

use std::time::Duration;

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, CustomResourceExt, Resource};

use siteconfig_common::crd::{ClusterDeployment, ClusterInstance};
use siteconfig_operator::{build_deployment_controller, OperatorConfig};

/// Namespace every test works in
pub const TEST_NAMESPACE: &str = "default";

/// Connect to the test cluster and make sure both CRDs are served
pub async fn ensure_test_cluster() -> Result<Client, String> {
    let client = Client::try_default()
        .await
        .map_err(|e| format!("failed to create client: {}", e))?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    for crd in [ClusterInstance::crd(), ClusterDeployment::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let existing = crds
            .get_opt(&name)
            .await
            .map_err(|e| format!("failed to look up CRD {}: {}", name, e))?;
        if existing.is_none() {
            crds.create(&PostParams::default(), &crd)
                .await
                .map_err(|e| format!("failed to create CRD {}: {}", name, e))?;
        }
    }

    wait_until_served::<ClusterInstance>(&client).await?;
    wait_until_served::<ClusterDeployment>(&client).await?;
    Ok(client)
}

async fn wait_until_served<K>(client: &Client) -> Result<(), String>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope>
        + Clone
        + serde::de::DeserializeOwned
        + std::fmt::Debug,
    <K as Resource>::DynamicType: Default,
{
    let api: Api<K> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    for _ in 0..30 {
        if api.list(&ListParams::default().limit(1)).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Err(format!("{} is not served", K::kind(&Default::default())))
}

/// Run the controller in the background for the duration of a test
pub fn spawn_controller(client: Client) -> tokio::task::JoinHandle<()> {
    let config = OperatorConfig {
        namespace: Some(TEST_NAMESPACE.to_string()),
        field_manager: "siteconfig-integration-test".to_string(),
        ..Default::default()
    };
    tokio::spawn(build_deployment_controller(client, &config))
}

/// Poll `check` once a second until it returns a value or `timeout` elapses
pub async fn eventually<T, F, Fut>(timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if let Some(value) = check().await {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    None
}

/// Delete a ClusterDeployment and ClusterInstance pair, ignoring errors
pub async fn cleanup(client: &Client, instance: &str, deployment: &str) {
    let cds: Api<ClusterDeployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let cis: Api<ClusterInstance> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = cds.delete(deployment, &DeleteParams::default()).await;
    let _ = cis.delete(instance, &DeleteParams::default()).await;
}
