//! Control-plane client seam for workload reconciliation
//!
//! The Reconciler and the Convergence Waiter only talk to the API server
//! through [`WorkloadClient`], so tests can mock every call while production
//! uses [`KubeWorkloadClient`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use converge_common::kube_utils::is_not_found;
use converge_common::Error;

/// Trait abstracting the Kubernetes calls needed to apply a workload and
/// observe its pods.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    /// Get a Deployment by name. A 404 is `Ok(None)`; any other failure is `Err`.
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error>;

    /// Create a Deployment
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, Error>;

    /// Replace an existing Deployment wholesale (last writer wins)
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, Error>;

    /// List pods matching a label selector string (e.g. `app=web`)
    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, Error>;
}

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeWorkloadClient {
    client: Client,
}

impl KubeWorkloadClient {
    /// Create a new KubeWorkloadClient wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WorkloadClient for KubeWorkloadClient {
    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        match self.deployments(namespace).get(name).await {
            Ok(deployment) => Ok(Some(deployment)),
            Err(e) if is_not_found(&e) => {
                trace!(namespace, name, "deployment not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, Error> {
        let created = self
            .deployments(namespace)
            .create(&PostParams::default(), deployment)
            .await?;
        debug!(namespace, name = ?created.metadata.name, "created deployment");
        Ok(created)
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, Error> {
        let name = deployment.metadata.name.as_deref().ok_or_else(|| {
            Error::internal_with_context("replace_deployment", "deployment has no name")
        })?;
        let replaced = self
            .deployments(namespace)
            .replace(name, &PostParams::default(), deployment)
            .await?;
        debug!(
            namespace,
            name,
            resource_version = ?replaced.metadata.resource_version,
            "replaced deployment"
        );
        Ok(replaced)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<Pod>, Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default().labels(selector)).await?;
        Ok(list.items)
    }
}
