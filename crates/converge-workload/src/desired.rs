//! Desired-state documents
//!
//! A desired-state document describes exactly one `apps/v1` Deployment. It is
//! read once, checked, bound to the target namespace, and handed to the
//! Reconciler.

use std::collections::BTreeMap;
use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use serde_json::Value;
use tracing::debug;

use converge_common::kube_utils::strip_server_metadata;
use converge_common::yaml::parse_single_document;
use converge_common::Error;

/// apiVersion of the only supported workload kind
pub const DEPLOYMENT_API_VERSION: &str = "apps/v1";
/// The only supported workload kind
pub const DEPLOYMENT_KIND: &str = "Deployment";

/// A decoded, validated Deployment bound to a namespace.
#[derive(Clone, Debug)]
pub struct DesiredState {
    name: String,
    namespace: String,
    deployment: Deployment,
}

impl DesiredState {
    /// Read and decode a desired-state document from disk
    pub fn from_file(path: &Path, namespace: &str) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        debug!(path = %path.display(), bytes = content.len(), "read desired-state document");
        Self::parse(&content, namespace)
    }

    /// Decode a YAML or JSON desired-state document
    pub fn parse(document: &str, namespace: &str) -> Result<Self, Error> {
        let mut value = parse_single_document(document)?;

        let api_version = value
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if api_version != DEPLOYMENT_API_VERSION || kind != DEPLOYMENT_KIND {
            return Err(Error::unsupported_kind(api_version, kind));
        }

        // Status is owned by the control plane and never written back
        if let Some(obj) = value.as_object_mut() {
            obj.remove("status");
        }

        let deployment: Deployment = serde_json::from_value(value)
            .map_err(|e| Error::serialization_for_kind(DEPLOYMENT_KIND, e.to_string()))?;
        Self::from_deployment(deployment, namespace)
    }

    /// Bind an already-typed Deployment to a namespace
    pub fn from_deployment(mut deployment: Deployment, namespace: &str) -> Result<Self, Error> {
        let name = deployment
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::validation_for_field(
                    "<unnamed>",
                    "metadata.name",
                    "desired state must name the workload",
                )
            })?;

        if let Some(ns) = deployment.metadata.namespace.as_deref() {
            if ns != namespace {
                return Err(Error::validation_for_field(
                    &name,
                    "metadata.namespace",
                    format!(
                        "document targets namespace {:?} but {:?} is configured",
                        ns, namespace
                    ),
                ));
            }
        }

        deployment.metadata.namespace = Some(namespace.to_string());
        strip_server_metadata(&mut deployment.metadata);
        deployment.status = None;

        Ok(Self {
            name,
            namespace: namespace.to_string(),
            deployment,
        })
    }

    /// Workload name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace the workload is applied to
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The Deployment to write
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }
}

/// Labels on a Deployment's pod template (empty if unset)
pub fn template_labels(deployment: &Deployment) -> BTreeMap<String, String> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.clone())
        .unwrap_or_default()
}

/// Labels on a Deployment's own metadata (empty if unset)
pub fn metadata_labels(deployment: &Deployment) -> BTreeMap<String, String> {
    deployment.metadata.labels.clone().unwrap_or_default()
}
