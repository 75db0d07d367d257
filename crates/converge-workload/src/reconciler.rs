//! Create-or-update reconciliation of a single Deployment
//!
//! The Reconciler converges the live workload to the desired-state document
//! with one mutating call: create when the workload is absent, full replace
//! when it exists. It performs no retries; any control-plane error is returned
//! with the step that produced it.

use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument};

use converge_common::Error;

use crate::client::WorkloadClient;
use crate::desired::{metadata_labels, template_labels, DesiredState};
use crate::selector::LabelSelector;

/// Which labels of the live object identify its pods
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelSource {
    /// Pod-template labels, for both create and update
    #[default]
    Template,
    /// Object metadata labels after a create, pod-template labels after an
    /// update. Only for parity with deploy scripts that relied on it.
    Legacy,
}

/// What Apply did to the live workload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyAction {
    /// The workload did not exist and was created
    Created,
    /// The workload existed and was replaced
    Updated,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyAction::Created => f.write_str("created"),
            ApplyAction::Updated => f.write_str("updated"),
        }
    }
}

/// Result of a successful Apply
#[derive(Clone, Debug, PartialEq)]
pub struct Applied {
    /// Workload name
    pub name: String,
    /// Whether the workload was created or replaced
    pub action: ApplyAction,
    /// Labels identifying the workload's pods
    pub selector: LabelSelector,
}

/// Reconciler settings
#[derive(Clone, Debug, Default)]
pub struct ReconcileConfig {
    /// Which labels to hand to the Waiter
    pub label_source: LabelSource,
}

/// Applies desired-state documents through a [`WorkloadClient`]
pub struct Reconciler {
    client: Arc<dyn WorkloadClient>,
    config: ReconcileConfig,
}

impl Reconciler {
    /// Create a reconciler over the given client
    pub fn new(client: Arc<dyn WorkloadClient>, config: ReconcileConfig) -> Self {
        Self { client, config }
    }

    /// Create the workload if absent, replace it if present, and return the
    /// labels that select its pods.
    #[instrument(
        skip(self, desired),
        fields(workload = %desired.name(), namespace = %desired.namespace())
    )]
    pub async fn apply(&self, desired: &DesiredState) -> Result<Applied, Error> {
        let namespace = desired.namespace();
        let name = desired.name();

        let existing = self
            .client
            .get_deployment(namespace, name)
            .await
            .map_err(|e| Error::step("get", name, e))?;

        let (action, live) = match existing {
            None => {
                info!("workload not found, creating");
                let created = self
                    .client
                    .create_deployment(namespace, desired.deployment())
                    .await
                    .map_err(|e| Error::step("create", name, e))?;
                (ApplyAction::Created, created)
            }
            Some(_) => {
                info!("workload exists, replacing");
                let replaced = self
                    .client
                    .replace_deployment(namespace, desired.deployment())
                    .await
                    .map_err(|e| Error::step("replace", name, e))?;
                (ApplyAction::Updated, replaced)
            }
        };

        let labels = match (self.config.label_source, action) {
            (LabelSource::Legacy, ApplyAction::Created) => metadata_labels(&live),
            _ => template_labels(&live),
        };
        if labels.is_empty() {
            return Err(Error::step(
                "select",
                name,
                Error::selector(format!(
                    "{} workload has no labels to select its pods by",
                    action
                )),
            ));
        }

        let selector = LabelSelector::new(labels);
        info!(%action, selector = %selector, "workload applied");

        Ok(Applied {
            name: name.to_string(),
            action,
            selector,
        })
    }
}
