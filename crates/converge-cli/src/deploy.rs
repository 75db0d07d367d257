//! The deploy command: apply the desired state, then wait for its pods.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use converge_common::kube_utils::{create_client, ClientOptions};
use converge_workload::{
    Applied, Convergence, ConvergenceWaiter, DesiredState, KubeWorkloadClient, Reconciler,
    WorkloadClient,
};

use crate::config::DeployConfig;
use crate::{Error, Result};

/// Decode the manifest, connect to the cluster, and deploy
pub async fn run(config: DeployConfig, cancel: CancellationToken) -> Result<()> {
    let desired =
        DesiredState::from_file(&config.manifest, &config.namespace).map_err(Error::Manifest)?;

    let client = create_client(&ClientOptions {
        kubeconfig: config.kubeconfig.as_deref(),
        context: config.context.as_deref(),
    })
    .await
    .map_err(Error::Client)?;

    let client: Arc<dyn WorkloadClient> = Arc::new(KubeWorkloadClient::new(client));
    execute(client, &desired, &config, cancel).await?;
    Ok(())
}

/// Apply `desired` and block until its pods are running
pub async fn execute(
    client: Arc<dyn WorkloadClient>,
    desired: &DesiredState,
    config: &DeployConfig,
    cancel: CancellationToken,
) -> Result<Convergence> {
    let reconciler = Reconciler::new(client.clone(), config.reconcile.clone());
    let applied: Applied = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(Error::Reconcile(converge_common::Error::cancelled(format!(
                "applying {}",
                desired.name()
            ))));
        }
        result = reconciler.apply(desired) => result.map_err(Error::Reconcile)?,
    };
    println!(
        "Deployment {} {}, pods selected by {}",
        applied.name, applied.action, applied.selector
    );

    let waiter = ConvergenceWaiter::new(client, config.wait.clone()).with_cancellation(cancel);
    let done = waiter
        .block(&applied.selector, |observed| {
            println!("Waiting for pods to run. {}", observed)
        })
        .await
        .map_err(Error::Wait)?;

    info!(workload = %applied.name, pods = done.total, "deployment converged");
    println!("All {} pods of {} are running", done.total, applied.name);
    Ok(done)
}
