//! Workload reconciliation for converge
//!
//! - [`DesiredState`]: a decoded, validated Deployment bound to a namespace
//! - [`Reconciler`]: creates or replaces the workload and reports its pod labels
//! - [`ConvergenceWaiter`]: polls the labelled pods until all are running

#![deny(missing_docs)]

pub mod client;
pub mod desired;
pub mod reconciler;
pub mod selector;
pub mod waiter;

pub use client::{KubeWorkloadClient, WorkloadClient};
pub use desired::DesiredState;
pub use reconciler::{Applied, ApplyAction, LabelSource, ReconcileConfig, Reconciler};
pub use selector::LabelSelector;
pub use waiter::{Convergence, ConvergenceWaiter, WaitConfig, WaitState};
