//! Desired-state records managed by the synapse operator.
//!
//! Each record describes one component instance of a Matrix deployment:
//!
//! - [`Synapse`]: the homeserver itself
//! - [`SynapseWorker`]: a worker process riding on a homeserver
//! - [`Riot`]: the web client
//!
//! The records are namespaced custom resources in the
//! `matrix.synapse-operator.io/v1alpha1` group. Their child resources are
//! named by the fixed suffixes in [`ChildNames`].

use std::collections::BTreeMap;

mod riot;
mod synapse;
mod worker;

pub use riot::{Riot, RiotSpec};
pub use synapse::{
    Synapse, SynapseConfig, SynapsePorts, SynapseSecrets, SynapseSpec, SynapseVolume,
};
pub use worker::{SynapseWorker, SynapseWorkerResource, SynapseWorkerSpec};

/// API group of every record kind.
pub const API_GROUP: &str = "matrix.synapse-operator.io";

/// API version of every record kind.
pub const API_VERSION: &str = "v1alpha1";

/// Label key used for the workload selector.
pub const APP_LABEL: &str = "app";

/// Names of the child resources derived from an owning record.
///
/// Every name is a pure function of the owner's name, so it is stable across
/// reconciliation passes and process restarts.
pub trait ChildNames {
    /// Name of the owning record.
    fn owner_name(&self) -> String;

    /// Config store name.
    fn config_map_name(&self) -> String {
        format!("{}-config", self.owner_name())
    }

    /// Secret store name.
    fn secret_name(&self) -> String {
        format!("{}-secret", self.owner_name())
    }

    /// Workload name.
    fn deployment_name(&self) -> String {
        self.owner_name()
    }

    /// Pod template name inside the workload.
    fn pod_name(&self) -> String {
        format!("{}-pod", self.owner_name())
    }

    /// Network-exposing service name.
    fn service_name(&self) -> String {
        format!("{}-service", self.owner_name())
    }

    /// The single `app=<name>` label shared by every child and the selector.
    fn app_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL.to_string(), self.owner_name())])
    }
}
