//! Worker record. A worker is a composite component: it is synthesized from
//! its own record plus the homeserver it references.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ChildNames;

/// Desired state of a Synapse worker process.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "matrix.synapse-operator.io",
    version = "v1alpha1",
    kind = "SynapseWorker",
    plural = "synapseworkers",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct SynapseWorkerSpec {
    /// Number of worker replicas.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Name of the parent `Synapse` record in the same namespace.
    pub synapse: String,

    /// Worker application module, e.g. `synapse.app.generic_worker`.
    pub worker: String,

    /// Listener type, e.g. `http`.
    pub protocol: String,

    /// Listener port.
    pub port: i32,

    /// Resources served by the listener.
    #[serde(default)]
    pub resources: Vec<SynapseWorkerResource>,
}

fn default_replicas() -> i32 {
    1
}

/// A group of resource names served by a worker listener.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SynapseWorkerResource {
    pub names: Vec<String>,
}

impl ChildNames for SynapseWorker {
    fn owner_name(&self) -> String {
        self.name_any()
    }
}
