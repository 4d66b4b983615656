//! Homeserver record.

use k8s_openapi::api::core::v1::{Volume, VolumeMount};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ChildNames;

/// Desired state of a Synapse homeserver.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "matrix.synapse-operator.io",
    version = "v1alpha1",
    kind = "Synapse",
    plural = "synapses",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct SynapseSpec {
    /// Container image reference.
    pub image: String,

    /// Matrix server name; used in projected key and log config file names.
    pub server_name: String,

    /// Number of homeserver replicas.
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Configuration payloads and extra volumes.
    #[serde(rename = "configuration", default)]
    pub config: SynapseConfig,

    /// Secret material projected into the pod.
    #[serde(default)]
    pub secrets: SynapseSecrets,

    /// Port assignments.
    #[serde(default)]
    pub ports: SynapsePorts,
}

fn default_replicas() -> i32 {
    1
}

/// Homeserver configuration files.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynapseConfig {
    /// Contents of `homeserver.yaml`.
    #[serde(default)]
    pub homeserver: String,

    /// Contents of the logging config.
    #[serde(default)]
    pub logging: String,

    /// User-declared volumes mounted into the homeserver and its workers.
    #[serde(default)]
    pub volumes: Vec<SynapseVolume>,
}

/// A user-declared volume together with where it is mounted.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SynapseVolume {
    pub volume: Volume,
    pub mount: VolumeMount,
}

/// TLS and signing key material.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynapseSecrets {
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub signing_key: String,
}

/// Homeserver listener ports.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SynapsePorts {
    #[serde(default)]
    pub http: i32,
    #[serde(default)]
    pub https: i32,
    #[serde(default)]
    pub replication: i32,
}

impl ChildNames for Synapse {
    fn owner_name(&self) -> String {
        self.name_any()
    }
}
