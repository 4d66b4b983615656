//! Web client record.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ChildNames;

/// Desired state of a Riot web client.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "matrix.synapse-operator.io",
    version = "v1alpha1",
    kind = "Riot",
    plural = "riots",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct RiotSpec {
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    pub image: String,

    /// Homeserver the client is meant for. Kept so existing manifests stay
    /// valid; the client reads its homeserver from `config`, so nothing
    /// synthesized depends on it.
    #[serde(default)]
    pub server_name: String,

    /// Contents of the client's `config.json`.
    #[serde(default)]
    pub config: String,
}

fn default_replicas() -> i32 {
    1
}

impl ChildNames for Riot {
    fn owner_name(&self) -> String {
        self.name_any()
    }
}
