//! Record-store interface.
//!
//! Every platform read and write made by the engine goes through
//! [`ResourceStore`]. The handle is injected into the driver, so tests can
//! substitute [`crate::InMemoryStore`] for the Kubernetes-backed store.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// A namespaced object kind the store can read and write.
pub trait Managed:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Kind name, e.g. `Deployment`.
    fn kind_name() -> String {
        Self::kind(&()).into_owned()
    }
}

impl<K> Managed for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Namespace and name of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object. A missing namespace maps to the empty string.
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
        }
    }

    /// Key of a sibling object in the same namespace.
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Errors surfaced by a record store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: ObjectKey },

    /// Write against a stale resource version, or create of an existing name.
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: ObjectKey,
        message: String,
    },

    /// The caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The backing platform could not be reached or failed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the object itself.
    #[error("invalid object: {0}")]
    Invalid(String),

    /// The object could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Uniform access to desired-state records and child resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object by key.
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<K, StoreError>;

    /// Create an object; returns the stored copy.
    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError>;

    /// Replace an object. The store rejects stale resource versions.
    async fn update<K: Managed>(&self, obj: &K) -> Result<K, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    #[test]
    fn test_object_key_of_resource() {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some("hs-config".to_string()),
                namespace: Some("matrix".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let key = ObjectKey::of(&cm);
        assert_eq!(key, ObjectKey::new("matrix", "hs-config"));
        assert_eq!(key.to_string(), "matrix/hs-config");
        assert_eq!(key.sibling("hs"), ObjectKey::new("matrix", "hs"));
    }

    #[test]
    fn test_kind_name() {
        assert_eq!(ConfigMap::kind_name(), "ConfigMap");
    }
}
