//! Kubernetes-backed record store.

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;
use synop_reconcile::{Managed, ObjectKey, ResourceStore, StoreError};

/// [`ResourceStore`] over the Kubernetes API. Updates use replace semantics,
/// so the API server enforces the sent resource version.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: Managed>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<K, StoreError> {
        self.api::<K>(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| map_error::<K>(key, e))
    }

    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        self.api::<K>(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_error::<K>(&key, e))
    }

    async fn update<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let key = ObjectKey::of(obj);
        self.api::<K>(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| map_error::<K>(&key, e))
    }
}

/// Translate a client error into the store taxonomy.
pub(crate) fn map_error<K: Managed>(key: &ObjectKey, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(response) => match response.code {
            404 => StoreError::NotFound {
                kind: K::kind_name(),
                key: key.clone(),
            },
            409 => StoreError::Conflict {
                kind: K::kind_name(),
                key: key.clone(),
                message: response.message,
            },
            401 | 403 => StoreError::PermissionDenied(response.message),
            400 | 422 => StoreError::Invalid(response.message),
            code => StoreError::Unavailable(format!("{code}: {}", response.message)),
        },
        kube::Error::SerdeError(e) => StoreError::Serialization(e.to_string()),
        other => StoreError::Unavailable(other.to_string()),
    }
}
