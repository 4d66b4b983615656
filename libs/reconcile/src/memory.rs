//! In-memory record store.
//!
//! Behaves like a minimal API server: it assigns uids, bumps resource
//! versions, rejects writes against stale versions and fills in a few
//! server-populated fields (deployment status, service cluster IP) that the
//! engine must never compare or clobber. Every create and update is appended
//! to a write log so tests can count platform calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::store::{Managed, ObjectKey, ResourceStore, StoreError};

/// Kind of write recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteVerb {
    Create,
    Update,
}

/// One logged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub verb: WriteVerb,
    pub kind: String,
    pub key: ObjectKey,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<(String, ObjectKey), Value>,
    writes: Vec<WriteRecord>,
    failures: BTreeMap<String, StoreError>,
    next_uid: u64,
    next_ip: u8,
}

/// Thread-safe in-memory [`ResourceStore`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an object without logging a write. Used to arrange pre-existing
    /// cluster state.
    pub fn seed<K: Managed>(&self, obj: K) -> Result<K, StoreError> {
        let mut inner = self.lock();
        inner.insert_new(&obj)
    }

    /// Read an object without going through the async interface.
    pub fn peek<K: Managed>(&self, key: &ObjectKey) -> Option<K> {
        let inner = self.lock();
        inner
            .objects
            .get(&(K::kind_name(), key.clone()))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Snapshot of the write log.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    /// Writes of one kind.
    pub fn writes_of<K: Managed>(&self) -> Vec<WriteRecord> {
        let kind = K::kind_name();
        self.lock()
            .writes
            .iter()
            .filter(|w| w.kind == kind)
            .cloned()
            .collect()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Make every subsequent write of kind `K` fail with `error`.
    pub fn fail_writes<K: Managed>(&self, error: StoreError) {
        self.lock().failures.insert(K::kind_name(), error);
    }

    /// Drop every failure injected with [`InMemoryStore::fail_writes`].
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Remove an object, as the platform's garbage collector would.
    pub fn remove<K: Managed>(&self, key: &ObjectKey) -> bool {
        self.lock()
            .objects
            .remove(&(K::kind_name(), key.clone()))
            .is_some()
    }
}

impl Inner {
    fn check_failure(&self, kind: &str) -> Result<(), StoreError> {
        match self.failures.get(kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn insert_new<K: Managed>(&mut self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let key = key_of(obj)?;
        if self.objects.contains_key(&(kind.clone(), key.clone())) {
            return Err(StoreError::Conflict {
                kind,
                key,
                message: "already exists".to_string(),
            });
        }

        self.next_uid += 1;
        let mut obj = obj.clone();
        let meta = obj.meta_mut();
        meta.uid = Some(format!("uid-{:04}", self.next_uid));
        meta.resource_version = Some("1".to_string());
        meta.generation = Some(1);

        let mut value = to_value(&obj)?;
        self.populate_server_fields(&kind, &mut value, None);
        let stored = from_value(value.clone())?;
        self.objects.insert((kind, key), value);
        Ok(stored)
    }

    /// Fill in fields the platform owns. `previous` is the stored copy on
    /// update; its server-owned fields win over whatever the client sent.
    fn populate_server_fields(&mut self, kind: &str, value: &mut Value, previous: Option<&Value>) {
        match kind {
            "Deployment" => {
                let generation = value
                    .pointer("/metadata/generation")
                    .cloned()
                    .unwrap_or(Value::from(1));
                value["status"] = serde_json::json!({ "observedGeneration": generation });
            }
            "Service" => {
                let ip = previous
                    .and_then(|p| p.pointer("/spec/clusterIP").cloned())
                    .unwrap_or_else(|| {
                        self.next_ip = self.next_ip.wrapping_add(1);
                        Value::from(format!("10.96.0.{}", self.next_ip))
                    });
                if let Some(spec) = value.get_mut("spec").and_then(Value::as_object_mut) {
                    spec.insert("clusterIP".to_string(), ip);
                }
            }
            _ => {}
        }
    }
}

fn key_of<K: Managed>(obj: &K) -> Result<ObjectKey, StoreError> {
    let meta = obj.meta();
    let name = meta
        .name
        .clone()
        .ok_or_else(|| StoreError::Invalid(format!("{} without a name", K::kind_name())))?;
    let namespace = meta
        .namespace
        .clone()
        .ok_or_else(|| StoreError::Invalid(format!("{} {name} without a namespace", K::kind_name())))?;
    Ok(ObjectKey { namespace, name })
}

fn to_value<K: Managed>(obj: &K) -> Result<Value, StoreError> {
    serde_json::to_value(obj).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn from_value<K: Managed>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get<K: Managed>(&self, key: &ObjectKey) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let inner = self.lock();
        match inner.objects.get(&(kind.clone(), key.clone())) {
            Some(value) => from_value(value.clone()),
            None => Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            }),
        }
    }

    async fn create<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let mut inner = self.lock();
        inner.check_failure(&kind)?;
        let stored = inner.insert_new(obj)?;
        let key = key_of(&stored)?;
        debug!(kind = %kind, key = %key, "[MEMORY] created");
        inner.writes.push(WriteRecord {
            verb: WriteVerb::Create,
            kind,
            key,
        });
        Ok(stored)
    }

    async fn update<K: Managed>(&self, obj: &K) -> Result<K, StoreError> {
        let kind = K::kind_name();
        let key = key_of(obj)?;
        let mut inner = self.lock();
        inner.check_failure(&kind)?;

        let Some(previous) = inner.objects.get(&(kind.clone(), key.clone())).cloned() else {
            return Err(StoreError::NotFound { kind, key });
        };

        let stored_version: u64 = previous
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if let Some(sent) = obj.meta().resource_version.as_deref() {
            if sent != stored_version.to_string() {
                return Err(StoreError::Conflict {
                    kind,
                    key,
                    message: format!("resource version {sent} is stale (current {stored_version})"),
                });
            }
        }

        let mut obj = obj.clone();
        let meta = obj.meta_mut();
        meta.uid = previous
            .pointer("/metadata/uid")
            .and_then(Value::as_str)
            .map(str::to_string);
        meta.resource_version = Some((stored_version + 1).to_string());
        let generation = previous
            .pointer("/metadata/generation")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        meta.generation = Some(generation + 1);

        let mut value = to_value(&obj)?;
        inner.populate_server_fields(&kind, &mut value, Some(&previous));
        let stored = from_value(value.clone())?;
        inner.objects.insert((kind.clone(), key.clone()), value);
        debug!(kind = %kind, key = %key, "[MEMORY] updated");
        inner.writes.push(WriteRecord {
            verb: WriteVerb::Update,
            kind,
            key,
        });
        Ok(stored)
    }
}
