//! Cross-entity resolution for composite components.

use kube::ResourceExt;
use synop_api::{Synapse, SynapseWorker};
use synop_reconcile::{Managed, ObjectKey, ReconcileError, ResourceStore};
use tracing::debug;

/// Key of the homeserver a worker rides on. Parents are always looked up in
/// the worker's own namespace.
pub fn parent_key(worker: &SynapseWorker) -> Result<ObjectKey, ReconcileError> {
    let parent = worker.spec.synapse.trim();
    if parent.is_empty() {
        return Err(ReconcileError::MalformedRecord(format!(
            "worker {} does not name a homeserver",
            worker.name_any()
        )));
    }
    Ok(ObjectKey::of(worker).sibling(parent))
}

/// Whether `worker` rides on `parent`, by the same lookup rules as
/// [`resolve_parent`].
pub fn is_parent_of(parent: &Synapse, worker: &SynapseWorker) -> bool {
    parent_key(worker).is_ok_and(|key| key == ObjectKey::of(parent))
}

/// Fetch the homeserver record a worker references.
pub async fn resolve_parent<S: ResourceStore>(
    store: &S,
    worker: &SynapseWorker,
) -> Result<Synapse, ReconcileError> {
    let key = parent_key(worker)?;
    match store.get::<Synapse>(&key).await {
        Ok(parent) => {
            debug!(worker = %worker.name_any(), parent = %key, "Resolved parent homeserver");
            Ok(parent)
        }
        Err(err) if err.is_not_found() => Err(ReconcileError::ParentNotFound {
            kind: Synapse::kind_name(),
            key,
        }),
        Err(err) => Err(err.into()),
    }
}
