//! Record kinds the operator reconciles.

use async_trait::async_trait;
use synop_api::{ChildNames, Riot, Synapse, SynapseWorker};
use synop_reconcile::{ChildSet, Managed, ReconcileError, ResourceStore};

use crate::resolver::resolve_parent;
use crate::synth;

/// A desired-state record that owns a child set.
#[async_trait]
pub trait Component: Managed + ChildNames {
    /// Short name used in logs and retry keys.
    const NAME: &'static str;

    /// Synthesize the children this record should own. Composite components
    /// read their parent through `store`.
    async fn plan<S: ResourceStore>(&self, store: &S) -> Result<ChildSet, ReconcileError>;
}

#[async_trait]
impl Component for Synapse {
    const NAME: &'static str = "synapse";

    async fn plan<S: ResourceStore>(&self, _store: &S) -> Result<ChildSet, ReconcileError> {
        Ok(synth::synapse::children(self))
    }
}

#[async_trait]
impl Component for SynapseWorker {
    const NAME: &'static str = "worker";

    async fn plan<S: ResourceStore>(&self, store: &S) -> Result<ChildSet, ReconcileError> {
        let parent = resolve_parent(store, self).await?;
        synth::worker::children(self, &parent)
    }
}

#[async_trait]
impl Component for Riot {
    const NAME: &'static str = "riot";

    async fn plan<S: ResourceStore>(&self, _store: &S) -> Result<ChildSet, ReconcileError> {
        Ok(synth::riot::children(self))
    }
}
