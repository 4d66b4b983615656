//! Applies a synthesized child set to the store.
//!
//! For every child, in [`ChildKind::APPLY_ORDER`]:
//!
//! 1. Attach the owner reference to the desired object.
//! 2. Fetch the observed object by name.
//! 3. Not found: create it. Found without drift: leave it. Found with drift:
//!    refresh labels and ownership, copy the checklist fields, update.
//!
//! Any store error aborts the rest of the pass. Children already written stay
//! written; the next pass picks up from whatever is observable.
//!
//! When a content child was updated under a workload that already existed
//! before this pass, the workload is rolled out so its pods re-read the
//! projected files.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use tracing::{debug, info};

use crate::child::{ChildKind, ChildResource};
use crate::error::ReconcileError;
use crate::owner::{owner_reference, set_owner};
use crate::rollout::force_rollout;
use crate::store::{ObjectKey, ResourceStore};

/// Desired children of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSet {
    pub config_map: Option<ConfigMap>,
    pub secret: Option<Secret>,
    pub deployment: Deployment,
    pub service: Option<Service>,
}

/// What happened to one child during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildOutcome {
    Created,
    Unchanged,
    Updated,
}

impl ChildOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unchanged => "unchanged",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for ChildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-pass summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Outcomes in the order the children were applied.
    pub children: Vec<(ChildKind, ChildOutcome)>,

    /// Set when the workload's rollout marker was rewritten.
    pub rolled_out: bool,
}

impl PassReport {
    pub fn record(&mut self, kind: ChildKind, outcome: ChildOutcome) {
        self.children.push((kind, outcome));
    }

    pub fn outcome(&self, kind: ChildKind) -> Option<ChildOutcome> {
        self.children
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| *outcome)
    }

    /// True when a config or secret store was patched.
    pub fn content_updated(&self) -> bool {
        self.children
            .iter()
            .any(|(kind, outcome)| kind.is_content() && *outcome == ChildOutcome::Updated)
    }

    /// A rollout is needed when content changed under a workload that was
    /// not created in this same pass. A fresh workload already reads the
    /// new content.
    pub fn needs_rollout(&self) -> bool {
        self.content_updated() && self.outcome(ChildKind::Workload) != Some(ChildOutcome::Created)
    }

    /// Number of creates and updates issued for children.
    pub fn writes(&self) -> usize {
        self.children
            .iter()
            .filter(|(_, outcome)| *outcome != ChildOutcome::Unchanged)
            .count()
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (kind, outcome)) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{kind}={outcome}")?;
        }
        if self.rolled_out {
            f.write_str(" rolled_out")?;
        }
        Ok(())
    }
}

/// Bring one child in line with `desired`.
pub async fn ensure<S, C>(
    store: &S,
    owner: &OwnerReference,
    mut desired: C,
) -> Result<ChildOutcome, ReconcileError>
where
    S: ResourceStore,
    C: ChildResource,
{
    set_owner(&mut desired, owner);
    let key = ObjectKey::of(&desired);

    let mut observed: C = match store.get(&key).await {
        Ok(observed) => observed,
        Err(err) if err.is_not_found() => {
            store.create(&desired).await?;
            info!(kind = %C::KIND, child = %key, "Created child");
            return Ok(ChildOutcome::Created);
        }
        Err(err) => return Err(err.into()),
    };

    let Some(field) = observed.drift(&desired) else {
        debug!(kind = %C::KIND, child = %key, "Child up to date");
        return Ok(ChildOutcome::Unchanged);
    };

    observed.meta_mut().labels = desired.meta().labels.clone();
    set_owner(&mut observed, owner);
    observed.converge(&desired);
    store.update(&observed).await?;
    info!(kind = %C::KIND, child = %key, field, "Patched drifted child");

    Ok(ChildOutcome::Updated)
}

/// Apply every child of `owner` in order, then roll out if needed.
pub async fn apply_children<S, O>(
    store: &S,
    owner: &O,
    children: ChildSet,
) -> Result<PassReport, ReconcileError>
where
    S: ResourceStore,
    O: Resource<DynamicType = ()>,
{
    let reference = owner_reference(owner)?;
    let workload = ObjectKey::of(&children.deployment);
    let ChildSet {
        mut config_map,
        mut secret,
        mut deployment,
        mut service,
    } = children;

    let mut report = PassReport::default();
    for kind in ChildKind::APPLY_ORDER {
        let outcome = match kind {
            ChildKind::ConfigStore => match config_map.take() {
                Some(cm) => ensure(store, &reference, cm).await?,
                None => continue,
            },
            ChildKind::SecretStore => match secret.take() {
                Some(s) => ensure(store, &reference, s).await?,
                None => continue,
            },
            ChildKind::Workload => {
                ensure(store, &reference, std::mem::take(&mut deployment)).await?
            }
            ChildKind::Service => match service.take() {
                Some(svc) => ensure(store, &reference, svc).await?,
                None => continue,
            },
        };
        report.record(kind, outcome);
    }

    if report.needs_rollout() {
        force_rollout(store, &workload).await?;
        report.rolled_out = true;
    }

    Ok(report)
}
