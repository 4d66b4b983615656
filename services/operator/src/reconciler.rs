//! The reconcile entry point.
//!
//! One pass per invocation: load the record, synthesize its children, apply
//! them through the driver. The reconciler keeps no state between passes;
//! everything it needs is read back from the store.

use synop_reconcile::{apply_children, ObjectKey, Outcome, PassReport, ReconcileError, ResourceStore};
use tracing::{error, info, instrument, warn};

use crate::component::Component;

/// Runs reconciliation passes against an injected store.
pub struct Reconciler<S> {
    store: S,
}

impl<S: ResourceStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile the record of kind `C` at `key`.
    #[instrument(skip(self, key), fields(kind = C::NAME, record = %key))]
    pub async fn reconcile<C: Component>(&self, key: &ObjectKey) -> Outcome {
        let record: C = match self.store.get(key).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                info!("Record no longer exists, nothing to do");
                return Outcome::Absent;
            }
            Err(err) => {
                let outcome = Outcome::from_pass(Err(err.into()));
                log_outcome(&outcome);
                return outcome;
            }
        };

        let outcome = Outcome::from_pass(self.run_pass(&record).await);
        log_outcome(&outcome);
        outcome
    }

    async fn run_pass<C: Component>(&self, record: &C) -> Result<PassReport, ReconcileError> {
        let children = record.plan(&self.store).await?;
        apply_children(&self.store, record, children).await
    }
}

fn log_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Done(report) => info!(
            writes = report.writes(),
            rolled_out = report.rolled_out,
            children = %report,
            "Reconcile pass complete"
        ),
        Outcome::Absent => {}
        Outcome::Retry(err) => warn!(error = %err, "Reconcile pass failed, will retry"),
        Outcome::Fatal(err) => error!(error = %err, "Reconcile pass failed permanently"),
    }
}
