//! Watch registration and requeue policy.
//!
//! One controller per record kind. Each watches its records plus the four
//! child kinds it owns, so a change to either side triggers a pass for the
//! owner. The worker controller also watches homeservers and re-triggers
//! every worker that references a changed one.
//!
//! The controller runtime never runs two passes for the same object at once
//! and coalesces triggers that arrive while a pass is running. Passes for
//! different objects run concurrently and share nothing but the client.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Api, Client};
use synop_api::{Riot, Synapse, SynapseWorker};
use synop_reconcile::{Managed, ObjectKey, Outcome, ReconcileError, RetryPolicy, RetryTracker};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::component::Component;
use crate::health::HealthState;
use crate::reconciler::Reconciler;
use crate::resolver;
use crate::store::KubeStore;

/// State shared by every pass of every controller.
pub struct Context {
    reconciler: Reconciler<KubeStore>,
    retries: Mutex<RetryTracker>,
}

impl Context {
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self {
            reconciler: Reconciler::new(KubeStore::new(client)),
            retries: Mutex::new(RetryTracker::new(retry)),
        }
    }

    fn tracker(&self) -> std::sync::MutexGuard<'_, RetryTracker> {
        self.retries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn retry_key<C: Component>(key: &ObjectKey) -> String {
    format!("{}/{}", C::NAME, key)
}

/// Map a pass outcome onto a controller action. Transient failures are
/// handed to [`error_policy`] for backoff.
async fn reconcile<C: Component>(record: Arc<C>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let key = ObjectKey::of(record.as_ref());
    match ctx.reconciler.reconcile::<C>(&key).await {
        Outcome::Done(_) | Outcome::Absent | Outcome::Fatal(_) => {
            ctx.tracker().clear(&retry_key::<C>(&key));
            Ok(Action::await_change())
        }
        Outcome::Retry(err) => Err(err),
    }
}

fn error_policy<C: Component>(record: Arc<C>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = retry_key::<C>(&ObjectKey::of(record.as_ref()));
    let delay = {
        let mut tracker = ctx.tracker();
        tracker.prune();
        tracker.record_failure(&key)
    };
    match delay {
        Some(delay) => {
            debug!(record = %key, error = %err, delay_secs = delay.as_secs(), "Requeueing");
            Action::requeue(delay)
        }
        None => {
            error!(record = %key, error = %err, "Retries exhausted, waiting for a change");
            Action::await_change()
        }
    }
}

fn api<K: Managed>(client: &Client, namespace: Option<&str>) -> Api<K> {
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Resolves once `true` is sent on the shutdown channel or the sender drops.
async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

/// Runs every controller until shutdown.
pub struct Operator {
    client: Client,
    namespace: Option<String>,
    ctx: Arc<Context>,
}

impl Operator {
    pub fn new(client: Client, namespace: Option<String>, retry: RetryPolicy) -> Self {
        Self {
            ctx: Arc::new(Context::new(client.clone(), retry)),
            client,
            namespace,
        }
    }

    fn owning_controller<C: Component>(&self) -> Controller<C> {
        let ns = self.namespace.as_deref();
        let cfg = watcher::Config::default();
        Controller::new(api::<C>(&self.client, ns), cfg.clone())
            .owns(api::<ConfigMap>(&self.client, ns), cfg.clone())
            .owns(api::<Secret>(&self.client, ns), cfg.clone())
            .owns(api::<Deployment>(&self.client, ns), cfg.clone())
            .owns(api::<Service>(&self.client, ns), cfg)
    }

    /// Run until `shutdown` fires. Marks `health` ready once the controllers
    /// are registered.
    pub async fn run(self, shutdown: watch::Receiver<bool>, health: HealthState) {
        let ns = self.namespace.as_deref();
        info!(namespace = ns.unwrap_or("<all>"), "Starting controllers");

        let synapses = self
            .owning_controller::<Synapse>()
            .graceful_shutdown_on(wait_for_shutdown(shutdown.clone()))
            .run(reconcile::<Synapse>, error_policy::<Synapse>, self.ctx.clone())
            .for_each(log_result::<Synapse>);

        let workers = self.owning_controller::<SynapseWorker>();
        let known = workers.store();
        let workers = workers
            .watches(
                api::<Synapse>(&self.client, ns),
                watcher::Config::default(),
                move |parent: Synapse| {
                    known
                        .state()
                        .into_iter()
                        .filter(|w| resolver::is_parent_of(&parent, w))
                        .map(|w| ObjectRef::from_obj(w.as_ref()))
                        .collect::<Vec<_>>()
                },
            )
            .graceful_shutdown_on(wait_for_shutdown(shutdown.clone()))
            .run(
                reconcile::<SynapseWorker>,
                error_policy::<SynapseWorker>,
                self.ctx.clone(),
            )
            .for_each(log_result::<SynapseWorker>);

        let riots = self
            .owning_controller::<Riot>()
            .graceful_shutdown_on(wait_for_shutdown(shutdown))
            .run(reconcile::<Riot>, error_policy::<Riot>, self.ctx.clone())
            .for_each(log_result::<Riot>);

        health.set_ready(true);
        tokio::join!(synapses, workers, riots);
        health.set_ready(false);
        info!("Controllers stopped");
    }
}

async fn log_result<C: Component>(
    result: Result<
        (ObjectRef<C>, Action),
        kube::runtime::controller::Error<ReconcileError, watcher::Error>,
    >,
) {
    match result {
        Ok((record, _)) => debug!(kind = C::NAME, record = %record, "Reconciled"),
        Err(kube::runtime::controller::Error::ReconcilerFailed(err, record)) => {
            debug!(kind = C::NAME, record = %record, error = %err, "Pass requeued")
        }
        Err(err) => warn!(kind = C::NAME, error = %err, "Controller error"),
    }
}
