//! Forced rollouts of a workload after its mounted content changed.

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use tracing::info;

use crate::error::ReconcileError;
use crate::store::{ObjectKey, ResourceStore};

/// Pod-template annotation rewritten to make the platform recycle pods.
pub const ROLLOUT_ANNOTATION: &str = "synapse-operator/force-rollout";

/// Marker value for a rollout requested at `at`.
pub fn rollout_marker(at: DateTime<Utc>) -> String {
    format!(
        "config changed at {}",
        at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    )
}

/// Current marker on a workload's pod template, if one was ever written.
pub fn rollout_marker_of(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(ROLLOUT_ANNOTATION)
        .map(String::as_str)
}

/// Rewrite the rollout marker on the workload at `key`.
///
/// Returns the marker that was written. A missing workload is an error:
/// the caller only asks for a rollout of a workload it saw in this pass.
pub async fn force_rollout<S>(store: &S, key: &ObjectKey) -> Result<String, ReconcileError>
where
    S: ResourceStore,
{
    let mut deployment: Deployment = match store.get(key).await {
        Ok(deployment) => deployment,
        Err(err) if err.is_not_found() => {
            return Err(ReconcileError::MissingWorkload(key.clone()));
        }
        Err(err) => return Err(err.into()),
    };

    let mut marker = rollout_marker(Utc::now());
    if rollout_marker_of(&deployment) == Some(marker.as_str()) {
        marker.push_str(" (again)");
    }

    let spec = deployment
        .spec
        .as_mut()
        .ok_or_else(|| ReconcileError::MissingWorkload(key.clone()))?;
    spec.template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ROLLOUT_ANNOTATION.to_string(), marker.clone());

    store.update(&deployment).await?;
    info!(workload = %key, marker = %marker, "Forced workload rollout");

    Ok(marker)
}
