//! Worker children. A worker mounts its parent homeserver's dependent
//! volumes plus its own generated `worker.yaml`.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Container, Service};
use serde::Serialize;
use synop_api::{ChildNames, Synapse, SynapseWorker};
use synop_reconcile::{ChildSet, ReconcileError};

use super::common;
use super::synapse::{dependent_volumes, HOMESERVER_CONFIG_PATH};

pub const CONTAINER_NAME: &str = "worker";
pub const HEALTH_PATH: &str = "/health";
pub const LIVENESS_DELAY_SECONDS: i32 = 60;

pub const WORKER_CONFIG_KEY: &str = "worker.yaml";
pub const WORKER_CONFIG_DIR: &str = "/worker-config";

/// Rendered `worker.yaml`.
#[derive(Debug, Serialize)]
struct WorkerConfigFile<'a> {
    worker_app: &'a str,
    worker_replication_host: String,
    worker_replication_port: i32,
    worker_listeners: Vec<WorkerListener<'a>>,
}

#[derive(Debug, Serialize)]
struct WorkerListener<'a> {
    #[serde(rename = "type")]
    protocol: &'a str,
    port: i32,
    resources: Vec<ListenerResources<'a>>,
}

#[derive(Debug, Serialize)]
struct ListenerResources<'a> {
    names: &'a [String],
}

/// Render the worker's config file. Replication goes through the parent's
/// service.
pub fn render_config(worker: &SynapseWorker, parent: &Synapse) -> Result<String, ReconcileError> {
    let spec = &worker.spec;
    let file = WorkerConfigFile {
        worker_app: &spec.worker,
        worker_replication_host: parent.service_name(),
        worker_replication_port: parent.spec.ports.replication,
        worker_listeners: vec![WorkerListener {
            protocol: &spec.protocol,
            port: spec.port,
            resources: spec
                .resources
                .iter()
                .map(|r| ListenerResources { names: &r.names })
                .collect(),
        }],
    };
    serde_yaml::to_string(&file).map_err(|e| ReconcileError::Serialization(e.to_string()))
}

pub fn config_map(worker: &SynapseWorker, parent: &Synapse) -> Result<ConfigMap, ReconcileError> {
    Ok(common::config_map(
        worker,
        BTreeMap::from([(WORKER_CONFIG_KEY.to_string(), render_config(worker, parent)?)]),
    ))
}

pub fn deployment(worker: &SynapseWorker, parent: &Synapse) -> Deployment {
    let mut volumes = dependent_volumes(parent);
    volumes.push(
        common::config_map_volume(
            "worker-config",
            worker.config_map_name(),
            &[(WORKER_CONFIG_KEY, WORKER_CONFIG_KEY.to_string())],
        ),
        common::mount("worker-config", WORKER_CONFIG_DIR),
    );

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(parent.spec.image.clone()),
        command: Some(vec![
            "python".to_string(),
            "-m".to_string(),
            worker.spec.worker.clone(),
        ]),
        args: Some(vec![
            "--config-path".to_string(),
            HOMESERVER_CONFIG_PATH.to_string(),
            "--config-path".to_string(),
            format!("{WORKER_CONFIG_DIR}/{WORKER_CONFIG_KEY}"),
        ]),
        ports: Some(vec![common::container_port(
            common::HTTP_PORT_NAME,
            worker.spec.port,
        )]),
        volume_mounts: Some(volumes.mounts),
        readiness_probe: Some(common::http_probe(
            HEALTH_PATH,
            common::READINESS_DELAY_SECONDS,
        )),
        liveness_probe: Some(common::http_probe(HEALTH_PATH, LIVENESS_DELAY_SECONDS)),
        ..Default::default()
    };

    common::deployment(worker, worker.spec.replicas, volumes.volumes, container, None)
}

pub fn service(worker: &SynapseWorker) -> Service {
    common::service(
        worker,
        vec![common::service_port(common::HTTP_PORT_NAME, worker.spec.port)],
    )
}

pub fn children(worker: &SynapseWorker, parent: &Synapse) -> Result<ChildSet, ReconcileError> {
    Ok(ChildSet {
        config_map: Some(config_map(worker, parent)?),
        secret: None,
        deployment: deployment(worker, parent),
        service: Some(service(worker)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::fixtures::{homeserver, worker};

    #[test]
    fn test_render_config() {
        let yaml = render_config(&worker(), &homeserver()).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(doc["worker_app"], "synapse.app.federation_reader");
        assert_eq!(doc["worker_replication_host"], "hs-service");
        assert_eq!(doc["worker_replication_port"], 9092);
        let listener = &doc["worker_listeners"][0];
        assert_eq!(listener["type"], "http");
        assert_eq!(listener["port"], 8083);
        assert_eq!(listener["resources"][0]["names"][0], "federation");
    }

    #[test]
    fn test_worker_mounts_parent_volumes_first() {
        let d = deployment(&worker(), &homeserver());
        assert_eq!(d.metadata.name.as_deref(), Some("fed"));

        let pod = d.spec.unwrap().template.spec.unwrap();
        let names: Vec<_> = pod
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(names, ["config", "secrets", "keys", "uploads", "worker-config"]);

        let parent_config = pod.volumes.as_ref().unwrap()[0].config_map.as_ref().unwrap();
        assert_eq!(parent_config.name, "hs-config");

        let c = &pod.containers[0];
        assert_eq!(c.name, "worker");
        assert_eq!(c.image.as_deref(), Some("matrixdotorg/synapse:v1.98.0"));
        assert_eq!(
            c.command.as_ref().unwrap(),
            &["python", "-m", "synapse.app.federation_reader"]
        );
        assert_eq!(
            c.args.as_ref().unwrap(),
            &[
                "--config-path",
                "/config/homeserver.yaml",
                "--config-path",
                "/worker-config/worker.yaml"
            ]
        );
        assert_eq!(c.ports.as_ref().unwrap()[0].container_port, 8083);
        assert_eq!(c.liveness_probe.as_ref().unwrap().initial_delay_seconds, Some(60));
    }

    #[test]
    fn test_worker_has_no_secret() {
        let set = children(&worker(), &homeserver()).unwrap();
        assert!(set.secret.is_none());
        let svc = set.service.unwrap();
        assert_eq!(svc.metadata.name.as_deref(), Some("fed-service"));
        assert_eq!(svc.spec.unwrap().ports.unwrap()[0].port, 8083);
    }

    #[test]
    fn test_parent_change_changes_worker() {
        let mut parent = homeserver();
        let before = children(&worker(), &parent).unwrap();
        parent.spec.image = "matrixdotorg/synapse:v1.99.0".to_string();
        let after = children(&worker(), &parent).unwrap();

        assert_eq!(before.config_map, after.config_map);
        assert_ne!(before.deployment, after.deployment);
    }
}
