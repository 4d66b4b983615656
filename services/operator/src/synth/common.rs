//! Building blocks shared by every component's synthesizer.
//!
//! Everything here fills in the fields the platform would otherwise default
//! (protocols, probe thresholds, file modes), so a freshly stored object
//! compares equal to the next synthesized one.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, HTTPGetAction, KeyToPath,
    PodSpec, PodTemplateSpec, Probe, SecretVolumeSource, Service, ServicePort, ServiceSpec,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use synop_api::ChildNames;

/// Port name every probe and service target refers to.
pub const HTTP_PORT_NAME: &str = "http";

/// Mode of files projected from config and secret stores (0644).
pub const PROJECTED_FILE_MODE: i32 = 420;

pub const PROBE_TIMEOUT_SECONDS: i32 = 1;
pub const PROBE_PERIOD_SECONDS: i32 = 10;
pub const PROBE_SUCCESS_THRESHOLD: i32 = 1;
pub const PROBE_FAILURE_THRESHOLD: i32 = 3;

/// Initial delay before the first readiness check.
pub const READINESS_DELAY_SECONDS: i32 = 10;

/// Metadata for a child of `owner` named `name`.
pub fn child_meta<O>(owner: &O, name: String) -> ObjectMeta
where
    O: ChildNames + ResourceExt,
{
    ObjectMeta {
        name: Some(name),
        namespace: owner.namespace(),
        labels: Some(owner.app_labels()),
        ..Default::default()
    }
}

/// HTTP GET probe against the `http` port.
pub fn http_probe(path: &str, initial_delay_seconds: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::String(HTTP_PORT_NAME.to_string()),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        timeout_seconds: Some(PROBE_TIMEOUT_SECONDS),
        period_seconds: Some(PROBE_PERIOD_SECONDS),
        success_threshold: Some(PROBE_SUCCESS_THRESHOLD),
        failure_threshold: Some(PROBE_FAILURE_THRESHOLD),
        ..Default::default()
    }
}

pub fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// Service port targeting the container port of the same name.
pub fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::String(name.to_string())),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

/// `(key, path)` projection pairs.
fn items(pairs: &[(&str, String)]) -> Vec<KeyToPath> {
    pairs
        .iter()
        .map(|(key, path)| KeyToPath {
            key: key.to_string(),
            path: path.clone(),
            ..Default::default()
        })
        .collect()
}

pub fn config_map_volume(name: &str, config_map: String, pairs: &[(&str, String)]) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map,
            items: Some(items(pairs)),
            default_mode: Some(PROJECTED_FILE_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn secret_volume(name: &str, secret: String, pairs: &[(&str, String)]) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret),
            items: Some(items(pairs)),
            default_mode: Some(PROJECTED_FILE_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Fill in the fields the platform defaults on a user-declared volume, so
/// the stored pod template compares equal to the synthesized one.
pub fn with_platform_defaults(mut volume: Volume) -> Volume {
    if let Some(source) = volume.config_map.as_mut() {
        source.default_mode.get_or_insert(PROJECTED_FILE_MODE);
    }
    if let Some(source) = volume.secret.as_mut() {
        source.default_mode.get_or_insert(PROJECTED_FILE_MODE);
    }
    if let Some(source) = volume.projected.as_mut() {
        source.default_mode.get_or_insert(PROJECTED_FILE_MODE);
    }
    if let Some(source) = volume.downward_api.as_mut() {
        source.default_mode.get_or_insert(PROJECTED_FILE_MODE);
    }
    if let Some(source) = volume.host_path.as_mut() {
        source.type_.get_or_insert_with(String::new);
    }
    volume
}

pub fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

/// Volumes and their mounts, kept in lockstep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeSet {
    pub volumes: Vec<Volume>,
    pub mounts: Vec<VolumeMount>,
}

impl VolumeSet {
    pub fn push(&mut self, volume: Volume, mount: VolumeMount) {
        self.volumes.push(volume);
        self.mounts.push(mount);
    }

    pub fn extend(&mut self, other: VolumeSet) {
        self.volumes.extend(other.volumes);
        self.mounts.extend(other.mounts);
    }
}

pub fn config_map<O>(owner: &O, data: BTreeMap<String, String>) -> ConfigMap
where
    O: ChildNames + ResourceExt,
{
    ConfigMap {
        metadata: child_meta(owner, owner.config_map_name()),
        data: Some(data),
        ..Default::default()
    }
}

/// Workload with a single-container pod template selected by `app=<name>`.
pub fn deployment<O>(
    owner: &O,
    replicas: i32,
    volumes: Vec<Volume>,
    container: Container,
    strategy: Option<DeploymentStrategy>,
) -> Deployment
where
    O: ChildNames + ResourceExt,
{
    let labels = owner.app_labels();
    Deployment {
        metadata: child_meta(owner, owner.deployment_name()),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            strategy,
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(owner.pod_name()),
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    volumes: Some(volumes),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// ClusterIP service over the workload's pods.
pub fn service<O>(owner: &O, ports: Vec<ServicePort>) -> Service
where
    O: ChildNames + ResourceExt,
{
    Service {
        metadata: child_meta(owner, owner.service_name()),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(owner.app_labels()),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}
