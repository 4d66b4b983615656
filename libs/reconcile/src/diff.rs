//! Drift checks, one fixed checklist per child kind.
//!
//! Each check returns the first field found to differ, or `None` when the
//! observed object already matches. Only the fields named here are ever
//! compared; anything the platform adds on its own (status, cluster IPs,
//! server metadata, pod-template annotations) is invisible to them. Lists are
//! compared element-wise in order, so synthesized lists must be emitted in a
//! stable order.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{ConfigMap, PodSpec, Secret, Service, ServiceSpec};
use kube::api::ObjectMeta;

/// Replica count the platform assumes when none is set.
pub const DEFAULT_REPLICAS: i32 = 1;

/// Treat an absent map the same as an empty one.
fn non_empty<V>(map: Option<&BTreeMap<String, V>>) -> Option<&BTreeMap<String, V>> {
    map.filter(|m| !m.is_empty())
}

fn slice<T>(list: &Option<Vec<T>>) -> &[T] {
    list.as_deref().unwrap_or(&[])
}

fn template_labels(meta: Option<&ObjectMeta>) -> Option<&BTreeMap<String, String>> {
    non_empty(meta.and_then(|m| m.labels.as_ref()))
}

/// Config store: the whole key/value map.
pub fn config_map_drift(observed: &ConfigMap, desired: &ConfigMap) -> Option<&'static str> {
    if non_empty(observed.data.as_ref()) != non_empty(desired.data.as_ref()) {
        return Some("data");
    }
    None
}

/// Secret store: the whole key/bytes map.
pub fn secret_drift(observed: &Secret, desired: &Secret) -> Option<&'static str> {
    if non_empty(observed.data.as_ref()) != non_empty(desired.data.as_ref()) {
        return Some("data");
    }
    None
}

/// Workload checklist, cheapest fields first.
pub fn deployment_drift(observed: &Deployment, desired: &Deployment) -> Option<&'static str> {
    let empty = DeploymentSpec::default();
    let actual = observed.spec.as_ref().unwrap_or(&empty);
    let expected = desired.spec.as_ref().unwrap_or(&empty);

    if actual.replicas.unwrap_or(DEFAULT_REPLICAS) != expected.replicas.unwrap_or(DEFAULT_REPLICAS) {
        return Some("replicas");
    }

    if template_labels(actual.template.metadata.as_ref())
        != template_labels(expected.template.metadata.as_ref())
    {
        return Some("template.labels");
    }

    let empty_pod = PodSpec::default();
    let actual_pod = actual.template.spec.as_ref().unwrap_or(&empty_pod);
    let expected_pod = expected.template.spec.as_ref().unwrap_or(&empty_pod);

    if slice(&actual_pod.volumes) != slice(&expected_pod.volumes) {
        return Some("template.volumes");
    }

    if actual_pod.containers.len() != expected_pod.containers.len() {
        return Some("template.containers");
    }

    let (Some(a), Some(e)) = (actual_pod.containers.first(), expected_pod.containers.first())
    else {
        return None;
    };

    if a.name != e.name {
        return Some("container.name");
    }
    if a.image != e.image {
        return Some("container.image");
    }
    if slice(&a.ports) != slice(&e.ports) {
        return Some("container.ports");
    }
    if slice(&a.volume_mounts) != slice(&e.volume_mounts) {
        return Some("container.volumeMounts");
    }
    if slice(&a.args) != slice(&e.args) {
        return Some("container.args");
    }
    if slice(&a.command) != slice(&e.command) {
        return Some("container.command");
    }
    if a.readiness_probe != e.readiness_probe {
        return Some("container.readinessProbe");
    }
    if a.liveness_probe != e.liveness_probe {
        return Some("container.livenessProbe");
    }

    None
}

/// Network-exposing resource: selector and the ordered port list.
pub fn service_drift(observed: &Service, desired: &Service) -> Option<&'static str> {
    let empty = ServiceSpec::default();
    let actual = observed.spec.as_ref().unwrap_or(&empty);
    let expected = desired.spec.as_ref().unwrap_or(&empty);

    if non_empty(actual.selector.as_ref()) != non_empty(expected.selector.as_ref()) {
        return Some("selector");
    }
    if slice(&actual.ports) != slice(&expected.ports) {
        return Some("ports");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, ContainerPort, PodTemplateSpec, Probe, ServicePort, Volume,
    };
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use k8s_openapi::ByteString;
    use rstest::rstest;

    fn labels() -> BTreeMap<String, String> {
        BTreeMap::from([("app".to_string(), "hs".to_string())])
    }

    fn deployment() -> Deployment {
        Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(2),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: "config".to_string(),
                            ..Default::default()
                        }]),
                        containers: vec![Container {
                            name: "synapse".to_string(),
                            image: Some("img:v1".to_string()),
                            ports: Some(vec![ContainerPort {
                                name: Some("http".to_string()),
                                container_port: 8008,
                                protocol: Some("TCP".to_string()),
                                ..Default::default()
                            }]),
                            args: Some(vec!["--config-path".to_string()]),
                            readiness_probe: Some(Probe {
                                initial_delay_seconds: Some(10),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn first_container(d: &mut Deployment) -> &mut Container {
        &mut d
            .spec
            .as_mut()
            .unwrap()
            .template
            .spec
            .as_mut()
            .unwrap()
            .containers[0]
    }

    #[test]
    fn test_identical_deployments_match() {
        assert_eq!(deployment_drift(&deployment(), &deployment()), None);
    }

    #[rstest]
    #[case::replicas(|d: &mut Deployment| d.spec.as_mut().unwrap().replicas = Some(3), "replicas")]
    #[case::labels(
        |d: &mut Deployment| d.spec.as_mut().unwrap().template.metadata = None,
        "template.labels"
    )]
    #[case::volumes(
        |d: &mut Deployment| d.spec.as_mut().unwrap().template.spec.as_mut().unwrap().volumes = None,
        "template.volumes"
    )]
    #[case::containers(
        |d: &mut Deployment| d.spec.as_mut().unwrap().template.spec.as_mut().unwrap().containers.push(Container::default()),
        "template.containers"
    )]
    #[case::name(|d: &mut Deployment| first_container(d).name = "other".to_string(), "container.name")]
    #[case::image(|d: &mut Deployment| first_container(d).image = Some("img:v2".to_string()), "container.image")]
    #[case::ports(|d: &mut Deployment| first_container(d).ports = None, "container.ports")]
    #[case::mounts(
        |d: &mut Deployment| first_container(d).volume_mounts = Some(vec![Default::default()]),
        "container.volumeMounts"
    )]
    #[case::args(|d: &mut Deployment| first_container(d).args = None, "container.args")]
    #[case::command(
        |d: &mut Deployment| first_container(d).command = Some(vec!["sh".to_string()]),
        "container.command"
    )]
    #[case::readiness(|d: &mut Deployment| first_container(d).readiness_probe = None, "container.readinessProbe")]
    #[case::liveness(
        |d: &mut Deployment| first_container(d).liveness_probe = Some(Probe::default()),
        "container.livenessProbe"
    )]
    fn test_deployment_checklist(#[case] mutate: fn(&mut Deployment), #[case] field: &str) {
        let mut observed = deployment();
        mutate(&mut observed);
        assert_eq!(deployment_drift(&observed, &deployment()), Some(field));
    }

    #[test]
    fn test_deployment_reports_first_mismatch_only() {
        let mut observed = deployment();
        observed.spec.as_mut().unwrap().replicas = Some(5);
        first_container(&mut observed).image = Some("img:v9".to_string());
        assert_eq!(deployment_drift(&observed, &deployment()), Some("replicas"));
    }

    #[test]
    fn test_deployment_ignores_platform_fields() {
        let mut observed = deployment();
        observed.metadata.resource_version = Some("42".to_string());
        observed.metadata.annotations = Some(BTreeMap::from([(
            "deployment.kubernetes.io/revision".to_string(),
            "3".to_string(),
        )]));
        let spec = observed.spec.as_mut().unwrap();
        spec.revision_history_limit = Some(10);
        spec.progress_deadline_seconds = Some(600);
        spec.template.metadata.as_mut().unwrap().annotations = Some(BTreeMap::from([(
            "synapse-operator/force-rollout".to_string(),
            "config changed".to_string(),
        )]));
        first_container(&mut observed).termination_message_path =
            Some("/dev/termination-log".to_string());

        assert_eq!(deployment_drift(&observed, &deployment()), None);
    }

    #[test]
    fn test_unset_replicas_means_one() {
        let mut observed = deployment();
        let mut desired = deployment();
        observed.spec.as_mut().unwrap().replicas = None;
        desired.spec.as_mut().unwrap().replicas = Some(1);
        assert_eq!(deployment_drift(&observed, &desired), None);
    }

    #[test]
    fn test_container_list_order_matters() {
        let mut observed = deployment();
        let mut desired = deployment();
        let second = ContainerPort {
            name: Some("https".to_string()),
            container_port: 8448,
            ..Default::default()
        };
        first_container(&mut desired)
            .ports
            .as_mut()
            .unwrap()
            .push(second.clone());
        first_container(&mut observed)
            .ports
            .as_mut()
            .unwrap()
            .insert(0, second);
        assert_eq!(deployment_drift(&observed, &desired), Some("container.ports"));
    }

    #[rstest]
    #[case::same(&[("a", "1")], &[("a", "1")], None)]
    #[case::changed(&[("a", "1")], &[("a", "2")], Some("data"))]
    #[case::added(&[("a", "1")], &[("a", "1"), ("b", "2")], Some("data"))]
    #[case::removed(&[("a", "1"), ("b", "2")], &[("a", "1")], Some("data"))]
    fn test_config_map_data(
        #[case] observed: &[(&str, &str)],
        #[case] desired: &[(&str, &str)],
        #[case] expected: Option<&'static str>,
    ) {
        let cm = |pairs: &[(&str, &str)]| ConfigMap {
            data: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        assert_eq!(config_map_drift(&cm(observed), &cm(desired)), expected);
    }

    #[test]
    fn test_absent_data_equals_empty_data() {
        let observed = ConfigMap::default();
        let desired = ConfigMap {
            data: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert_eq!(config_map_drift(&observed, &desired), None);
    }

    #[test]
    fn test_secret_bytes_compared() {
        let secret = |v: &str| Secret {
            data: Some(BTreeMap::from([(
                "signingKey".to_string(),
                ByteString(v.as_bytes().to_vec()),
            )])),
            ..Default::default()
        };
        assert_eq!(secret_drift(&secret("a"), &secret("a")), None);
        assert_eq!(secret_drift(&secret("a"), &secret("b")), Some("data"));
    }

    #[test]
    fn test_service_selector_and_ports() {
        let service = |port: i32| Service {
            spec: Some(ServiceSpec {
                selector: Some(labels()),
                ports: Some(vec![ServicePort {
                    name: Some("http".to_string()),
                    port,
                    target_port: Some(IntOrString::String("http".to_string())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let mut observed = service(80);
        observed.spec.as_mut().unwrap().cluster_ip = Some("10.96.0.7".to_string());
        assert_eq!(service_drift(&observed, &service(80)), None);
        assert_eq!(service_drift(&service(81), &service(80)), Some("ports"));

        let mut unselected = service(80);
        unselected.spec.as_mut().unwrap().selector = None;
        assert_eq!(service_drift(&unselected, &service(80)), Some("selector"));
    }
}
