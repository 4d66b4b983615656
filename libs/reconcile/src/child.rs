//! Child resource kinds and how each one is brought back in line.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service};

use crate::diff;
use crate::store::Managed;

/// The four kinds of child a component can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildKind {
    ConfigStore,
    SecretStore,
    Workload,
    Service,
}

impl ChildKind {
    /// Apply order within a pass. Content must exist before the workload that
    /// mounts it, and the workload before the service selecting its pods.
    pub const APPLY_ORDER: [ChildKind; 4] = [
        ChildKind::ConfigStore,
        ChildKind::SecretStore,
        ChildKind::Workload,
        ChildKind::Service,
    ];

    /// Content kinds are projected into the workload's filesystem; changing
    /// one requires a rollout.
    pub fn is_content(self) -> bool {
        matches!(self, Self::ConfigStore | Self::SecretStore)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigStore => "config",
            Self::SecretStore => "secret",
            Self::Workload => "workload",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform object the driver can create and patch.
pub trait ChildResource: Managed {
    const KIND: ChildKind;

    /// First checklist field that differs from `desired`, if any.
    fn drift(&self, desired: &Self) -> Option<&'static str>;

    /// Copy the checklist fields of `desired` onto this observed object.
    /// Everything outside the checklist is left as the platform stored it.
    fn converge(&mut self, desired: &Self);
}

impl ChildResource for ConfigMap {
    const KIND: ChildKind = ChildKind::ConfigStore;

    fn drift(&self, desired: &Self) -> Option<&'static str> {
        diff::config_map_drift(self, desired)
    }

    fn converge(&mut self, desired: &Self) {
        self.data = desired.data.clone();
    }
}

impl ChildResource for Secret {
    const KIND: ChildKind = ChildKind::SecretStore;

    fn drift(&self, desired: &Self) -> Option<&'static str> {
        diff::secret_drift(self, desired)
    }

    fn converge(&mut self, desired: &Self) {
        self.data = desired.data.clone();
    }
}

impl ChildResource for Deployment {
    const KIND: ChildKind = ChildKind::Workload;

    fn drift(&self, desired: &Self) -> Option<&'static str> {
        diff::deployment_drift(self, desired)
    }

    fn converge(&mut self, desired: &Self) {
        let Some(expected) = desired.spec.as_ref() else {
            return;
        };
        let Some(actual) = self.spec.as_mut() else {
            self.spec = Some(expected.clone());
            return;
        };

        actual.replicas = expected.replicas;

        let labels = expected
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone());
        actual
            .template
            .metadata
            .get_or_insert_with(Default::default)
            .labels = labels;

        let Some(expected_pod) = expected.template.spec.as_ref() else {
            return;
        };
        let actual_pod = actual
            .template
            .spec
            .get_or_insert_with(|| expected_pod.clone());

        actual_pod.volumes = expected_pod.volumes.clone();

        if actual_pod.containers.len() != expected_pod.containers.len() {
            actual_pod.containers = expected_pod.containers.clone();
            return;
        }

        if let (Some(a), Some(e)) = (
            actual_pod.containers.first_mut(),
            expected_pod.containers.first(),
        ) {
            a.name = e.name.clone();
            a.image = e.image.clone();
            a.ports = e.ports.clone();
            a.volume_mounts = e.volume_mounts.clone();
            a.args = e.args.clone();
            a.command = e.command.clone();
            a.readiness_probe = e.readiness_probe.clone();
            a.liveness_probe = e.liveness_probe.clone();
        }
    }
}

impl ChildResource for Service {
    const KIND: ChildKind = ChildKind::Service;

    fn drift(&self, desired: &Self) -> Option<&'static str> {
        diff::service_drift(self, desired)
    }

    fn converge(&mut self, desired: &Self) {
        let Some(expected) = desired.spec.as_ref() else {
            return;
        };
        let actual = self.spec.get_or_insert_with(|| expected.clone());
        actual.selector = expected.selector.clone();
        actual.ports = expected.ports.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec, ServicePort, ServiceSpec};
    use kube::api::ObjectMeta;

    fn deployment(replicas: i32, image: &str) -> Deployment {
        Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(replicas),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(BTreeMap::from([("app".into(), "hs".into())])),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "synapse".into(),
                            image: Some(image.into()),
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

    #[test]
    fn test_apply_order_puts_content_first() {
        let order = ChildKind::APPLY_ORDER;
        assert!(order[0].is_content());
        assert!(order[1].is_content());
        assert_eq!(order[2], ChildKind::Workload);
        assert_eq!(order[3], ChildKind::Service);
    }

    #[test]
    fn test_converged_deployment_has_no_drift() {
        let mut observed = deployment(1, "img:v1");
        let desired = deployment(3, "img:v2");
        assert_eq!(observed.drift(&desired), Some("replicas"));

        observed.converge(&desired);
        assert_eq!(observed.drift(&desired), None);
    }

    #[test]
    fn test_converge_keeps_template_annotations_and_status_fields() {
        let mut observed = deployment(1, "img:v1");
        observed.metadata.resource_version = Some("7".into());
        let spec = observed.spec.as_mut().unwrap();
        spec.revision_history_limit = Some(10);
        spec.template.metadata.as_mut().unwrap().annotations = Some(BTreeMap::from([(
            "synapse-operator/force-rollout".into(),
            "config changed at then".into(),
        )]));
        let pod = spec.template.spec.as_mut().unwrap();
        pod.containers[0].termination_message_path = Some("/dev/termination-log".into());

        observed.converge(&deployment(2, "img:v1"));

        let spec = observed.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.revision_history_limit, Some(10));
        assert_eq!(observed.metadata.resource_version.as_deref(), Some("7"));
        assert_eq!(
            spec.template
                .metadata
                .as_ref()
                .unwrap()
                .annotations
                .as_ref()
                .unwrap()["synapse-operator/force-rollout"],
            "config changed at then"
        );
        assert_eq!(
            spec.template.spec.as_ref().unwrap().containers[0]
                .termination_message_path
                .as_deref(),
            Some("/dev/termination-log")
        );
    }

    #[test]
    fn test_converge_replaces_containers_on_count_mismatch() {
        let mut observed = deployment(1, "img:v1");
        observed
            .spec
            .as_mut()
            .unwrap()
            .template
            .spec
            .as_mut()
            .unwrap()
            .containers
            .push(Container {
                name: "sidecar".into(),
                ..Default::default()
            });
        let desired = deployment(1, "img:v1");

        assert_eq!(observed.drift(&desired), Some("template.containers"));
        observed.converge(&desired);
        assert_eq!(observed.drift(&desired), None);
    }

    #[test]
    fn test_service_converge_keeps_cluster_ip() {
        let service = |port: i32| Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some("http".into()),
                    port,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut observed = service(8008);
        observed.spec.as_mut().unwrap().cluster_ip = Some("10.96.0.3".into());

        observed.converge(&service(8080));

        let spec = observed.spec.unwrap();
        assert_eq!(spec.ports.unwrap()[0].port, 8080);
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.96.0.3"));
    }
}
