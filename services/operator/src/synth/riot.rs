//! Web client children.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Container, Service, VolumeMount};
use synop_api::{ChildNames, Riot};
use synop_reconcile::ChildSet;

use super::common;

pub const CONTAINER_NAME: &str = "riot";
pub const HTTP_PORT: i32 = 80;
pub const HEALTH_PATH: &str = "/";
pub const LIVENESS_DELAY_SECONDS: i32 = 30;

pub const CONFIG_KEY: &str = "config.json";
pub const CONFIG_PATH: &str = "/app/config.json";

pub fn config_map(riot: &Riot) -> ConfigMap {
    common::config_map(
        riot,
        BTreeMap::from([(CONFIG_KEY.to_string(), riot.spec.config.clone())]),
    )
}

pub fn deployment(riot: &Riot) -> Deployment {
    let volume = common::config_map_volume(
        "config",
        riot.config_map_name(),
        &[(CONFIG_KEY, CONFIG_KEY.to_string())],
    );

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(riot.spec.image.clone()),
        ports: Some(vec![common::container_port(common::HTTP_PORT_NAME, HTTP_PORT)]),
        volume_mounts: Some(vec![VolumeMount {
            name: "config".to_string(),
            mount_path: CONFIG_PATH.to_string(),
            sub_path: Some(CONFIG_KEY.to_string()),
            ..Default::default()
        }]),
        readiness_probe: Some(common::http_probe(
            HEALTH_PATH,
            common::READINESS_DELAY_SECONDS,
        )),
        liveness_probe: Some(common::http_probe(HEALTH_PATH, LIVENESS_DELAY_SECONDS)),
        ..Default::default()
    };

    common::deployment(riot, riot.spec.replicas, vec![volume], container, None)
}

pub fn service(riot: &Riot) -> Service {
    common::service(
        riot,
        vec![common::service_port(common::HTTP_PORT_NAME, HTTP_PORT)],
    )
}

pub fn children(riot: &Riot) -> ChildSet {
    ChildSet {
        config_map: Some(config_map(riot)),
        secret: None,
        deployment: deployment(riot),
        service: Some(service(riot)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::fixtures::riot;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

    #[test]
    fn test_riot_children() {
        let set = children(&riot());

        let cm = set.config_map.unwrap();
        assert_eq!(cm.metadata.name.as_deref(), Some("srv1-config"));
        assert_eq!(cm.data.unwrap()["config.json"], "{}");

        let d = set.deployment;
        assert_eq!(d.metadata.name.as_deref(), Some("srv1"));
        let spec = d.spec.unwrap();
        assert_eq!(spec.replicas, Some(2));
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.containers[0].image.as_deref(), Some("img:v1"));
        let mount = &pod.containers[0].volume_mounts.as_ref().unwrap()[0];
        assert_eq!(mount.mount_path, "/app/config.json");
        assert_eq!(mount.sub_path.as_deref(), Some("config.json"));

        let svc = set.service.unwrap().spec.unwrap();
        let port = &svc.ports.unwrap()[0];
        assert_eq!(port.port, 80);
        assert_eq!(port.target_port, Some(IntOrString::String("http".to_string())));
    }

    #[test]
    fn test_server_name_does_not_affect_children() {
        let mut renamed = riot();
        renamed.spec.server_name = "matrix.example.org".to_string();

        assert_eq!(children(&renamed), children(&riot()));
    }
}
