//! Homeserver children.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentStrategy};
use k8s_openapi::api::core::v1::{ConfigMap, Container, EmptyDirVolumeSource, Secret, Service, Volume};
use k8s_openapi::ByteString;
use synop_api::{ChildNames, Synapse};
use synop_reconcile::ChildSet;

use super::common::{self, VolumeSet};

pub const CONTAINER_NAME: &str = "synapse";
pub const HEALTH_PATH: &str = "/_matrix/client/versions";
pub const LIVENESS_DELAY_SECONDS: i32 = 120;

pub const CONFIG_DIR: &str = "/config";
pub const SECRETS_DIR: &str = "/secrets";
pub const KEYS_DIR: &str = "/keys";
pub const MEDIA_DIR: &str = "/media";

/// Path of `homeserver.yaml` inside any pod mounting the homeserver config.
pub const HOMESERVER_CONFIG_PATH: &str = "/config/homeserver.yaml";

pub fn config_map(synapse: &Synapse) -> ConfigMap {
    let config = &synapse.spec.config;
    common::config_map(
        synapse,
        BTreeMap::from([
            ("homeserver".to_string(), config.homeserver.clone()),
            ("logging".to_string(), config.logging.clone()),
        ]),
    )
}

pub fn secret(synapse: &Synapse) -> Secret {
    let secrets = &synapse.spec.secrets;
    let bytes = |s: &str| ByteString(s.as_bytes().to_vec());
    Secret {
        metadata: common::child_meta(synapse, synapse.secret_name()),
        data: Some(BTreeMap::from([
            ("cert".to_string(), bytes(&secrets.cert)),
            ("key".to_string(), bytes(&secrets.key)),
            ("signingKey".to_string(), bytes(&secrets.signing_key)),
        ])),
        ..Default::default()
    }
}

/// The homeserver's contribution to any workload riding on it: its config,
/// TLS material, signing key and the user-declared volumes.
pub fn dependent_volumes(synapse: &Synapse) -> VolumeSet {
    let server_name = &synapse.spec.server_name;
    let mut set = VolumeSet::default();

    set.push(
        common::config_map_volume(
            "config",
            synapse.config_map_name(),
            &[
                ("homeserver", "homeserver.yaml".to_string()),
                ("logging", format!("{server_name}.log.config")),
            ],
        ),
        common::mount("config", CONFIG_DIR),
    );
    set.push(
        common::secret_volume(
            "secrets",
            synapse.secret_name(),
            &[("cert", "tls.crt".to_string()), ("key", "tls.key".to_string())],
        ),
        common::mount("secrets", SECRETS_DIR),
    );
    set.push(
        common::secret_volume(
            "keys",
            synapse.secret_name(),
            &[("signingKey", format!("{server_name}.signing.key"))],
        ),
        common::mount("keys", KEYS_DIR),
    );

    for extra in &synapse.spec.config.volumes {
        set.push(
            common::with_platform_defaults(extra.volume.clone()),
            extra.mount.clone(),
        );
    }

    set
}

pub fn deployment(synapse: &Synapse) -> Deployment {
    let ports = &synapse.spec.ports;

    let mut volumes = dependent_volumes(synapse);
    volumes.push(
        Volume {
            name: "media".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        common::mount("media", MEDIA_DIR),
    );

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(synapse.spec.image.clone()),
        command: Some(vec![
            "python".to_string(),
            "-m".to_string(),
            "synapse.app.homeserver".to_string(),
        ]),
        args: Some(vec![
            "--config-path".to_string(),
            HOMESERVER_CONFIG_PATH.to_string(),
            "--keys-directory".to_string(),
            KEYS_DIR.to_string(),
        ]),
        ports: Some(vec![
            common::container_port(common::HTTP_PORT_NAME, ports.http),
            common::container_port("https", ports.https),
            common::container_port("replication", ports.replication),
        ]),
        volume_mounts: Some(volumes.mounts),
        readiness_probe: Some(common::http_probe(
            HEALTH_PATH,
            common::READINESS_DELAY_SECONDS,
        )),
        liveness_probe: Some(common::http_probe(HEALTH_PATH, LIVENESS_DELAY_SECONDS)),
        ..Default::default()
    };

    common::deployment(
        synapse,
        synapse.spec.replicas,
        volumes.volumes,
        container,
        Some(DeploymentStrategy {
            type_: Some("Recreate".to_string()),
            ..Default::default()
        }),
    )
}

pub fn service(synapse: &Synapse) -> Service {
    let ports = &synapse.spec.ports;
    common::service(
        synapse,
        vec![
            common::service_port(common::HTTP_PORT_NAME, ports.http),
            common::service_port("https", ports.https),
            common::service_port("replication", ports.replication),
        ],
    )
}

pub fn children(synapse: &Synapse) -> ChildSet {
    ChildSet {
        config_map: Some(config_map(synapse)),
        secret: Some(secret(synapse)),
        deployment: deployment(synapse),
        service: Some(service(synapse)),
    }
}
