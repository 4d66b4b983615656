use k8s_openapi::api::core::v1::{HostPathVolumeSource, Volume, VolumeMount};
use synop_api::{
    Riot, RiotSpec, Synapse, SynapseConfig, SynapsePorts, SynapseSecrets, SynapseSpec,
    SynapseVolume, SynapseWorker, SynapseWorkerResource, SynapseWorkerSpec,
};

pub fn homeserver() -> Synapse {
    let mut synapse = Synapse::new(
        "hs",
        SynapseSpec {
            image: "matrixdotorg/synapse:v1.98.0".to_string(),
            server_name: "example.com".to_string(),
            replicas: 2,
            config: SynapseConfig {
                homeserver: "server_name: example.com".to_string(),
                logging: "version: 1".to_string(),
                volumes: vec![SynapseVolume {
                    volume: Volume {
                        name: "uploads".to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: "/srv/uploads".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    mount: VolumeMount {
                        name: "uploads".to_string(),
                        mount_path: "/uploads".to_string(),
                        ..Default::default()
                    },
                }],
            },
            secrets: SynapseSecrets {
                cert: "CERT".to_string(),
                key: "KEY".to_string(),
                signing_key: "SIGN".to_string(),
            },
            ports: SynapsePorts {
                http: 8008,
                https: 8448,
                replication: 9092,
            },
        },
    );
    synapse.metadata.namespace = Some("matrix".to_string());
    synapse
}

pub fn worker() -> SynapseWorker {
    let mut worker = SynapseWorker::new(
        "fed",
        SynapseWorkerSpec {
            replicas: 1,
            synapse: "hs".to_string(),
            worker: "synapse.app.federation_reader".to_string(),
            protocol: "http".to_string(),
            port: 8083,
            resources: vec![SynapseWorkerResource {
                names: vec!["federation".to_string()],
            }],
        },
    );
    worker.metadata.namespace = Some("matrix".to_string());
    worker
}

pub fn riot() -> Riot {
    let mut riot = Riot::new(
        "srv1",
        RiotSpec {
            replicas: 2,
            image: "img:v1".to_string(),
            server_name: "example.com".to_string(),
            config: "{}".to_string(),
        },
    );
    riot.metadata.namespace = Some("matrix".to_string());
    riot
}
