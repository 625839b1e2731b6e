use std::collections::HashMap;

use bollard::models::{ContainerInspectResponse, ContainerSummary, EndpointSettings, MountPoint};
use tracing::{debug, warn};

use crate::docker::client::DaemonClient;
use crate::docker::env;
use crate::docker::model::{
    parse_env, ImageRef, Mount, Network, NetworkAddress, RuntimeContainer, SwarmNode, Volume,
};

/// One configured daemon: its resolved endpoint string (used for logging and
/// as the `DockerEnv` key) plus its client.
pub struct DaemonHandle {
    pub endpoint: String,
    pub client: Box<dyn DaemonClient>,
}

/// Iterates every configured daemon and produces a normalized container list
/// in daemon-iteration order, per distilled §4.2.
pub struct ContainerSnapshot<'a> {
    daemons: &'a [DaemonHandle],
}

impl<'a> ContainerSnapshot<'a> {
    pub fn new(daemons: &'a [DaemonHandle]) -> Self {
        Self { daemons }
    }

    pub async fn get_containers(&self, all: bool) -> Vec<RuntimeContainer> {
        let mut containers = Vec::new();

        for daemon in self.daemons {
            match daemon.client.info().await {
                Ok(info) => env::set_docker_info(&daemon.endpoint, info),
                Err(error) => warn!(endpoint = %daemon.endpoint, %error, "failed to fetch daemon info"),
            }

            match daemon.client.version().await {
                Ok(version) => env::set_server_version(&daemon.endpoint, version),
                Err(error) => warn!(endpoint = %daemon.endpoint, %error, "failed to fetch daemon version"),
            }

            let summaries = match daemon.client.list_containers(all).await {
                Ok(summaries) => summaries,
                Err(error) => {
                    warn!(endpoint = %daemon.endpoint, %error, "failed to list containers, skipping daemon");
                    continue;
                }
            };

            for summary in summaries {
                let Some(id) = summary.id.clone() else {
                    continue;
                };

                match daemon.client.inspect_container(&id).await {
                    Ok(inspect) => containers.push(to_runtime_container(&inspect)),
                    Err(error) => {
                        debug!(endpoint = %daemon.endpoint, container_id = %id, %error, "failed to inspect container, skipping");
                    }
                }
            }
        }

        containers
    }
}

fn to_runtime_container(inspect: &ContainerInspectResponse) -> RuntimeContainer {
    let id = inspect.id.clone().unwrap_or_default();
    let name = inspect
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    let config = inspect.config.as_ref();
    let state = inspect.state.as_ref();
    let network_settings = inspect.network_settings.as_ref();

    let image_ref = config
        .and_then(|c| c.image.clone())
        .or_else(|| inspect.image.clone())
        .map(|image| ImageRef::parse(&image))
        .unwrap_or(ImageRef {
            registry: String::new(),
            repository: String::new(),
            tag: String::new(),
        });

    let env_map = config
        .and_then(|c| c.env.clone())
        .map(|entries| parse_env(&entries))
        .unwrap_or_default();

    let labels = config.and_then(|c| c.labels.clone()).unwrap_or_default();

    let (networks, addresses) = network_settings
        .map(|ns| build_networks(ns))
        .unwrap_or_default();

    let primary_network = networks.first();

    let volumes = build_volumes(inspect.mounts.as_deref().unwrap_or_default());
    let mounts = build_mounts(inspect.mounts.as_deref().unwrap_or_default());

    let node = build_swarm_node(&labels);

    RuntimeContainer {
        id,
        image: image_ref,
        running: state.and_then(|s| s.running).unwrap_or(false),
        name,
        hostname: config.and_then(|c| c.hostname.clone()).unwrap_or_default(),
        gateway: network_settings
            .and_then(|ns| ns.gateway.clone())
            .unwrap_or_default(),
        ip: network_settings
            .and_then(|ns| ns.ip_address.clone())
            .filter(|ip| !ip.is_empty())
            .or_else(|| primary_network.map(|n| n.ip.clone()))
            .unwrap_or_default(),
        ip6_link_local: primary_network
            .map(|n| n.ip6_gateway.clone())
            .unwrap_or_default(),
        ip6_global: network_settings
            .and_then(|ns| ns.global_ipv6_address.clone())
            .unwrap_or_default(),
        env: env_map,
        labels,
        volumes,
        mounts,
        addresses,
        networks,
        node,
    }
}

fn build_networks(
    ns: &bollard::models::NetworkSettings,
) -> (Vec<Network>, Vec<NetworkAddress>) {
    let mut networks = Vec::new();
    if let Some(by_name) = ns.networks.as_ref() {
        for (name, endpoint) in by_name {
            networks.push(endpoint_to_network(name, endpoint));
        }
    }

    let addresses = build_addresses(ns);
    (networks, addresses)
}

fn endpoint_to_network(name: &str, endpoint: &EndpointSettings) -> Network {
    Network {
        name: name.to_string(),
        ip: endpoint.ip_address.clone().unwrap_or_default(),
        gateway: endpoint.gateway.clone().unwrap_or_default(),
        endpoint_id: endpoint.endpoint_id.clone().unwrap_or_default(),
        ip6_global: endpoint.global_ipv6_address.clone().unwrap_or_default(),
        ip6_gateway: endpoint.ipv6_gateway.clone().unwrap_or_default(),
        mac_address: endpoint.mac_address.clone().unwrap_or_default(),
        prefix_len: endpoint.ip_prefix_len.unwrap_or_default(),
        ip6_prefix_len: endpoint.global_ipv6_prefix_len.unwrap_or_default(),
    }
}

fn build_addresses(ns: &bollard::models::NetworkSettings) -> Vec<NetworkAddress> {
    let Some(ports) = ns.ports.as_ref() else {
        return Vec::new();
    };

    let mut addresses = Vec::new();
    for (port_proto, bindings) in ports {
        let (port, proto) = port_proto.split_once('/').unwrap_or((port_proto.as_str(), "tcp"));
        let Some(bindings) = bindings else {
            continue;
        };
        for binding in bindings {
            addresses.push(NetworkAddress {
                ip: ns.ip_address.clone().unwrap_or_default(),
                ip6_link_local: String::new(),
                ip6_global: ns.global_ipv6_address.clone().unwrap_or_default(),
                port: port.to_string(),
                proto: proto.to_string(),
                host_port: binding.host_port.clone().unwrap_or_default(),
                host_ip: binding.host_ip.clone().unwrap_or_default(),
            });
        }
    }
    addresses
}

fn build_volumes(mounts: &[MountPoint]) -> HashMap<String, Volume> {
    mounts
        .iter()
        .filter_map(|mount| {
            let destination = mount.destination.clone()?;
            Some((
                destination.clone(),
                Volume {
                    path: destination,
                    host_path: mount.source.clone().unwrap_or_default(),
                    read_write: mount.rw.unwrap_or(true),
                },
            ))
        })
        .collect()
}

fn build_mounts(mounts: &[MountPoint]) -> Vec<Mount> {
    mounts
        .iter()
        .map(|mount| Mount {
            name: mount.name.clone(),
            source: mount.source.clone().unwrap_or_default(),
            destination: mount.destination.clone().unwrap_or_default(),
            driver: mount.driver.clone(),
            mode: mount.mode.clone().unwrap_or_default(),
            rw: mount.rw.unwrap_or(true),
        })
        .collect()
}

/// Swarm node info is not carried on a plain container inspect in modern
/// Docker; this recovers it from the classic `com.docker.swarm.node.*`
/// labels when a swarm-aware daemon sets them (supplemented per
/// `original_source` intent — docker-gen's `RuntimeContainer.Node` field).
fn build_swarm_node(labels: &HashMap<String, String>) -> Option<SwarmNode> {
    let id = labels.get("com.docker.swarm.node.id")?.clone();
    Some(SwarmNode {
        id,
        name: labels
            .get("com.docker.swarm.node.name")
            .cloned()
            .unwrap_or_default(),
        address: labels
            .get("com.docker.swarm.node.addr")
            .cloned()
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::client::MockDaemonClient;
    use bollard::models::{ContainerState, ContainerStateStatusEnum, SystemInfo, SystemVersion};

    fn summary(id: &str) -> ContainerSummary {
        ContainerSummary {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    fn inspect(id: &str, running: bool) -> ContainerInspectResponse {
        ContainerInspectResponse {
            id: Some(id.to_string()),
            name: Some(format!("/{id}")),
            state: Some(ContainerState {
                running: Some(running),
                status: Some(ContainerStateStatusEnum::RUNNING),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn skips_daemon_on_list_failure_but_continues_others() {
        let mut failing = MockDaemonClient::new();
        failing.expect_info().returning(|| Ok(SystemInfo::default()));
        failing.expect_version().returning(|| Ok(SystemVersion::default()));
        failing
            .expect_list_containers()
            .returning(|_| Err(bollard::errors::Error::DockerResponseServerError { status_code: 500, message: "list failed".to_string() }));

        let mut working = MockDaemonClient::new();
        working.expect_info().returning(|| Ok(SystemInfo::default()));
        working.expect_version().returning(|| Ok(SystemVersion::default()));
        working
            .expect_list_containers()
            .returning(|_| Ok(vec![summary("abc123")]));
        working
            .expect_inspect_container()
            .returning(|id| Ok(inspect(id, true)));

        let daemons = vec![
            DaemonHandle {
                endpoint: "failing".to_string(),
                client: Box::new(failing),
            },
            DaemonHandle {
                endpoint: "working".to_string(),
                client: Box::new(working),
            },
        ];

        let containers = ContainerSnapshot::new(&daemons).get_containers(true).await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "abc123");
        assert!(containers[0].running);
    }

    #[tokio::test]
    async fn skips_individual_container_on_inspect_failure() {
        let mut client = MockDaemonClient::new();
        client.expect_info().returning(|| Ok(SystemInfo::default()));
        client.expect_version().returning(|| Ok(SystemVersion::default()));
        client
            .expect_list_containers()
            .returning(|_| Ok(vec![summary("good"), summary("bad")]));
        client.expect_inspect_container().returning(|id| {
            if id == "bad" {
                Err(bollard::errors::Error::DockerResponseServerError { status_code: 500, message: "inspect failed".to_string() })
            } else {
                Ok(inspect(id, true))
            }
        });

        let daemons = vec![DaemonHandle {
            endpoint: "local".to_string(),
            client: Box::new(client),
        }];

        let containers = ContainerSnapshot::new(&daemons).get_containers(true).await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "good");
    }

    #[test]
    fn recovers_swarm_node_from_legacy_labels() {
        let mut labels = HashMap::new();
        labels.insert("com.docker.swarm.node.id".to_string(), "node-1".to_string());
        labels.insert(
            "com.docker.swarm.node.name".to_string(),
            "worker-1".to_string(),
        );
        let node = build_swarm_node(&labels).expect("node present");
        assert_eq!(node.id, "node-1");
        assert_eq!(node.name, "worker-1");
    }

    #[test]
    fn no_swarm_node_without_labels() {
        assert!(build_swarm_node(&HashMap::new()).is_none());
    }
}
