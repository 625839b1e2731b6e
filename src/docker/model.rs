use std::collections::HashMap;

use serde::Serialize;

/// A normalized, immutable snapshot of one container as seen at one render pass.
///
/// Scoped to a single `ContainerSnapshot::get_containers` call; never mutated
/// in place, never shared across render passes.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuntimeContainer {
    pub id: String,
    pub image: ImageRef,
    pub running: bool,
    /// Container name with the leading `/` stripped.
    pub name: String,
    pub hostname: String,
    pub gateway: String,
    pub ip: String,
    pub ip6_link_local: String,
    pub ip6_global: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub volumes: HashMap<String, Volume>,
    pub mounts: Vec<Mount>,
    pub addresses: Vec<NetworkAddress>,
    pub networks: Vec<Network>,
    pub node: Option<SwarmNode>,
}

/// `(registry, repository, tag)` as parsed from a Docker image reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub path: String,
    pub host_path: String,
    pub read_write: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mount {
    pub name: Option<String>,
    pub source: String,
    pub destination: String,
    pub driver: Option<String>,
    pub mode: String,
    pub rw: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NetworkAddress {
    pub ip: String,
    pub ip6_link_local: String,
    pub ip6_global: String,
    pub port: String,
    pub proto: String,
    pub host_port: String,
    pub host_ip: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Network {
    pub name: String,
    pub ip: String,
    pub gateway: String,
    pub endpoint_id: String,
    pub ip6_global: String,
    pub ip6_gateway: String,
    pub mac_address: String,
    pub prefix_len: i64,
    pub ip6_prefix_len: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SwarmNode {
    pub id: String,
    pub name: String,
    pub address: String,
}

impl ImageRef {
    /// Splits `registry/repository:tag` per the convention in distilled §4.2:
    /// a registry prefix is only recognized when its first segment contains
    /// `.` or `:` or equals `localhost`; an absent tag defaults to `latest`.
    pub fn parse(image: &str) -> Self {
        let (repo_and_tag, registry) = match image.split_once('/') {
            Some((first, rest)) if first.contains('.') || first.contains(':') || first == "localhost" => {
                (rest, first.to_string())
            }
            _ => (image, String::new()),
        };

        let (repository, tag) = match repo_and_tag.rsplit_once(':') {
            // A ':' that is part of a port number (appears before any '/') is not a tag separator.
            Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
            _ => (repo_and_tag.to_string(), "latest".to_string()),
        };

        Self {
            registry,
            repository,
            tag,
        }
    }
}

/// Parses `KEY=VALUE` environment strings into a mapping.
///
/// A string missing `=` contributes `key = whole-string, value = ""`, per
/// distilled §4.2.
pub fn parse_env(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_repository() {
        let image = ImageRef::parse("nginx:1.25");
        assert_eq!(image.registry, "");
        assert_eq!(image.repository, "nginx");
        assert_eq!(image.tag, "1.25");
    }

    #[test]
    fn defaults_to_latest_tag() {
        let image = ImageRef::parse("nginx");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn parses_registry_with_dot() {
        let image = ImageRef::parse("registry.example.com/team/app:v2");
        assert_eq!(image.registry, "registry.example.com");
        assert_eq!(image.repository, "team/app");
        assert_eq!(image.tag, "v2");
    }

    #[test]
    fn parses_registry_with_port() {
        let image = ImageRef::parse("localhost:5000/app:latest");
        assert_eq!(image.registry, "localhost:5000");
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn parses_bare_localhost_registry() {
        let image = ImageRef::parse("localhost/app");
        assert_eq!(image.registry, "localhost");
        assert_eq!(image.repository, "app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn does_not_mistake_docker_hub_namespace_for_registry() {
        let image = ImageRef::parse("library/nginx:latest");
        assert_eq!(image.registry, "");
        assert_eq!(image.repository, "library/nginx");
    }

    #[test]
    fn parses_env_with_equals() {
        let env = parse_env(&["FOO=bar".to_string(), "BAZ=".to_string()]);
        assert_eq!(env.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(env.get("BAZ"), Some(&"".to_string()));
    }

    #[test]
    fn parses_env_missing_equals() {
        let env = parse_env(&["NOEQUALS".to_string()]);
        assert_eq!(env.get("NOEQUALS"), Some(&"".to_string()));
    }

    #[test]
    fn parses_env_value_containing_equals() {
        let env = parse_env(&["FOO=a=b=c".to_string()]);
        assert_eq!(env.get("FOO"), Some(&"a=b=c".to_string()));
    }
}
