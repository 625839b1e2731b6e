use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use bollard::models::{SystemInfo, SystemVersion};

/// Process-wide record of the last observed `Info`/`Version` per endpoint.
///
/// Per distilled §9, this is written from exactly one site (the scheduler,
/// once at init and once per snapshot pass) and read only by the renderer.
/// A `RwLock` behind a `OnceLock` is enough for a write-once-then-read-many
/// singleton of this shape; no extra crate needed.
#[derive(Clone, Debug, Default)]
pub struct DockerEnv {
    info: HashMap<String, SystemInfo>,
    version: HashMap<String, SystemVersion>,
}

impl DockerEnv {
    pub fn info(&self, endpoint: &str) -> Option<&SystemInfo> {
        self.info.get(endpoint)
    }

    pub fn version(&self, endpoint: &str) -> Option<&SystemVersion> {
        self.version.get(endpoint)
    }

    /// Endpoints observed so far, for templates that want to enumerate daemons.
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.info.keys().cloned().collect();
        for endpoint in self.version.keys() {
            if !endpoints.contains(endpoint) {
                endpoints.push(endpoint.clone());
            }
        }
        endpoints
    }
}

fn global() -> &'static RwLock<DockerEnv> {
    static ENV: OnceLock<RwLock<DockerEnv>> = OnceLock::new();
    ENV.get_or_init(|| RwLock::new(DockerEnv::default()))
}

/// Records `Info()` observed from `endpoint`. Overwrites any previous value.
pub fn set_docker_info(endpoint: &str, info: SystemInfo) {
    let mut env = global().write().expect("docker env lock poisoned");
    env.info.insert(endpoint.to_string(), info);
}

/// Records `Version()` observed from `endpoint`. Overwrites any previous value.
pub fn set_server_version(endpoint: &str, version: SystemVersion) {
    let mut env = global().write().expect("docker env lock poisoned");
    env.version.insert(endpoint.to_string(), version);
}

/// Snapshot of the current environment record, for the renderer to read.
pub fn snapshot() -> DockerEnv {
    global().read().expect("docker env lock poisoned").clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_back_version() {
        let version = SystemVersion {
            version: Some("27.0.0".to_string()),
            ..Default::default()
        };
        set_server_version("local", version.clone());
        let snap = snapshot();
        assert_eq!(snap.version("local").and_then(|v| v.version.clone()), Some("27.0.0".to_string()));
    }
}
