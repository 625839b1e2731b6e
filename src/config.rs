use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::docker::factory::TlsConfig as FactoryTlsConfig;
use crate::error::{ConfigSource, Error};

/// Sentinel signal value meaning "restart with 10s grace" instead of a plain
/// kill, per distilled §3/§4.3.
pub const RESTART_SENTINEL: i32 = -1;

/// Per-template debounce window (distilled §3). `min == 0` disables
/// debouncing entirely (distilled §4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default)]
    pub min_ms: u64,
    #[serde(default)]
    pub max_ms: u64,
}

impl WaitConfig {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms.max(self.min_ms))
    }

    pub fn is_active(&self) -> bool {
        self.min_ms > 0
    }
}

/// Per-template configuration recognized by the scheduler (distilled §3,
/// "TriggerConfig").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Template source path, consumed by the `Renderer` (out-of-scope
    /// collaborator per distilled §1, but a concrete field is needed for a
    /// runnable crate — see SPEC_FULL.md §9.5).
    pub src: PathBuf,
    pub dest: PathBuf,
    #[serde(default)]
    pub watch: bool,
    /// Re-render period in seconds; 0 disables the interval driver.
    #[serde(default)]
    pub interval: u64,
    #[serde(default)]
    pub wait: Option<WaitConfig>,
    #[serde(default)]
    pub notify_cmd: Option<String>,
    #[serde(default)]
    pub notify_output: bool,
    /// Container id -> signal. `RESTART_SENTINEL` (-1) means restart instead
    /// of kill.
    #[serde(default)]
    pub notify_containers: HashMap<String, i32>,
    /// Daemon-side list filter used to resolve a dynamic set of containers to
    /// signal, applied against the first configured daemon.
    #[serde(default)]
    pub notify_containers_filter: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub notify_containers_signal: i32,
}

impl TemplateConfig {
    /// A template with neither `watch` nor a positive `interval` renders only
    /// once at startup (distilled §3 invariant).
    pub fn is_static(&self) -> bool {
        !self.watch && self.interval == 0
    }
}

/// TLS material as loaded from the config file, before being handed to
/// `docker::factory::DaemonClientFactory`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub verify: bool,
    pub cert: PathBuf,
    pub ca: PathBuf,
    pub key: PathBuf,
}

impl From<TlsConfig> for FactoryTlsConfig {
    fn from(config: TlsConfig) -> Self {
        FactoryTlsConfig {
            verify: config.verify,
            cert: config.cert,
            ca: config.ca,
            key: config.key,
        }
    }
}

/// The on-disk configuration: daemon endpoints, optional shared TLS material,
/// and the template list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub templates: Vec<TemplateConfig>,
}

impl ConfigFile {
    pub fn load(path: &std::path::Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Config {
            path: path.display().to_string(),
            source: ConfigSource::Io(source),
        })?;
        serde_yaml::from_str(&contents).map_err(|source| Error::Config {
            path: path.display().to_string(),
            source: ConfigSource::Yaml(source),
        })
    }

    /// Templates that request watching (distilled §3's `FilterWatches`).
    pub fn watched_templates(&self) -> impl Iterator<Item = &TemplateConfig> {
        self.templates.iter().filter(|t| t.watch)
    }

    pub fn any_watched(&self) -> bool {
        self.templates.iter().any(|t| t.watch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_config_disabled_when_min_is_zero() {
        let wait = WaitConfig { min_ms: 0, max_ms: 1000 };
        assert!(!wait.is_active());
    }

    #[test]
    fn wait_config_max_floors_at_min() {
        let wait = WaitConfig { min_ms: 500, max_ms: 100 };
        assert_eq!(wait.max(), Duration::from_millis(500));
    }

    #[test]
    fn template_is_static_without_watch_or_interval() {
        let template = TemplateConfig {
            src: PathBuf::from("a.tmpl"),
            dest: PathBuf::from("a.conf"),
            watch: false,
            interval: 0,
            wait: None,
            notify_cmd: None,
            notify_output: false,
            notify_containers: HashMap::new(),
            notify_containers_filter: HashMap::new(),
            notify_containers_signal: 0,
        };
        assert!(template.is_static());
    }

    #[test]
    fn parses_yaml_config() {
        let yaml = r#"
endpoints:
  - local
templates:
  - src: nginx.tmpl
    dest: nginx.conf
    watch: true
    wait:
      min_ms: 200
      max_ms: 2000
"#;
        let config: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.endpoints, vec!["local".to_string()]);
        assert_eq!(config.templates.len(), 1);
        assert!(config.templates[0].watch);
        assert!(config.any_watched());
        let wait = config.templates[0].wait.unwrap();
        assert_eq!(wait.min(), Duration::from_millis(200));
        assert_eq!(wait.max(), Duration::from_millis(2000));
    }

    #[test]
    fn filters_watched_templates() {
        let mut config = ConfigFile::default();
        config.templates.push(TemplateConfig {
            src: PathBuf::from("a.tmpl"),
            dest: PathBuf::from("a.conf"),
            watch: false,
            interval: 0,
            wait: None,
            notify_cmd: None,
            notify_output: false,
            notify_containers: HashMap::new(),
            notify_containers_filter: HashMap::new(),
            notify_containers_signal: 0,
        });
        config.templates.push(TemplateConfig {
            src: PathBuf::from("b.tmpl"),
            dest: PathBuf::from("b.conf"),
            watch: true,
            interval: 0,
            wait: None,
            notify_cmd: None,
            notify_output: false,
            notify_containers: HashMap::new(),
            notify_containers_filter: HashMap::new(),
            notify_containers_signal: 0,
        });

        let watched: Vec<_> = config.watched_templates().collect();
        assert_eq!(watched.len(), 1);
        assert_eq!(watched[0].dest, PathBuf::from("b.conf"));
    }
}
