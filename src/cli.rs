use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

use crate::config::{ConfigFile, TemplateConfig, TlsConfig, WaitConfig, RESTART_SENTINEL};
use crate::error::Error;

fn get_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Red.on_default())
}

/// Generates files from templates populated with live container metadata.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, styles = get_styles())]
pub struct Args {
    /// Path to a YAML config file. Ignored for any setting overridden below.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Daemon endpoint(s) to connect to. Can be given multiple times.
    ///
    /// Examples: local, unix:///var/run/docker.sock, tcp://host:2375,
    /// tls://host:2376, ssh://user@host
    #[arg(short = 'e', long = "endpoint", verbatim_doc_comment)]
    pub endpoint: Vec<String>,

    /// `src:dest` template pair. Can be given multiple times; each pair
    /// becomes one independently-rendered template.
    #[arg(short = 't', long = "template")]
    pub template: Vec<String>,

    /// Watch the daemon event stream and re-render on every container
    /// change, applied to every `--template` pair given on the CLI.
    #[arg(short = 'w', long = "watch")]
    pub watch: bool,

    /// Re-render every N seconds, applied to every `--template` pair given
    /// on the CLI. 0 disables interval rendering.
    #[arg(short = 'i', long = "interval", default_value_t = 0)]
    pub interval: u64,

    /// `min:max` debounce window in milliseconds for `--watch`, applied to
    /// every `--template` pair given on the CLI.
    #[arg(long = "wait")]
    pub wait: Option<String>,

    /// Shell command to run after every changed render, applied to every
    /// `--template` pair given on the CLI.
    #[arg(short = 'n', long = "notify")]
    pub notify: Option<String>,

    /// Log the notify command's stdout.
    #[arg(long = "notify-output")]
    pub notify_output: bool,

    /// Send SIGHUP to the named container after every changed render.
    /// Sugar for a `notifyContainers` entry with signal 1; can be given
    /// multiple times.
    #[arg(long = "notify-sighup")]
    pub notify_sighup: Vec<String>,

    /// TLS certificate path, used for `tcp://`/`tls://` endpoints.
    #[arg(long = "tlscert")]
    pub tls_cert: Option<PathBuf>,
    #[arg(long = "tlskey")]
    pub tls_key: Option<PathBuf>,
    #[arg(long = "tlscacert")]
    pub tls_ca: Option<PathBuf>,
    #[arg(long = "tlsverify")]
    pub tls_verify: bool,
}

impl Args {
    /// Resolves the final `ConfigFile` this run should use: a config file
    /// (if `--config` is given or a default path exists) with any CLI flags
    /// applied on top, per the precedence `merge_with_cli_hosts` establishes
    /// in the teacher: CLI values win, config values fill in what the CLI
    /// didn't set.
    pub fn resolve_config(&self) -> Result<ConfigFile, Error> {
        let mut config = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        if !self.endpoint.is_empty() {
            config.endpoints = self.endpoint.clone();
        }

        let tls = self.resolve_tls();
        if tls.is_some() {
            config.tls = tls;
        }

        if !self.template.is_empty() {
            config.templates = self.build_cli_templates()?;
        }

        Ok(config)
    }

    fn resolve_tls(&self) -> Option<TlsConfig> {
        if self.tls_cert.is_none() && self.tls_key.is_none() && self.tls_ca.is_none() && !self.tls_verify {
            return None;
        }
        Some(TlsConfig {
            verify: self.tls_verify,
            cert: self.tls_cert.clone().unwrap_or_default(),
            key: self.tls_key.clone().unwrap_or_default(),
            ca: self.tls_ca.clone().unwrap_or_default(),
        })
    }

    fn build_cli_templates(&self) -> Result<Vec<TemplateConfig>, Error> {
        let wait = self.parse_wait()?;
        let notify_containers = self.build_notify_sighup_map();

        self.template
            .iter()
            .map(|pair| {
                let (src, dest) = pair.split_once(':').ok_or_else(|| {
                    Error::Config {
                        path: pair.clone(),
                        source: crate::error::ConfigSource::Io(std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "expected src:dest",
                        )),
                    }
                })?;
                Ok(TemplateConfig {
                    src: PathBuf::from(src),
                    dest: PathBuf::from(dest),
                    watch: self.watch,
                    interval: self.interval,
                    wait,
                    notify_cmd: self.notify.clone(),
                    notify_output: self.notify_output,
                    notify_containers: notify_containers.clone(),
                    notify_containers_filter: HashMap::new(),
                    notify_containers_signal: 0,
                })
            })
            .collect()
    }

    fn parse_wait(&self) -> Result<Option<WaitConfig>, Error> {
        let Some(raw) = &self.wait else { return Ok(None) };
        let (min, max) = raw.split_once(':').unwrap_or((raw.as_str(), raw.as_str()));
        let parse = |s: &str| {
            s.trim().parse::<u64>().map_err(|_| Error::Config {
                path: raw.clone(),
                source: crate::error::ConfigSource::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "expected min:max milliseconds",
                )),
            })
        };
        Ok(Some(WaitConfig {
            min_ms: parse(min)?,
            max_ms: parse(max)?,
        }))
    }

    /// `-notify-sighup <container>` is pure sugar: it adds one
    /// `notifyContainers` entry per container with SIGHUP (signal 1), never
    /// the restart sentinel.
    fn build_notify_sighup_map(&self) -> HashMap<String, i32> {
        debug_assert_ne!(1, RESTART_SENTINEL);
        self.notify_sighup
            .iter()
            .map(|container| (container.clone(), 1))
            .collect()
    }
}
