use std::path::PathBuf;

use bollard::{Docker, API_DEFAULT_VERSION};
use tracing::debug;

use crate::docker::client::{BollardClient, DaemonClient};
use crate::error::Error;

/// TLS material for `tcp://`/`tls://` endpoints, generalizing the teacher's
/// `DOCKER_CERT_PATH`-only handling into explicit fields (distilled §4.1).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub verify: bool,
    pub cert: PathBuf,
    pub ca: PathBuf,
    pub key: PathBuf,
}

/// Resolves endpoint strings and constructs `DaemonClient`s.
///
/// Endpoint connections are lazy and re-attempted by `events::watcher` on
/// failure; this factory only performs the synchronous part of resolution
/// and transport construction (distilled §4.1).
pub struct DaemonClientFactory {
    timeout_secs: u64,
}

impl Default for DaemonClientFactory {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl DaemonClientFactory {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    /// Builds a `DaemonClient` for `endpoint`, which may be `unix:///...`,
    /// `tcp://host:port`, `ssh://user@host[:port]`, or the bare word `local`.
    pub fn build(&self, endpoint: &str, tls: Option<&TlsConfig>) -> Result<Box<dyn DaemonClient>, Error> {
        let docker = self.connect(endpoint, tls)?;
        Ok(Box::new(BollardClient::new(docker)))
    }

    fn connect(&self, endpoint: &str, tls: Option<&TlsConfig>) -> Result<Docker, Error> {
        let make_err = |source: bollard::errors::Error| Error::ClientInit {
            endpoint: endpoint.to_string(),
            source,
        };

        if endpoint == "local" || endpoint.is_empty() {
            debug!("connecting to local daemon");
            Docker::connect_with_local_defaults().map_err(make_err)
        } else if let Some(socket_path) = endpoint.strip_prefix("unix://") {
            debug!(socket = socket_path, "connecting over unix socket");
            Docker::connect_with_unix(socket_path, self.timeout_secs, API_DEFAULT_VERSION)
                .map_err(make_err)
        } else if endpoint.starts_with("ssh://") {
            debug!(endpoint, "connecting over ssh");
            Docker::connect_with_ssh(endpoint, self.timeout_secs, API_DEFAULT_VERSION, None)
                .map_err(make_err)
        } else if let Some(tls) = tls.filter(|_| endpoint.starts_with("tcp://") || endpoint.starts_with("tls://")) {
            let tcp_endpoint = endpoint.replacen("tls://", "tcp://", 1);
            debug!(endpoint = %tcp_endpoint, verify = tls.verify, "connecting over tls");
            Docker::connect_with_ssl(
                &tcp_endpoint,
                &tls.key,
                &tls.cert,
                &tls.ca,
                self.timeout_secs,
                API_DEFAULT_VERSION,
            )
            .map_err(make_err)
        } else if endpoint.starts_with("tcp://") {
            debug!(endpoint, "connecting over tcp");
            Docker::connect_with_http(endpoint, self.timeout_secs, API_DEFAULT_VERSION)
                .map_err(make_err)
        } else if endpoint.contains("://") {
            Err(Error::BadEndpoint(endpoint.to_string()))
        } else {
            // Bare `host:port` is accepted as shorthand for `tcp://host:port`.
            let tcp_endpoint = format!("tcp://{endpoint}");
            debug!(endpoint = %tcp_endpoint, "connecting over tcp (shorthand)");
            Docker::connect_with_http(&tcp_endpoint, self.timeout_secs, API_DEFAULT_VERSION)
                .map_err(make_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognized_scheme() {
        let factory = DaemonClientFactory::default();
        let result = factory.connect("ftp://example.com", None);
        assert!(matches!(result, Err(Error::BadEndpoint(_))));
    }
}
