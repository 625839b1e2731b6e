use thiserror::Error;

/// Construction-time and config-loading failures.
///
/// Per the error taxonomy in the design doc, only these surface to a caller as
/// `Result`; everything that happens once the scheduler is running is logged
/// and handled locally instead of propagated (see `events::watcher`,
/// `docker::snapshot`, `render::step`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("unrecognized daemon endpoint '{0}'")]
    BadEndpoint(String),

    #[error("failed to construct client for endpoint '{endpoint}': {source}")]
    ClientInit {
        endpoint: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("failed to load config from {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: ConfigSource,
    },

    #[error("no daemon endpoints configured")]
    NoEndpoints,

    #[error("template render failed for {dest}: {source}")]
    Render {
        dest: String,
        #[source]
        source: tera::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigSource {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
