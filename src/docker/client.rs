use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerSummary, SystemInfo, SystemVersion};
use bollard::query_parameters::{
    EventsOptions, InspectContainerOptions, KillContainerOptions, ListContainersOptions,
    RestartContainerOptions,
};
use bollard::Docker;
use futures_util::stream::{Stream, StreamExt};

/// A single container lifecycle event, normalized from the daemon's wire event.
///
/// Only `status` values of `start`, `stop` and `die` are meaningful to the
/// rest of the system (distilled §3); everything else is discarded by
/// `events::watcher`, not here, so this type carries whatever the daemon sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub status: String,
    pub container_id: String,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event, bollard::errors::Error>> + Send>>;

/// Capability interface for a single container daemon.
///
/// Abstracted from `bollard::Docker` so the rest of the system can be tested
/// against an in-memory fake (`MockDaemonClient`) instead of a live daemon,
/// per the design note in distilled §9 ("dynamic dispatch to daemon client").
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DaemonClient: Send + Sync {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, bollard::errors::Error>;

    async fn list_containers_filtered(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<ContainerSummary>, bollard::errors::Error>;

    async fn inspect_container(
        &self,
        id: &str,
    ) -> Result<ContainerInspectResponse, bollard::errors::Error>;

    async fn info(&self) -> Result<SystemInfo, bollard::errors::Error>;

    async fn version(&self) -> Result<SystemVersion, bollard::errors::Error>;

    async fn ping(&self) -> Result<(), bollard::errors::Error>;

    async fn kill_container(&self, id: &str, signal: i32) -> Result<(), bollard::errors::Error>;

    async fn restart_container(
        &self,
        id: &str,
        grace_seconds: i64,
    ) -> Result<(), bollard::errors::Error>;

    /// Subscribes to the daemon's event stream. Returns an error immediately
    /// if the subscription cannot be established; per distilled §4.5, the
    /// caller treats a "stream already exists" error as success and anything
    /// else as a reason to drop the client and retry.
    fn subscribe(&self) -> EventStream;
}

/// `DaemonClient` backed by a real `bollard::Docker` connection.
pub struct BollardClient {
    docker: Docker,
}

impl BollardClient {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl DaemonClient for BollardClient {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, bollard::errors::Error> {
        let options = ListContainersOptions {
            all,
            ..Default::default()
        };
        self.docker.list_containers(Some(options)).await
    }

    async fn list_containers_filtered(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> Result<Vec<ContainerSummary>, bollard::errors::Error> {
        let options = ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };
        self.docker.list_containers(Some(options)).await
    }

    async fn inspect_container(
        &self,
        id: &str,
    ) -> Result<ContainerInspectResponse, bollard::errors::Error> {
        self.docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
    }

    async fn info(&self) -> Result<SystemInfo, bollard::errors::Error> {
        self.docker.info().await
    }

    async fn version(&self) -> Result<SystemVersion, bollard::errors::Error> {
        self.docker.version().await
    }

    async fn ping(&self) -> Result<(), bollard::errors::Error> {
        self.docker.ping().await.map(|_| ())
    }

    async fn kill_container(&self, id: &str, signal: i32) -> Result<(), bollard::errors::Error> {
        let options = KillContainerOptions {
            signal: Some(signal.to_string()),
        };
        self.docker.kill_container(id, Some(options)).await
    }

    async fn restart_container(
        &self,
        id: &str,
        grace_seconds: i64,
    ) -> Result<(), bollard::errors::Error> {
        let options = RestartContainerOptions {
            signal: None,
            t: Some(grace_seconds as i32),
        };
        self.docker.restart_container(id, Some(options)).await
    }

    fn subscribe(&self) -> EventStream {
        let filters = HashMap::from([("type".to_string(), vec!["container".to_string()])]);
        let options = EventsOptions {
            filters: Some(filters),
            ..Default::default()
        };
        let stream = self.docker.events(Some(options)).map(|result| {
            result.map(|event| Event {
                status: event.action.unwrap_or_default(),
                container_id: event
                    .actor
                    .and_then(|actor| actor.id)
                    .unwrap_or_default(),
            })
        });
        Box::pin(stream)
    }
}
