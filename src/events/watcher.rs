use std::time::Duration;

use futures_util::stream::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::TlsConfig as ConfigTlsConfig;
use crate::docker::factory::{DaemonClientFactory, TlsConfig as FactoryTlsConfig};
use crate::error::Error;

const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(10);

/// Notification emitted by `EventWatcher` toward the scheduler's fan-out.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// Emitted once right after (re)binding to a daemon. Per distilled §4.5
    /// this means "force a full re-render", not "forward to per-template
    /// debounce gates" — a freshly (re)connected watcher has no incremental
    /// diff to offer.
    Sync,
    Changed { container_id: String },
    /// This watcher has given up for good (unresolvable endpoint) and will
    /// not retry. Per distilled §4.5/§7, this is the only case where an
    /// EventWatcher's failure is "permanent": everything else loops with a
    /// backoff instead of surfacing.
    ClientDone,
}

/// Watches one daemon's event stream, reconnecting with a fixed backoff
/// whenever the stream ends or a liveness ping fails (distilled §4.5).
pub struct EventWatcher {
    endpoint: String,
}

impl EventWatcher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }

    /// Runs until `shutdown` is set to `true`. Shutdown firing mid-stream
    /// aborts the current subscription immediately; dropping the client
    /// connection is enough, there is no graceful unsubscribe to wait for.
    pub async fn run(
        &self,
        factory: &DaemonClientFactory,
        tls: Option<&ConfigTlsConfig>,
        tx: mpsc::Sender<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let factory_tls: Option<FactoryTlsConfig> = tls.cloned().map(Into::into);

        loop {
            if *shutdown.borrow() {
                return;
            }

            let client = match factory.build(&self.endpoint, factory_tls.as_ref()) {
                Ok(client) => client,
                // `BadEndpoint` means the endpoint string itself is unresolvable:
                // no amount of retrying will fix it, so this watcher gives up
                // for good (distilled §4.5 step 1, "on resolve failure signal
                // clientDone and exit").
                Err(error @ Error::BadEndpoint(_)) => {
                    warn!(endpoint = %self.endpoint, %error, "endpoint unresolvable, giving up");
                    let _ = tx.send(WatchEvent::ClientDone).await;
                    return;
                }
                // Any other construction failure (e.g. transport init) is
                // transient: back off and retry (distilled §4.5 step 1,
                // "on construct failure, sleep 10s and retry").
                Err(error) => {
                    warn!(endpoint = %self.endpoint, %error, "failed to connect, retrying");
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => continue,
                    }
                }
            };

            if tx.send(WatchEvent::Sync).await.is_err() {
                return;
            }
            info!(endpoint = %self.endpoint, "subscribed to daemon events");

            let mut stream = client.subscribe();
            let mut ping_interval = tokio::time::interval(PING_INTERVAL);
            ping_interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.changed() => return,
                    _ = ping_interval.tick() => {
                        if let Err(error) = client.ping().await {
                            warn!(endpoint = %self.endpoint, %error, "liveness ping failed, reconnecting");
                            break;
                        }
                    }
                    item = stream.next() => {
                        match item {
                            Some(Ok(event)) => {
                                if !matches!(event.status.as_str(), "start" | "stop" | "die") {
                                    continue;
                                }
                                let id = event.container_id.get(..12).unwrap_or(&event.container_id);
                                debug!(endpoint = %self.endpoint, status = %event.status, id, "daemon event");
                                if tx.send(WatchEvent::Changed { container_id: event.container_id }).await.is_err() {
                                    return;
                                }
                            }
                            Some(Err(error)) => {
                                warn!(endpoint = %self.endpoint, %error, "event stream error, reconnecting");
                                break;
                            }
                            None => {
                                warn!(endpoint = %self.endpoint, "event stream closed, reconnecting");
                                break;
                            }
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gives_up_permanently_on_unresolvable_endpoint() {
        let watcher = EventWatcher::new("ftp://example.com");
        let factory = DaemonClientFactory::default();
        let (tx, mut rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        watcher.run(&factory, None, tx, shutdown_rx).await;

        assert!(matches!(rx.recv().await, Some(WatchEvent::ClientDone)));
        assert!(rx.recv().await.is_none());
    }
}
