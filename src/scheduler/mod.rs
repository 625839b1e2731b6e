use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::{ConfigFile, TemplateConfig, TlsConfig as ConfigTlsConfig};
use crate::docker::factory::{DaemonClientFactory, TlsConfig as FactoryTlsConfig};
use crate::docker::snapshot::{ContainerSnapshot, DaemonHandle};
use crate::error::Error;
use crate::events::debounce::DebounceGate;
use crate::events::signals::{ReloadSignal, SignalSource};
use crate::events::watcher::{EventWatcher, WatchEvent};
use crate::render::renderer::Renderer;
use crate::render::step::RenderStep;

/// What woke the render loop, and how it should treat the result.
enum Trigger {
    /// A single template's debounce gate fired: change-gated, per distilled
    /// §4.7/§8 invariant 2.
    Template(usize),
    /// A single template's interval ticker fired: notifications always fire
    /// regardless of the renderer's `changed` flag (distilled §4.7 step 2).
    Interval(usize),
    /// A watcher (re)bound to a daemon (SyncEvent), or SIGHUP arrived:
    /// re-render every watched template, change-gated per template just like
    /// any other render pass (distilled §4.7 step 3, §8 S5).
    AllWatched,
    Shutdown,
}

struct Inner {
    daemons: Vec<DaemonHandle>,
    factory: DaemonClientFactory,
    tls: Option<ConfigTlsConfig>,
    renderer: Box<dyn Renderer>,
}

impl Inner {
    async fn snapshot(&self) -> Vec<crate::docker::model::RuntimeContainer> {
        ContainerSnapshot::new(&self.daemons).get_containers(true).await
    }
}

/// Drives the whole program: one initial render pass, then (if any template
/// watches or polls) interval drivers, per-daemon event watchers, and a
/// SIGHUP/SIGINT/SIGTERM signal reactor, all funneling into a single render
/// loop so at most one render-and-notify pass runs at a time (distilled §4).
pub struct Scheduler {
    inner: Arc<Inner>,
    templates: Vec<TemplateConfig>,
}

impl Scheduler {
    pub fn new(config: ConfigFile, renderer: Box<dyn Renderer>) -> Result<Self, Error> {
        if config.endpoints.is_empty() {
            return Err(Error::NoEndpoints);
        }

        let factory = DaemonClientFactory::default();
        let factory_tls: Option<FactoryTlsConfig> = config.tls.clone().map(Into::into);

        let mut daemons = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let client = factory.build(endpoint, factory_tls.as_ref())?;
            daemons.push(DaemonHandle {
                endpoint: endpoint.clone(),
                client,
            });
        }

        Ok(Self {
            inner: Arc::new(Inner {
                daemons,
                factory,
                tls: config.tls,
                renderer,
            }),
            templates: config.templates,
        })
    }

    /// Runs the program to completion: once for static-only configs, forever
    /// otherwise, until a shutdown signal arrives.
    pub async fn generate(self) -> Result<(), Error> {
        let step = RenderStep;
        let containers = self.inner.snapshot().await;

        for template in &self.templates {
            if let Err(error) = step
                .execute(template, &containers, self.inner.renderer.as_ref(), &self.inner.daemons, false)
                .await
            {
                error!(dest = %template.dest.display(), %error, "initial render failed");
            }
        }

        if self.templates.iter().all(|t| t.is_static()) {
            info!("no watched or polled templates configured, exiting after initial render");
            return Ok(());
        }

        self.run_reactive(step).await;
        Ok(())
    }

    async fn run_reactive(self, step: RenderStep) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<Trigger>(256);
        let mut join_handles = Vec::new();

        // Interval drivers: one per template with a positive poll interval.
        for (index, template) in self.templates.iter().enumerate() {
            if template.interval == 0 {
                continue;
            }
            let tx = trigger_tx.clone();
            let mut shutdown = shutdown_rx.clone();
            let period = Duration::from_secs(template.interval);
            join_handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => return,
                        _ = ticker.tick() => {
                            if tx.send(Trigger::Interval(index)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }));
        }

        // Per-daemon event watchers, fanned into one aggregate channel.
        let (watch_tx, mut watch_rx) = mpsc::channel::<WatchEvent>(256);
        for daemon in &self.inner.daemons {
            let watcher = EventWatcher::new(daemon.endpoint.clone());
            let factory = DaemonClientFactory::default();
            let tls = self.inner.tls.clone();
            let tx = watch_tx.clone();
            let shutdown = shutdown_rx.clone();
            join_handles.push(tokio::spawn(async move {
                watcher.run(&factory, tls.as_ref(), tx, shutdown).await;
            }));
        }
        drop(watch_tx);

        // One debounce gate per watched template, fed from the aggregate
        // watcher channel and forwarding into the shared trigger channel.
        let watched_indices: Vec<usize> = self
            .templates
            .iter()
            .enumerate()
            .filter(|(_, t)| t.watch)
            .map(|(index, _)| index)
            .collect();

        let mut debounce_inputs = Vec::with_capacity(watched_indices.len());
        for &index in &watched_indices {
            let (debounce_in_tx, debounce_in_rx) = mpsc::channel::<()>(64);
            let (debounce_out_tx, mut debounce_out_rx) = mpsc::channel::<()>(8);
            let gate = DebounceGate::new(self.templates[index].wait);

            join_handles.push(tokio::spawn(async move {
                gate.run(debounce_in_rx, debounce_out_tx).await;
            }));

            let tx = trigger_tx.clone();
            join_handles.push(tokio::spawn(async move {
                while debounce_out_rx.recv().await.is_some() {
                    if tx.send(Trigger::Template(index)).await.is_err() {
                        return;
                    }
                }
            }));

            debounce_inputs.push(debounce_in_tx);
        }

        // Fans watcher output either into "force full re-render" (Sync) or
        // into every watched template's debounce gate (Changed).
        {
            let tx = trigger_tx.clone();
            join_handles.push(tokio::spawn(async move {
                while let Some(event) = watch_rx.recv().await {
                    match event {
                        WatchEvent::Sync => {
                            if tx.send(Trigger::AllWatched).await.is_err() {
                                return;
                            }
                        }
                        WatchEvent::Changed { container_id } => {
                            tracing::debug!(container_id, "container change observed, debouncing");
                            for input in &debounce_inputs {
                                let _ = input.send(()).await;
                            }
                        }
                        WatchEvent::ClientDone => {
                            warn!("event watcher gave up permanently, shutting down");
                            let _ = tx.send(Trigger::Shutdown).await;
                            return;
                        }
                    }
                }
            }));
        }

        // Signal reactor: SIGHUP forces a full re-render, SIGINT/SIGTERM
        // begin cooperative shutdown.
        {
            let tx = trigger_tx.clone();
            let shutdown_tx = shutdown_tx.clone();
            join_handles.push(tokio::spawn(async move {
                let mut signals = match SignalSource::new() {
                    Ok(signals) => signals,
                    Err(error) => {
                        warn!(%error, "failed to install signal handlers");
                        return;
                    }
                };
                loop {
                    match signals.recv().await {
                        ReloadSignal::Reload => {
                            if tx.send(Trigger::AllWatched).await.is_err() {
                                return;
                            }
                        }
                        ReloadSignal::Shutdown => {
                            let _ = shutdown_tx.send(true);
                            let _ = tx.send(Trigger::Shutdown).await;
                            return;
                        }
                    }
                }
            }));
        }

        drop(trigger_tx);

        while let Some(trigger) = trigger_rx.recv().await {
            match trigger {
                Trigger::Shutdown => break,
                Trigger::Template(index) => {
                    let Some(template) = self.templates.get(index) else { continue };
                    let containers = self.inner.snapshot().await;
                    if let Err(error) = step
                        .execute(template, &containers, self.inner.renderer.as_ref(), &self.inner.daemons, false)
                        .await
                    {
                        error!(dest = %template.dest.display(), %error, "render failed");
                    }
                }
                Trigger::Interval(index) => {
                    let Some(template) = self.templates.get(index) else { continue };
                    let containers = self.inner.snapshot().await;
                    if let Err(error) = step
                        .execute(template, &containers, self.inner.renderer.as_ref(), &self.inner.daemons, true)
                        .await
                    {
                        error!(dest = %template.dest.display(), %error, "interval render failed");
                    }
                }
                Trigger::AllWatched => {
                    let containers = self.inner.snapshot().await;
                    for &index in &watched_indices {
                        let template = &self.templates[index];
                        if let Err(error) = step
                            .execute(template, &containers, self.inner.renderer.as_ref(), &self.inner.daemons, false)
                            .await
                        {
                            error!(dest = %template.dest.display(), %error, "resync render failed");
                        }
                    }
                }
            }
        }

        let _ = shutdown_tx.send(true);
        for handle in join_handles {
            let _ = handle.await;
        }
    }
}
