use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::{TemplateConfig, RESTART_SENTINEL};
use crate::docker::model::RuntimeContainer;
use crate::docker::snapshot::DaemonHandle;
use crate::error::Error;
use crate::render::renderer::Renderer;

/// Restart grace period used for `RESTART_SENTINEL` notify entries, matching
/// docker-gen's hardcoded 10s.
const RESTART_GRACE_SECONDS: i64 = 10;

/// Render-then-notify unit for one template (distilled §4.3). Owns no state;
/// every call is handed the current container list and daemon handles.
#[derive(Default)]
pub struct RenderStep;

impl RenderStep {
    /// Renders `config`, and if the output changed, runs its notify command
    /// and signals its notify containers. Returns whether the output changed.
    ///
    /// Errors from the notify command or from signaling containers are
    /// logged and swallowed, never surfaced — per distilled §6, only
    /// construction-time failures are `Result`s.
    /// `force` runs notify actions even when the rendered output is
    /// byte-identical to what was already on disk. Per distilled §4.7 step 2
    /// / §8 invariant 2, only interval-driven renders set this; SyncEvent and
    /// SIGHUP resyncs are change-gated like any other render.
    pub async fn execute(
        &self,
        config: &TemplateConfig,
        containers: &[RuntimeContainer],
        renderer: &dyn Renderer,
        daemons: &[DaemonHandle],
        force: bool,
    ) -> Result<bool, Error> {
        let changed = renderer.render(config, containers)?;
        if !changed && !force {
            debug!(dest = %config.dest.display(), "render produced no change, skipping notify");
            return Ok(false);
        }

        info!(dest = %config.dest.display(), changed, force, "running notify actions");

        if let Some(cmd) = &config.notify_cmd {
            self.run_notify_cmd(cmd, config.notify_output).await;
        }

        self.signal_notify_containers(config, daemons).await;
        self.signal_filtered_containers(config, daemons).await;

        Ok(true)
    }

    async fn run_notify_cmd(&self, cmd: &str, capture_output: bool) {
        let output = Command::new("/bin/sh").arg("-c").arg(cmd).output().await;
        match output {
            Ok(output) if output.status.success() => {
                if capture_output {
                    info!(
                        stdout = %String::from_utf8_lossy(&output.stdout),
                        "notify command succeeded"
                    );
                } else {
                    debug!("notify command succeeded");
                }
            }
            Ok(output) => {
                warn!(
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "notify command exited non-zero"
                );
            }
            Err(error) => error!(%error, "failed to spawn notify command"),
        }
    }

    /// Signals the explicit `notifyContainers` map.
    ///
    /// Reproduces docker-gen's own quirk: the first entry whose signal is
    /// `RESTART_SENTINEL` triggers a restart and then returns immediately,
    /// leaving any remaining entries in the map unsignaled for this pass.
    async fn signal_notify_containers(&self, config: &TemplateConfig, daemons: &[DaemonHandle]) {
        let Some(daemon) = daemons.first() else {
            return;
        };

        for (container_id, signal) in &config.notify_containers {
            if *signal == RESTART_SENTINEL {
                self.restart(daemon, container_id).await;
                return;
            }
            self.kill(daemon, container_id, *signal).await;
        }
    }

    /// Signals containers resolved dynamically via `notifyContainersFilter`,
    /// evaluated against the first configured daemon.
    async fn signal_filtered_containers(&self, config: &TemplateConfig, daemons: &[DaemonHandle]) {
        if config.notify_containers_filter.is_empty() {
            return;
        }
        let Some(daemon) = daemons.first() else {
            return;
        };

        let summaries = match daemon
            .client
            .list_containers_filtered(config.notify_containers_filter.clone())
            .await
        {
            Ok(summaries) => summaries,
            Err(error) => {
                warn!(endpoint = %daemon.endpoint, %error, "failed to resolve notify-containers-filter");
                return;
            }
        };

        for summary in summaries {
            let Some(id) = summary.id else { continue };
            if config.notify_containers_signal == RESTART_SENTINEL {
                self.restart(daemon, &id).await;
            } else {
                self.kill(daemon, &id, config.notify_containers_signal).await;
            }
        }
    }

    async fn kill(&self, daemon: &DaemonHandle, container_id: &str, signal: i32) {
        if let Err(error) = daemon.client.kill_container(container_id, signal).await {
            warn!(endpoint = %daemon.endpoint, container_id, signal, %error, "failed to signal container");
        }
    }

    async fn restart(&self, daemon: &DaemonHandle, container_id: &str) {
        if let Err(error) = daemon
            .client
            .restart_container(container_id, RESTART_GRACE_SECONDS)
            .await
        {
            warn!(endpoint = %daemon.endpoint, container_id, %error, "failed to restart container");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;
    use crate::docker::client::MockDaemonClient;

    struct StubRenderer(bool);

    impl Renderer for StubRenderer {
        fn render(&self, _config: &TemplateConfig, _containers: &[RuntimeContainer]) -> Result<bool, Error> {
            Ok(self.0)
        }
    }

    fn template_config() -> TemplateConfig {
        TemplateConfig {
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
        }
    }

    #[tokio::test]
    async fn skips_notify_when_unchanged() {
        let renderer = StubRenderer(false);
        let step = RenderStep;
        let changed = step
            .execute(&template_config(), &[], &renderer, &[], false)
            .await
            .unwrap();
        assert!(!changed);
    }

    #[tokio::test]
    async fn signals_explicit_container_on_change() {
        let mut client = MockDaemonClient::new();
        client
            .expect_kill_container()
            .withf(|id, signal| id == "abc" && *signal == 1)
            .returning(|_, _| Ok(()));

        let daemons = vec![DaemonHandle {
            endpoint: "local".to_string(),
            client: Box::new(client),
        }];

        let mut config = template_config();
        config.notify_containers.insert("abc".to_string(), 1);

        let renderer = StubRenderer(true);
        let step = RenderStep;
        let changed = step
            .execute(&config, &[], &renderer, &daemons, false)
            .await
            .unwrap();
        assert!(changed);
    }

    #[tokio::test]
    async fn restart_sentinel_returns_before_remaining_entries() {
        let mut client = MockDaemonClient::new();
        client
            .expect_restart_container()
            .returning(|_, _| Ok(()));
        // kill_container must never be called: the restart-sentinel entry
        // short-circuits the whole notify pass once encountered.
        client.expect_kill_container().times(0).returning(|_, _| Ok(()));

        let daemons = vec![DaemonHandle {
            endpoint: "local".to_string(),
            client: Box::new(client),
        }];

        let mut config = template_config();
        config.notify_containers.insert("only-entry".to_string(), RESTART_SENTINEL);

        let renderer = StubRenderer(true);
        let step = RenderStep;
        step.execute(&config, &[], &renderer, &daemons, false)
            .await
            .unwrap();
    }
}
