// ABOUTME: ProxyController: validate, reload, restart and config sync for the edge.
// ABOUTME: Container edges are driven through exec, host edges through host commands.

use super::{ConfigLocation, EdgeError, EdgeMode, EdgeRuntime};
use crate::config::{CommandTemplate, EdgeSettings};
use crate::runtime::{ContainerRuntime, ExecConfig, ExecResult, HostCommand, HostOps};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::sync::Arc;

/// Largest config pushed through an exec environment variable.
const MAX_PUSH_BYTES: usize = 96 * 1024;

const PUSH_SCRIPT: &str = r#"printf '%s' "$SLOTSWAP_EDGE_CONFIG" > "$SLOTSWAP_EDGE_PATH""#;

/// Operations on the running edge proxy.
#[async_trait]
pub trait ProxyController: Send + Sync {
    /// Config text the proxy currently reads.
    async fn fetch_config(&self) -> Result<String, EdgeError>;

    /// Make the editable file's content visible to the proxy.
    ///
    /// A no-op unless the proxy reads a copy inside its container.
    async fn sync_config(&self, text: &str) -> Result<(), EdgeError>;

    async fn validate(&self) -> Result<(), EdgeError>;

    async fn reload(&self) -> Result<(), EdgeError>;

    async fn restart(&self) -> Result<(), EdgeError>;
}

/// Controls the detected edge through the runtime or the host.
pub struct EdgeController {
    edge: EdgeRuntime,
    settings: EdgeSettings,
    runtime: Arc<dyn ContainerRuntime>,
    host: Arc<dyn HostOps>,
}

impl EdgeController {
    pub fn new(
        edge: EdgeRuntime,
        settings: EdgeSettings,
        runtime: Arc<dyn ContainerRuntime>,
        host: Arc<dyn HostOps>,
    ) -> Self {
        Self {
            edge,
            settings,
            runtime,
            host,
        }
    }

    pub fn edge(&self) -> &EdgeRuntime {
        &self.edge
    }

    async fn run_template(
        &self,
        action: &'static str,
        template: &CommandTemplate,
    ) -> Result<(), EdgeError> {
        let config_path = self.edge.proxy_path().to_string_lossy().into_owned();
        let argv = template.render(&[("config", &config_path)]);
        tracing::info!("Running edge {}: {}", action, template);

        match &self.edge.mode {
            EdgeMode::Container { id, .. } => {
                self.exec_in_edge(action, id, &ExecConfig::new(argv)).await?;
            }
            EdgeMode::Host { .. } => {
                let output = self
                    .host
                    .run(&HostCommand::new(argv, self.settings.command_timeout))
                    .await?;
                if !output.success() {
                    return Err(EdgeError::CommandFailed {
                        action,
                        message: output.message().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Exec inside the edge container within the configured command timeout.
    /// A non-zero exit is an error.
    async fn exec_in_edge(
        &self,
        action: &'static str,
        id: &ContainerId,
        exec: &ExecConfig,
    ) -> Result<ExecResult, EdgeError> {
        let timeout = self.settings.command_timeout;
        let result = tokio::time::timeout(timeout, self.runtime.exec(id, exec))
            .await
            .map_err(|_| EdgeError::CommandFailed {
                action,
                message: format!("timed out after {timeout:?}"),
            })??;
        if !result.success() {
            return Err(EdgeError::CommandFailed {
                action,
                message: exec_message(&result.stderr_str(), &result.stdout_str()),
            });
        }
        Ok(result)
    }
}

fn exec_message(stderr: &str, stdout: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl ProxyController for EdgeController {
    async fn fetch_config(&self) -> Result<String, EdgeError> {
        match (&self.edge.config, &self.edge.mode) {
            (ConfigLocation::LocalCopy { in_container, .. }, EdgeMode::Container { id, .. }) => {
                let path = in_container.to_string_lossy().into_owned();
                let exec = ExecConfig::new(["cat", path.as_str()]);
                let result = self.exec_in_edge("read config", id, &exec).await?;
                Ok(result.stdout_str())
            }
            _ => {
                let path = self.edge.editable_path();
                std::fs::read_to_string(path).map_err(|source| EdgeError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    async fn sync_config(&self, text: &str) -> Result<(), EdgeError> {
        let (ConfigLocation::LocalCopy { in_container, .. }, EdgeMode::Container { id, .. }) =
            (&self.edge.config, &self.edge.mode)
        else {
            return Ok(());
        };

        if text.len() > MAX_PUSH_BYTES {
            return Err(EdgeError::ConfigTooLarge { size: text.len() });
        }

        let path = in_container.to_string_lossy().into_owned();
        let exec = ExecConfig::new(["sh", "-c", PUSH_SCRIPT])
            .env("SLOTSWAP_EDGE_CONFIG", text)
            .env("SLOTSWAP_EDGE_PATH", &path);

        self.exec_in_edge("push config", id, &exec).await?;
        tracing::debug!("Pushed {} bytes of edge config to {}", text.len(), path);
        Ok(())
    }

    async fn validate(&self) -> Result<(), EdgeError> {
        self.run_template("validate", &self.settings.validate).await
    }

    async fn reload(&self) -> Result<(), EdgeError> {
        self.run_template("reload", &self.settings.reload).await
    }

    async fn restart(&self) -> Result<(), EdgeError> {
        match &self.edge.mode {
            EdgeMode::Container { id, name } => {
                tracing::warn!("Restarting edge container {}", name);
                tokio::time::timeout(
                    self.settings.command_timeout,
                    self.runtime.restart_container(id),
                )
                .await
                .map_err(|_| EdgeError::CommandFailed {
                    action: "restart",
                    message: format!("timed out after {:?}", self.settings.command_timeout),
                })??;
            }
            EdgeMode::Host { unit } => {
                tracing::warn!("Restarting edge unit {}", unit);
                let command = HostCommand::program(
                    "systemctl",
                    &["restart", unit.as_str()],
                    self.settings.command_timeout,
                );
                let output = self.host.run(&command).await?;
                if !output.success() {
                    return Err(EdgeError::CommandFailed {
                        action: "restart",
                        message: output.message().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
