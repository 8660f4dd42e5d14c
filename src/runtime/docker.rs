// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via Docker-compatible API.

use crate::config::BringUpConfig;
use crate::runtime::host::{HostCommand, HostOps, LocalHost};
use crate::runtime::traits::{
    ContainerError, ContainerInfo, ContainerOps, ContainerState, ContainerSummary, ExecConfig,
    ExecError, ExecOps, ExecResult, HealthState, MountInfo, NetworkError, NetworkInfo, NetworkOps,
    NetworkSettings, PublishedPort, RuntimeInfo, RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::types::RuntimeType;
use crate::types::{ContainerId, NetworkId, ServiceName};
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::StartExecOptions;
use bollard::models::EndpointSettings;
use bollard::query_parameters::{
    InspectContainerOptions, ListContainersOptions, RestartContainerOptions,
};
use chrono::{DateTime, Datelike, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Upper bound on one exec inside a container.
const EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// How long to wait on a silent output stream before asking whether the exec finished.
const EXEC_POLL: Duration = Duration::from_millis(500);

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_network_connect_error(e: bollard::errors::Error) -> NetworkError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => NetworkError::NotFound(message.clone()),
        _ => NetworkError::Runtime(e.to_string()),
    }
}

fn map_exec_create_error(e: bollard::errors::Error) -> ExecError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ExecError::ContainerNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ExecError::ContainerNotRunning(message.clone()),
        _ => ExecError::Runtime(e.to_string()),
    }
}

fn map_exec_error(e: bollard::errors::Error) -> ExecError {
    ExecError::Failed(e.to_string())
}

/// Docker reports never-started containers with a zero timestamp.
fn parse_started_at(raw: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    (parsed.year() > 1).then_some(parsed)
}

// =============================================================================
// DockerRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Supports both Docker and Podman via Docker-compatible API. Bring-up is
/// delegated to the configured host command (usually `docker compose`).
pub struct DockerRuntime {
    client: Docker,
    runtime_type: RuntimeType,
    bring_up: BringUpConfig,
    host: Box<dyn HostOps>,
}

impl DockerRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
            bring_up: BringUpConfig::default(),
            host: Box::new(LocalHost),
        }
    }

    /// Connect to a container runtime using detected runtime info.
    pub fn connect(info: &super::types::DetectedRuntime) -> Result<Self, RuntimeInfoError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client, info.runtime_type))
    }

    pub fn with_bring_up(mut self, bring_up: BringUpConfig) -> Self {
        self.bring_up = bring_up;
        self
    }

    pub fn with_host(mut self, host: Box<dyn HostOps>) -> Self {
        self.host = host;
        self
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    async fn exec_running(&self, exec_id: &str) -> Result<(bool, Option<i64>), ExecError> {
        let details = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(map_exec_error)?;
        Ok((details.running.unwrap_or(false), details.exit_code))
    }
}

#[async_trait]
impl RuntimeInfo for DockerRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;

        Ok(RuntimeMetadata {
            name: self.runtime_type.to_string(),
            version: info.server_version.unwrap_or_default(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::ConnectionFailed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for DockerRuntime {
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError> {
        let details = match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => details,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => return Err(map_container_not_found_error(e)),
        };

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => ContainerState::Restarting,
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let health = details
            .state
            .as_ref()
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|s| match s {
                bollard::models::HealthStatusEnum::STARTING => HealthState::Starting,
                bollard::models::HealthStatusEnum::HEALTHY => HealthState::Healthy,
                bollard::models::HealthStatusEnum::UNHEALTHY => HealthState::Unhealthy,
                _ => HealthState::None,
            });

        let started_at = details
            .state
            .as_ref()
            .and_then(|s| s.started_at.as_ref())
            .and_then(|raw| parse_started_at(&raw.to_string()));

        let pid = details
            .state
            .as_ref()
            .and_then(|s| s.pid)
            .filter(|pid| *pid > 0);

        let mut networks = HashMap::new();
        let mut ports = Vec::new();
        if let Some(ref network_settings) = details.network_settings {
            if let Some(ref nets) = network_settings.networks {
                for (name, endpoint) in nets {
                    networks.insert(
                        name.clone(),
                        NetworkInfo {
                            network_id: endpoint.network_id.clone().unwrap_or_default(),
                            ip_address: endpoint.ip_address.clone().unwrap_or_default(),
                            aliases: endpoint.aliases.clone().unwrap_or_default(),
                        },
                    );
                }
            }
            if let Some(ref port_map) = network_settings.ports {
                for (key, bindings) in port_map {
                    let Some(container_port) =
                        key.split('/').next().and_then(|p| p.parse::<u16>().ok())
                    else {
                        continue;
                    };
                    for binding in bindings.iter().flatten() {
                        ports.push(PublishedPort {
                            container_port,
                            host_port: binding
                                .host_port
                                .as_deref()
                                .and_then(|p| p.parse::<u16>().ok()),
                        });
                    }
                }
            }
        }

        let mounts = details
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| MountInfo {
                source: m.source.unwrap_or_default(),
                destination: m.destination.unwrap_or_default(),
                kind: m
                    .typ
                    .map(|t| t.to_string().to_lowercase())
                    .unwrap_or_default(),
            })
            .collect();

        Ok(Some(ContainerInfo {
            id: ContainerId::new(details.id.unwrap_or_else(|| name.to_string())),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            health,
            started_at,
            pid,
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
            network_settings: NetworkSettings { networks },
            mounts,
            ports,
        }))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        let opts = ListContainersOptions {
            all: false,
            ..Default::default()
        };

        // Podman reports "stopping" as a container state during shutdown, but bollard
        // doesn't recognize it and fails deserialization. Retry after a short delay
        // since "stopping" is a transient state.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .unwrap_or_default()
                                .first()
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            let state = c
                                .state
                                .map(|s| format!("{:?}", s).to_lowercase())
                                .unwrap_or_default();

                            let ports = c
                                .ports
                                .unwrap_or_default()
                                .into_iter()
                                .map(|p| PublishedPort {
                                    container_port: p.private_port as u16,
                                    host_port: p.public_port.map(|port| port as u16),
                                })
                                .collect();

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state,
                                status: c.status.unwrap_or_default(),
                                labels: c.labels.unwrap_or_default(),
                                ports,
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Runtime(err_str));
                }
            }
        }

        Err(ContainerError::Runtime(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }

    async fn restart_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .restart_container(id.as_str(), None::<RestartContainerOptions>)
            .await
            .map_err(map_container_not_found_error)
    }

    async fn bring_up(
        &self,
        service: &ServiceName,
        container: &ServiceName,
    ) -> Result<(), ContainerError> {
        let argv = self.bring_up.command.render(&[
            ("service", service.as_str()),
            ("container", container.as_str()),
        ]);
        let command = HostCommand::new(argv, self.bring_up.timeout)
            .current_dir(self.bring_up.working_dir.clone());

        tracing::info!("Bringing up {}: {}", service, command);

        let output = self
            .host
            .run(&command)
            .await
            .map_err(|e| ContainerError::BringUp {
                service: service.to_string(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(ContainerError::BringUp {
                service: service.to_string(),
                message: output.message().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for DockerRuntime {
    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[String],
    ) -> Result<(), NetworkError> {
        let config = bollard::models::NetworkConnectRequest {
            container: container.to_string(),
            endpoint_config: Some(EndpointSettings {
                aliases: if aliases.is_empty() {
                    None
                } else {
                    Some(aliases.to_vec())
                },
                ..Default::default()
            }),
        };

        match self.client.connect_network(network.as_str(), config).await {
            Ok(()) => Ok(()),
            // Already attached.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 403 | 409,
                message,
            }) if message.contains("already exists") || message.contains("already connected") => {
                tracing::debug!("{} already connected to {}", container, network);
                Ok(())
            }
            Err(e) => Err(map_network_connect_error(e)),
        }
    }
}

#[async_trait]
impl ExecOps for DockerRuntime {
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let opts = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(false),
            ..Default::default()
        };

        let exec_id = self
            .client
            .create_exec(container.as_str(), opts)
            .await
            .map_err(map_exec_create_error)?
            .id;

        let result = self
            .client
            .start_exec(
                &exec_id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_error)?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // Podman does not always close the attached stream when the process
        // exits, so a silent stream is checked against the exec state.
        let deadline = Instant::now() + EXEC_TIMEOUT;
        if let bollard::exec::StartExecResults::Attached { mut output, .. } = result {
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ExecError::Timeout(EXEC_TIMEOUT));
                }
                match tokio::time::timeout(remaining.min(EXEC_POLL), output.next()).await {
                    Ok(Some(Ok(bollard::container::LogOutput::StdOut { message }))) => {
                        stdout.extend(message);
                    }
                    Ok(Some(Ok(bollard::container::LogOutput::StdErr { message }))) => {
                        stderr.extend(message);
                    }
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(e))) => return Err(ExecError::Failed(e.to_string())),
                    Ok(None) => break,
                    Err(_) => {
                        let (running, _) = self.exec_running(&exec_id).await?;
                        if !running {
                            break;
                        }
                    }
                }
            }
        }

        // The stream can end before the runtime records the exit code.
        let exit_code = loop {
            let (running, code) = self.exec_running(&exec_id).await?;
            if let Some(code) = settled_exit_code(running, code) {
                break code;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ExecError::Failed(format!(
                    "exit code of exec {exec_id} unavailable after {EXEC_TIMEOUT:?}"
                )));
            }
            tokio::time::sleep(remaining.min(EXEC_POLL)).await;
        };

        Ok(ExecResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Exit code of a finished exec. `None` while it runs or before the code is recorded.
fn settled_exit_code(running: bool, code: Option<i64>) -> Option<i64> {
    if running { None } else { code }
}
