// ABOUTME: Edge runtime detector: container publishing the public port, else a host unit.
// ABOUTME: Resolves a bind-mounted config file or falls back to a pushed local copy.

use super::{ConfigLocation, EdgeError, EdgeMode, EdgeRuntime};
use crate::config::EdgeSettings;
use crate::runtime::probe::{port_owner, unit_active, unit_main_pid};
use crate::runtime::{ContainerInfo, ContainerRuntime, HostOps};
use std::path::{Path, PathBuf};

/// Find the edge proxy without changing anything.
///
/// With `explicit`, that name must be a running container or an active
/// unit. Otherwise: a running container publishing the public port, then a
/// container whose main process owns the port (host networking), then the
/// configured systemd unit if it owns the port.
pub async fn detect_edge(
    runtime: &dyn ContainerRuntime,
    host: &dyn HostOps,
    settings: &EdgeSettings,
    explicit: Option<&str>,
) -> Result<EdgeRuntime, EdgeError> {
    if let Some(name) = explicit {
        return detect_explicit(runtime, host, settings, name).await;
    }

    let port = settings.public_port;
    let running = runtime.list_containers().await?;

    let publishers: Vec<_> = running.iter().filter(|c| c.publishes(port)).collect();
    if publishers.len() > 1 {
        tracing::warn!(
            "{} containers publish port {}; using {}",
            publishers.len(),
            port,
            publishers[0].name
        );
    }
    if let Some(summary) = publishers.first()
        && let Some(info) = runtime.inspect_container(summary.id.as_str()).await?
    {
        tracing::debug!("Port {} is published by container {}", port, info.name);
        return Ok(container_edge(info, settings));
    }

    let owner = port_owner(host, port, settings.command_timeout).await?;

    if let Some(ref owner) = owner {
        for summary in &running {
            let Some(info) = runtime.inspect_container(summary.id.as_str()).await? else {
                continue;
            };
            if info.pid == Some(i64::from(owner.pid)) {
                tracing::debug!(
                    "Port {} is owned by {} (pid {}) in container {}",
                    port,
                    owner.process,
                    owner.pid,
                    info.name
                );
                return Ok(container_edge(info, settings));
            }
        }
    }

    if unit_active(host, &settings.unit, settings.command_timeout).await? {
        let owns_port = match owner {
            None => {
                tracing::warn!(
                    "Could not see the owner of port {}; assuming unit {} serves it",
                    port,
                    settings.unit
                );
                true
            }
            Some(ref owner) => {
                let main_pid = unit_main_pid(host, &settings.unit, settings.command_timeout).await?;
                main_pid == Some(owner.pid) || owner.process == settings.unit
            }
        };

        if owns_port {
            return Ok(EdgeRuntime {
                mode: EdgeMode::Host {
                    unit: settings.unit.clone(),
                },
                config: ConfigLocation::HostFile(settings.host_config_path.clone()),
            });
        }
        tracing::warn!(
            "Unit {} is active but port {} belongs to another process",
            settings.unit,
            port
        );
    }

    Err(EdgeError::NotFound {
        port,
        unit: settings.unit.clone(),
    })
}

async fn detect_explicit(
    runtime: &dyn ContainerRuntime,
    host: &dyn HostOps,
    settings: &EdgeSettings,
    name: &str,
) -> Result<EdgeRuntime, EdgeError> {
    if let Some(info) = runtime.inspect_container(name).await? {
        if !info.is_running() {
            return Err(EdgeError::NotRunning(name.to_string()));
        }
        return Ok(container_edge(info, settings));
    }

    if unit_active(host, name, settings.command_timeout).await? {
        return Ok(EdgeRuntime {
            mode: EdgeMode::Host {
                unit: name.to_string(),
            },
            config: ConfigLocation::HostFile(settings.host_config_path.clone()),
        });
    }

    Err(EdgeError::ExplicitNotFound(name.to_string()))
}

fn container_edge(info: ContainerInfo, settings: &EdgeSettings) -> EdgeRuntime {
    let config = config_location(&info, settings);
    EdgeRuntime {
        mode: EdgeMode::Container {
            name: info.name,
            id: info.id,
        },
        config,
    }
}

/// Host-side file behind the container's config path, if it is bind-mounted.
///
/// A mount of the file itself wins over a mount of a parent directory; the
/// deepest directory mount wins among directories.
pub fn config_location(info: &ContainerInfo, settings: &EdgeSettings) -> ConfigLocation {
    let target = settings.container_config_path.as_path();

    let best = info
        .mounts
        .iter()
        .filter(|m| m.is_bind() || m.kind.is_empty())
        .filter_map(|m| {
            let rel = target.strip_prefix(Path::new(&m.destination)).ok()?;
            let host = if rel.as_os_str().is_empty() {
                PathBuf::from(&m.source)
            } else {
                Path::new(&m.source).join(rel)
            };
            Some((m.destination.len(), host))
        })
        .max_by_key(|(depth, _)| *depth);

    match best {
        Some((_, host)) if host.is_file() => ConfigLocation::BindMounted {
            host,
            in_container: target.to_path_buf(),
        },
        Some((_, host)) => {
            tracing::warn!(
                "Bind mount source {} is not a file on this host; using a local copy",
                host.display()
            );
            ConfigLocation::LocalCopy {
                local: settings.local_copy.clone(),
                in_container: target.to_path_buf(),
            }
        }
        None => ConfigLocation::LocalCopy {
            local: settings.local_copy.clone(),
            in_container: target.to_path_buf(),
        },
    }
}
