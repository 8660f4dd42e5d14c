// ABOUTME: Runtime detection for the local system.
// ABOUTME: Checks for Podman sockets first, then Docker, unless configured explicitly.

use super::types::{DetectedRuntime, RuntimeConfig, RuntimeType};
use std::path::Path;

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("configured runtime socket does not exist: {0}")]
    SocketMissing(String),
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Resolve the runtime to talk to.
///
/// An explicit `runtime` in the config wins; otherwise sockets are probed
/// in the order documented on [`detect_local`].
pub fn detect_runtime(config: &RuntimeConfig) -> Result<DetectedRuntime, DetectionError> {
    if let Some(runtime_type) = config.runtime {
        let socket_path = config
            .socket
            .clone()
            .unwrap_or_else(|| default_socket_path(runtime_type));
        if !Path::new(&socket_path).exists() {
            return Err(DetectionError::SocketMissing(socket_path));
        }
        return Ok(DetectedRuntime {
            runtime_type,
            socket_path,
        });
    }

    if let Some(ref socket_path) = config.socket {
        if !Path::new(socket_path).exists() {
            return Err(DetectionError::SocketMissing(socket_path.clone()));
        }
        let runtime_type = if socket_path.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        };
        return Ok(DetectedRuntime {
            runtime_type,
            socket_path: socket_path.clone(),
        });
    }

    detect_local()
}

/// Detect container runtime on the local system.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<DetectedRuntime, DetectionError> {
    // 1. Rootless Podman
    if let Some(uid) = get_uid() {
        let rootless_socket = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless_socket).exists() {
            return Ok(DetectedRuntime {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    // 2. Rootful Podman
    if Path::new(ROOTFUL_PODMAN).exists() {
        return Ok(DetectedRuntime {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    // 3. Docker
    if Path::new(DOCKER_SOCKET).exists() {
        return Ok(DetectedRuntime {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn get_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        // Fall back to reading /proc/self/status
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> String {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET.to_string(),
        RuntimeType::Podman => ROOTFUL_PODMAN.to_string(),
    }
}
