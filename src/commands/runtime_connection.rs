// ABOUTME: Shared helper for connecting to the local container runtime.
// ABOUTME: Used by both switch and status so detection and progress output stay identical.

use slotswap::config::Config;
use slotswap::error::Result;
use slotswap::output::Output;
use slotswap::runtime::{
    DockerRuntime, HostOps, LocalHost, RuntimeError, RuntimeErrorKind, RuntimeInfo, RuntimeType,
    detect_runtime,
};
use std::sync::Arc;

/// Connected runtime plus the host command runner used alongside it.
pub struct RuntimeConnection {
    pub runtime: Arc<DockerRuntime>,
    pub runtime_type: RuntimeType,
    pub host: Arc<dyn HostOps>,
}

/// Connect to the container runtime on this host.
///
/// This handles the common pattern of:
/// 1. Detecting the runtime type and socket path
/// 2. Outputting progress messages
/// 3. Establishing and checking the connection
pub async fn connect_to_runtime(config: &Config, output: &Output) -> Result<RuntimeConnection> {
    output.progress("  → Detecting runtime...");
    let detected = detect_runtime(&config.runtime).map_err(RuntimeError::from)?;

    output.progress(&format!(
        "  → Found {} at {}",
        detected.runtime_type, detected.socket_path
    ));

    let runtime = DockerRuntime::connect(&detected)
        .map_err(RuntimeError::from)?
        .with_bring_up(config.bring_up.clone())
        .with_host(Box::new(LocalHost));
    if let Err(e) = runtime.ping().await {
        let err = RuntimeError::from(e);
        if err.kind() == RuntimeErrorKind::ConnectionFailed {
            output.warning(&format!(
                "Is the {} service running and {} readable by this user?",
                detected.runtime_type, detected.socket_path
            ));
        }
        return Err(err.into());
    }

    match runtime.info().await {
        Ok(meta) => tracing::debug!(
            "Connected to {} {} ({}/{})",
            meta.name,
            meta.version,
            meta.os,
            meta.arch
        ),
        Err(e) => tracing::debug!("Runtime info unavailable: {}", e),
    }

    Ok(RuntimeConnection {
        runtime: Arc::new(runtime),
        runtime_type: detected.runtime_type,
        host: Arc::new(LocalHost),
    })
}
