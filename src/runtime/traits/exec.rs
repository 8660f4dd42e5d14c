// ABOUTME: Exec operations trait for container runtimes.
// ABOUTME: Execute commands inside running containers.

use super::shared_types::{ExecConfig, ExecResult};
use crate::types::ContainerId;
use async_trait::async_trait;

/// Exec operations: run commands in containers.
#[async_trait]
pub trait ExecOps: Send + Sync {
    /// Run a command to completion, capturing exit code and output.
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError>;
}

/// Errors from exec operations.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    ContainerNotRunning(String),

    #[error("exec failed: {0}")]
    Failed(String),

    #[error("exec timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("runtime error: {0}")]
    Runtime(String),
}
