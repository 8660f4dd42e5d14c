// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Inspect, list, restart, and bring up a slot's service.

use super::shared_types::{ContainerInfo, ContainerSummary};
use crate::types::{ContainerId, ServiceName};
use async_trait::async_trait;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Inspect a container by name or ID. `Ok(None)` when it does not exist.
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError>;

    /// List running containers.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Restart a container.
    async fn restart_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Start or update one slot's service without touching the other slot.
    async fn bring_up(
        &self,
        service: &ServiceName,
        container: &ServiceName,
    ) -> Result<(), ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("bring-up of {service} failed: {message}")]
    BringUp { service: String, message: String },

    #[error("runtime error: {0}")]
    Runtime(String),
}
