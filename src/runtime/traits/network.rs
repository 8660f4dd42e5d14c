// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Connect containers to networks with aliases.

use crate::types::{ContainerId, NetworkId};
use async_trait::async_trait;

#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Connect a container to a network with optional aliases.
    ///
    /// Connecting a container that is already attached succeeds.
    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[String],
    ) -> Result<(), NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
