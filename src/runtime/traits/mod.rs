// ABOUTME: Composable capability traits for the container runtime seam.
// ABOUTME: Defines ContainerOps, ExecOps, NetworkOps, RuntimeInfo and the umbrella ContainerRuntime.

mod container;
mod exec;
mod network;
mod runtime_info;
mod shared_types;

pub use container::{ContainerError, ContainerOps};
pub use exec::{ExecError, ExecOps};
pub use network::{NetworkError, NetworkOps};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Everything the switch needs from a container runtime.
pub trait ContainerRuntime: ContainerOps + ExecOps + NetworkOps {}

impl<T: ContainerOps + ExecOps + NetworkOps + ?Sized> ContainerRuntime for T {}
