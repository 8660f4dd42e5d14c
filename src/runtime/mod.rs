// ABOUTME: Container runtime seam: capability traits, bollard implementation, host commands.
// ABOUTME: Also hosts runtime detection and the read-only state probes.

mod detection;
mod docker;
mod error;
mod host;
pub mod probe;
mod traits;
mod types;

pub use detection::{DetectionError, detect_local, detect_runtime};
pub use docker::DockerRuntime;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use host::{CommandOutput, HostCommand, HostError, HostOps, LocalHost};
pub use traits::*;
pub use types::{DetectedRuntime, RuntimeConfig, RuntimeType};
