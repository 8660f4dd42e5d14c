// ABOUTME: Switch orchestration using the type state pattern.
// ABOUTME: Exports the coordinator, lock, marker and state markers for compile-time safe switches.

mod coordinator;
mod error;
mod lock;
mod machine;
mod marker;
mod state;
mod transitions;

pub use coordinator::{
    PreparedSwitch, SwitchEvent, SwitchReport, SwitchRequest, execute_switch, prepare_switch,
    run_switch,
};
pub use error::{SwitchError, SwitchErrorKind};
pub use lock::{LockInfo, SwitchLock};
pub use machine::{Switch, SwitchEnv};
pub use marker::ActiveMarker;
pub use state::{IdleHealthy, IdleUp, Planned, Reachable, Reloaded, Rewritten, Verified};
pub use transitions::TransitionResult;
