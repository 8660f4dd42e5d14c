// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Slot colors, slot health, phantom-typed ids and service names.

mod id;
mod service_name;
mod slot;

pub use id::{ContainerId, NetworkId};
pub use service_name::{ServiceName, ServiceNameError};
pub use slot::{ParseSlotError, Slot, SlotHealth, SlotSelection, SlotState};
