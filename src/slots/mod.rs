// ABOUTME: Slot selector: which slot is active, which is idle, and what to deploy.
// ABOUTME: Signals are gathered once per run and resolved in a fixed priority order.

mod selector;

pub use selector::{
    ActiveResolution, ActiveSource, PlanError, SelectorInputs, SlotPlan, plan, resolve_active,
};

use crate::config::Config;
use crate::health::HealthChecker;
use crate::routes::RouteTable;
use crate::runtime::ContainerRuntime;
use crate::runtime::probe::slot_state;
use crate::switch::ActiveMarker;
use crate::types::Slot;

/// Observe every selector signal.
///
/// `edge_config` is the current edge config text, if it could be read.
pub async fn observe(
    config: &Config,
    runtime: &dyn ContainerRuntime,
    health: &dyn HealthChecker,
    edge_config: Option<&str>,
) -> SelectorInputs {
    let probe = health.probe_live_slot().await;
    let marker = ActiveMarker::new(config.marker_path()).read();

    let mut states = Vec::with_capacity(2);
    for slot in Slot::ALL {
        states.push(slot_state(runtime, slot, config.slot(slot)).await);
    }

    let edge_config = edge_config
        .and_then(|text| RouteTable::parse(text).upstream_slot(config.domain.trim(), &config.slots));

    tracing::debug!(
        "Selector inputs: probe={:?} marker={:?} edge_config={:?}",
        probe,
        marker,
        edge_config
    );

    SelectorInputs {
        probe,
        marker,
        edge_config,
        states,
        default: config.default_slot,
    }
}
