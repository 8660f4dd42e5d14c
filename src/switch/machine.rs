// ABOUTME: Switch struct parameterized by state marker, and the collaborators it drives.
// ABOUTME: State types carry their own data for compile-time guarantees.

use crate::config::{Config, SlotSpec};
use crate::edge::{EdgeRuntime, ProxyController};
use crate::health::HealthChecker;
use crate::routes::ConfigStore;
use crate::runtime::ContainerRuntime;
use crate::slots::SlotPlan;
use crate::types::Slot;
use std::sync::Arc;

use super::marker::ActiveMarker;
use super::state::{Planned, Reloaded, Verified};

/// Everything a switch run talks to.
pub struct SwitchEnv {
    pub config: Config,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub edge: EdgeRuntime,
    pub proxy: Arc<dyn ProxyController>,
    pub health: Arc<dyn HealthChecker>,
}

impl SwitchEnv {
    /// Store for the file this run edits.
    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.edge.editable_path())
    }

    pub fn marker(&self) -> ActiveMarker {
        ActiveMarker::new(self.config.marker_path())
    }

    pub fn slot(&self, slot: Slot) -> &SlotSpec {
        self.config.slot(slot)
    }
}

/// A switch in progress, parameterized by its current state.
#[derive(Debug)]
pub struct Switch<S> {
    pub(crate) plan: SlotPlan,
    pub(crate) state: S,
}

impl Switch<Planned> {
    pub fn new(plan: SlotPlan) -> Self {
        Switch {
            plan,
            state: Planned,
        }
    }
}

impl<S> Switch<S> {
    pub fn plan(&self) -> SlotPlan {
        self.plan
    }

    /// Slot being switched to.
    pub fn target(&self) -> Slot {
        self.plan.target
    }

    /// Slot that served traffic before the run.
    pub fn active(&self) -> Slot {
        self.plan.active
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub(crate) fn transition<T>(self, state: T) -> Switch<T> {
        Switch {
            plan: self.plan,
            state,
        }
    }
}

impl Switch<Reloaded> {
    /// Whether the edge had to be restarted to load the new config.
    pub fn restarted(&self) -> bool {
        self.state.restarted
    }
}

impl Switch<Verified> {
    pub fn public_check(&self) -> &crate::health::PublicCheck {
        &self.state.public
    }
}
