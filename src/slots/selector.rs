// ABOUTME: Active slot resolution from prioritised signals, and target planning.
// ABOUTME: Pure functions over already-observed inputs.

use crate::types::{Slot, SlotSelection, SlotState};
use serde::Serialize;
use thiserror::Error;

/// Signal that decided the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSource {
    LiveProbe,
    Marker,
    EdgeConfig,
    NewestHealthy,
    Default,
}

impl std::fmt::Display for ActiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActiveSource::LiveProbe => "live probe",
            ActiveSource::Marker => "marker",
            ActiveSource::EdgeConfig => "edge config",
            ActiveSource::NewestHealthy => "newest healthy slot",
            ActiveSource::Default => "default",
        };
        f.write_str(s)
    }
}

/// Everything the selector looks at, gathered once per run.
#[derive(Debug, Clone)]
pub struct SelectorInputs {
    /// Slot named by the public probe response.
    pub probe: Option<Slot>,
    /// Content of the active marker.
    pub marker: Option<Slot>,
    /// Slot whose upstream the domain's route block references.
    pub edge_config: Option<Slot>,
    /// Observed state of both slots.
    pub states: Vec<SlotState>,
    pub default: Slot,
}

impl SelectorInputs {
    fn state(&self, slot: Slot) -> Option<&SlotState> {
        self.states.iter().find(|s| s.slot == slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveResolution {
    pub active: Slot,
    pub idle: Slot,
    pub source: ActiveSource,
}

impl ActiveResolution {
    fn new(active: Slot, source: ActiveSource) -> Self {
        Self {
            active,
            idle: active.other(),
            source,
        }
    }
}

/// Decide which slot is active, stopping at the first conclusive signal.
pub fn resolve_active(inputs: &SelectorInputs) -> ActiveResolution {
    if let Some(slot) = inputs.probe {
        return ActiveResolution::new(slot, ActiveSource::LiveProbe);
    }

    if let Some(slot) = inputs.marker {
        match inputs.state(slot) {
            Some(state) if state.health.is_serving() => {
                return ActiveResolution::new(slot, ActiveSource::Marker);
            }
            _ => tracing::debug!("Marker names {} but it is not serving; ignoring", slot),
        }
    }

    if let Some(slot) = inputs.edge_config {
        return ActiveResolution::new(slot, ActiveSource::EdgeConfig);
    }

    if let Some(slot) = newest_healthy(&inputs.states) {
        return ActiveResolution::new(slot, ActiveSource::NewestHealthy);
    }

    ActiveResolution::new(inputs.default, ActiveSource::Default)
}

/// Most recently started serving slot. Ties and missing start times
/// resolve to no answer unless only one slot is serving.
fn newest_healthy(states: &[SlotState]) -> Option<Slot> {
    let serving: Vec<&SlotState> = states.iter().filter(|s| s.health.is_serving()).collect();
    match serving.as_slice() {
        [] => None,
        [only] => Some(only.slot),
        _ => {
            let mut dated: Vec<_> = serving
                .iter()
                .filter_map(|s| s.started_at.map(|t| (t, s.slot)))
                .collect();
            dated.sort();
            match dated.as_slice() {
                [.., (a, _), (b, newest)] if a != b => Some(*newest),
                [(_, only)] => Some(*only),
                _ => None,
            }
        }
    }
}

/// Slots a switch acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotPlan {
    /// Slot serving traffic before the switch.
    pub active: Slot,
    /// Slot brought up and switched to.
    pub target: Slot,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("{0} is serving live traffic; refusing to redeploy it in place")]
    TargetIsLive(Slot),
}

/// Turn the operator's choice into a plan.
///
/// An explicit slot that only weaker signals call active is trusted over
/// them; one the live probe confirms is refused.
pub fn plan(selection: SlotSelection, resolution: &ActiveResolution) -> Result<SlotPlan, PlanError> {
    match selection {
        SlotSelection::Auto => Ok(SlotPlan {
            active: resolution.active,
            target: resolution.idle,
        }),
        SlotSelection::Explicit(target) if target == resolution.active => {
            if resolution.source == ActiveSource::LiveProbe {
                return Err(PlanError::TargetIsLive(target));
            }
            tracing::warn!(
                "Requested {} which the {} called active; treating {} as active",
                target,
                resolution.source,
                target.other()
            );
            Ok(SlotPlan {
                active: target.other(),
                target,
            })
        }
        SlotSelection::Explicit(target) => Ok(SlotPlan {
            active: target.other(),
            target,
        }),
    }
}
