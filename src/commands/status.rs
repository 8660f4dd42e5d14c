// ABOUTME: Status command implementation.
// ABOUTME: Read-only report of the edge, the active slot and both slots' health.

use super::runtime_connection::connect_to_runtime;
use serde::Serialize;
use slotswap::config::Config;
use slotswap::edge::{EdgeController, ProxyController, detect_edge};
use slotswap::error::Result;
use slotswap::health::HttpProber;
use slotswap::output::Output;
use slotswap::routes::ConfigStore;
use slotswap::runtime::ContainerRuntime;
use slotswap::slots::{self, ActiveResolution};
use slotswap::switch::{ActiveMarker, SwitchError};
use slotswap::types::{Slot, SlotState};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Serialize)]
struct StatusReport {
    event: &'static str,
    domain: String,
    edge: String,
    editable_config: PathBuf,
    resolution: ActiveResolution,
    live: Option<Slot>,
    marker: Option<Slot>,
    slots: Vec<SlotState>,
}

/// Print what the next switch would see, changing nothing.
pub async fn status(config: Config, edge: Option<&str>, output: &mut Output) -> Result<()> {
    let domain = config.domain.trim().to_string();
    let conn = connect_to_runtime(&config, output).await?;
    let runtime: Arc<dyn ContainerRuntime> = conn.runtime.clone();

    let edge = detect_edge(runtime.as_ref(), conn.host.as_ref(), &config.edge, edge)
        .await
        .map_err(SwitchError::Detection)?;

    let controller = EdgeController::new(
        edge.clone(),
        config.edge.clone(),
        runtime.clone(),
        conn.host.clone(),
    );
    // Status never refreshes the local copy; fall back to it when the edge can't be read.
    let text = match controller.fetch_config().await {
        Ok(text) => Some(text),
        Err(e) => {
            output.warning(&format!("Cannot read config from the edge: {e}"));
            ConfigStore::new(edge.editable_path()).read().ok()
        }
    };

    let health = HttpProber::new(&config, runtime.clone())?;
    let inputs = slots::observe(&config, runtime.as_ref(), &health, text.as_deref()).await;
    let resolution = slots::resolve_active(&inputs);
    let marker = ActiveMarker::new(config.marker_path());

    output.progress(&format!("Domain:  {domain}"));
    output.progress(&format!("Edge:    {}", edge.mode));
    output.progress(&format!("Config:  {}", edge.editable_path().display()));
    output.progress(&format!(
        "Active:  {} ({}), idle {}",
        resolution.active, resolution.source, resolution.idle
    ));
    for state in &inputs.states {
        let spec = config.slot(state.slot);
        let started = state
            .started_at
            .map(|t| format!(", started {}", t.format("%Y-%m-%d %H:%M:%S UTC")))
            .unwrap_or_default();
        output.progress(&format!(
            "  {:<6} {} [{}]{}",
            state.slot.as_str(),
            spec.container,
            state.health,
            started
        ));
    }
    match inputs.marker {
        Some(slot) => output.progress(&format!("Marker:  {} ({})", slot, marker.path().display())),
        None => output.progress(&format!("Marker:  none ({})", marker.path().display())),
    }

    output.event(&StatusReport {
        event: "status",
        domain,
        edge: edge.mode.to_string(),
        editable_config: edge.editable_path().to_path_buf(),
        resolution,
        live: inputs.probe,
        marker: inputs.marker,
        slots: inputs.states.clone(),
    });

    if output.mode() == slotswap::output::OutputMode::Quiet {
        output.success(resolution.active.as_str());
    }
    Ok(())
}
