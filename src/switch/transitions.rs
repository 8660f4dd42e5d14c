// ABOUTME: State transition methods for switch orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use crate::diagnostics::{Diagnostics, Warning};
use crate::edge::EdgeMode;
use crate::health::{PublicCheck, RetryPolicy};
use crate::routes::{CanonicalBlock, RouteTable};
use crate::types::Slot;
use std::path::Path;

use super::error::SwitchError;
use super::machine::{Switch, SwitchEnv};
use super::state::{IdleHealthy, IdleUp, Planned, Reachable, Reloaded, Rewritten, Verified};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Switch<T>, (Switch<S>, SwitchError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

/// Whether the edge reaches `slot` over a container network we can repair.
fn can_reconnect(env: &SwitchEnv, slot: Slot) -> bool {
    matches!(env.edge.mode, EdgeMode::Container { .. }) && !env.slot(slot).is_loopback()
}

/// Attach the slot's container to every network the edge container is on,
/// under the upstream host name. Returns how many networks were joined.
async fn reconnect_networks(env: &SwitchEnv, slot: Slot) -> Result<usize, String> {
    let Some(edge_id) = env.edge.container_id() else {
        return Ok(0);
    };
    let spec = env.slot(slot);

    let edge = env
        .runtime
        .inspect_container(edge_id.as_str())
        .await
        .map_err(|e| format!("inspect edge: {e}"))?
        .ok_or_else(|| format!("edge container {edge_id} disappeared"))?;
    let backend = env
        .runtime
        .inspect_container(spec.container.as_str())
        .await
        .map_err(|e| format!("inspect {}: {e}", spec.container))?
        .ok_or_else(|| format!("container {} not found", spec.container))?;

    let mut aliases = vec![spec.service.to_string()];
    if let Some(host) = spec.upstream_host()
        && !aliases.iter().any(|a| a == host)
    {
        aliases.insert(0, host.to_string());
    }

    let mut joined = 0;
    for (name, network) in edge.network_settings.network_ids() {
        if backend.network_settings.networks.contains_key(&name) {
            continue;
        }
        match env
            .runtime
            .connect_to_network(&backend.id, &network, &aliases)
            .await
        {
            Ok(()) => {
                tracing::info!("Connected {} to network {} as {:?}", backend.name, name, aliases);
                joined += 1;
            }
            Err(e) => tracing::warn!("Failed to connect {} to {}: {}", backend.name, name, e),
        }
    }
    Ok(joined)
}

/// Put the editable file back to `backup` and make the edge load it.
///
/// Returns whether the file itself was restored; loading is best effort.
async fn restore_backup(env: &SwitchEnv, backup: &Path) -> bool {
    let store = env.store();
    if let Err(e) = store.restore(backup) {
        tracing::error!("Failed to restore {} from {}: {}", store.path().display(), backup.display(), e);
        return false;
    }
    tracing::warn!("Restored {} from {}", store.path().display(), backup.display());

    match store.read() {
        Ok(text) => {
            if let Err(e) = env.proxy.sync_config(&text).await {
                tracing::warn!("Failed to push restored config: {}", e);
            }
        }
        Err(e) => tracing::warn!("Failed to re-read restored config: {}", e),
    }
    if let Err(e) = env.proxy.reload().await {
        tracing::warn!("Reload after restore failed: {}", e);
    }
    true
}

/// Write `text` over the editable file, putting `backup` back if the write
/// fails part way.
fn write_or_restore(env: &SwitchEnv, text: &str, backup: &Path) -> Result<(), SwitchError> {
    let store = env.store();
    let Err(source) = store.write_in_place(text) else {
        return Ok(());
    };
    tracing::error!("Failed to write {}: {}", store.path().display(), source);

    let restored = match store.restore(backup) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Failed to restore {} from {}: {}", store.path().display(), backup.display(), e);
            false
        }
    };
    Err(SwitchError::Write { source, restored })
}

/// Push, validate and reload `text`, restarting the edge once if reload fails.
///
/// Any failure restores `backup` first. Returns whether a restart was needed.
async fn apply_config(env: &SwitchEnv, text: &str, backup: &Path) -> Result<bool, SwitchError> {
    if let Err(source) = env.proxy.sync_config(text).await {
        let restored = restore_backup(env, backup).await;
        return Err(SwitchError::Validate { source, restored });
    }

    if let Err(source) = env.proxy.validate().await {
        let restored = restore_backup(env, backup).await;
        return Err(SwitchError::Validate { source, restored });
    }

    let Err(reload) = env.proxy.reload().await else {
        return Ok(false);
    };
    tracing::warn!("Edge reload failed ({}); restarting the edge", reload);

    match env.proxy.restart().await {
        Ok(()) => Ok(true),
        Err(restart) => {
            let restored = restore_backup(env, backup).await;
            Err(SwitchError::Reload {
                reload,
                restart,
                restored,
            })
        }
    }
}

/// Public verification backs off while the edge settles, capped at four intervals.
fn verify_policy(env: &SwitchEnv) -> RetryPolicy {
    let probe = &env.config.probe;
    RetryPolicy::exponential(probe.retries, probe.interval, probe.interval.saturating_mul(4))
}

// =============================================================================
// Planned -> IdleUp
// =============================================================================

impl Switch<Planned> {
    /// Start or update the target slot's service. The active slot is not touched.
    pub async fn bring_up(self, env: &SwitchEnv) -> Result<Switch<IdleUp>, SwitchError> {
        let slot = self.target();
        let spec = env.slot(slot);
        tracing::info!("Bringing up {} ({})", slot, spec.service);

        env.runtime
            .bring_up(&spec.service, &spec.container)
            .await
            .map_err(|source| SwitchError::BringUp { slot, source })?;

        Ok(self.transition(IdleUp))
    }
}

// =============================================================================
// IdleUp -> IdleHealthy
// =============================================================================

impl Switch<IdleUp> {
    /// Wait for the target slot, bounded by `health.timeout`.
    pub async fn wait_healthy(self, env: &SwitchEnv) -> Result<Switch<IdleHealthy>, SwitchError> {
        let readiness = env
            .health
            .wait_healthy(self.target(), env.config.health.timeout)
            .await;

        if !readiness.ready {
            return Err(SwitchError::NotReady {
                readiness: Box::new(readiness),
            });
        }
        Ok(self.transition(IdleHealthy { readiness }))
    }
}

// =============================================================================
// IdleHealthy -> Reachable
// =============================================================================

impl Switch<IdleHealthy> {
    /// Make sure the edge can reach the target before routing to it.
    ///
    /// One reconnect of the target to the edge's networks is attempted when
    /// the edge runs in a container and the slot is addressed by name.
    pub async fn ensure_reachable(self, env: &SwitchEnv) -> Result<Switch<Reachable>, SwitchError> {
        let slot = self.target();
        let first = env.health.network_reachable(slot, &env.edge.mode).await;
        if first.is_reachable() {
            return Ok(self.transition(Reachable {
                reachability: first,
                reconnected: false,
            }));
        }

        if !can_reconnect(env, slot) {
            return Err(SwitchError::Unreachable { reachability: first });
        }

        match reconnect_networks(env, slot).await {
            Ok(joined) => tracing::info!("Joined {} network(s) for {}", joined, slot),
            Err(e) => tracing::warn!("Network reconnect for {} failed: {}", slot, e),
        }

        let second = env.health.network_reachable(slot, &env.edge.mode).await;
        if !second.is_reachable() {
            return Err(SwitchError::Unreachable {
                reachability: second,
            });
        }
        Ok(self.transition(Reachable {
            reachability: second,
            reconnected: true,
        }))
    }
}

// =============================================================================
// Reachable -> Rewritten
// =============================================================================

impl Switch<Reachable> {
    /// Back up the editable config and route the domain to the target.
    pub async fn rewrite(self, env: &SwitchEnv) -> Result<Switch<Rewritten>, SwitchError> {
        let store = env.store();
        let current = store.read()?;

        let mut table = RouteTable::parse(&current);
        let changed = table.set_route(&CanonicalBlock::for_slot(&env.config, self.target()));
        let text = table.render();

        let backup = store.backup()?;
        if changed {
            write_or_restore(env, &text, &backup)?;
            tracing::info!("Rewrote {} for {}", store.path().display(), self.target());
        } else {
            tracing::info!("{} already routes to {}", store.path().display(), self.target());
        }

        Ok(self.transition(Rewritten {
            backup,
            text,
            changed,
        }))
    }
}

// =============================================================================
// Rewritten -> Reloaded
// =============================================================================

impl Switch<Rewritten> {
    /// Validate and reload the edge. Restores the backup on failure.
    pub async fn reload(self, env: &SwitchEnv) -> Result<Switch<Reloaded>, SwitchError> {
        let restarted = apply_config(env, &self.state.text, &self.state.backup).await?;
        let backup = self.state.backup.clone();
        Ok(self.transition(Reloaded { backup, restarted }))
    }
}

// =============================================================================
// Reloaded -> Verified | remedy | rollback
// =============================================================================

impl Switch<Reloaded> {
    /// Check the target directly and through the public path.
    pub async fn verify(self, env: &SwitchEnv) -> TransitionResult<Verified, Reloaded> {
        let slot = self.target();
        let local = env.health.local_check(slot).await;
        let public = env.health.public_check(Some(slot), verify_policy(env)).await;

        if local.passed && public.passed() {
            let state = Verified {
                backup: self.state.backup.clone(),
                restarted: self.state.restarted,
                public,
            };
            return Ok(self.transition(state));
        }

        tracing::warn!(
            "Verification of {} failed: public {} (status {:?}), local {}",
            slot,
            public.outcome,
            public.status,
            local.detail
        );
        Err((
            self,
            SwitchError::Verification {
                slot,
                public: Box::new(public),
                local,
            },
        ))
    }

    /// Reconnect the target to the edge's networks, re-probe and reload.
    pub async fn remedy(mut self, env: &SwitchEnv) -> TransitionResult<Reloaded, Reloaded> {
        let slot = self.target();
        if can_reconnect(env, slot) {
            match reconnect_networks(env, slot).await {
                Ok(joined) => tracing::info!("Remedy joined {} network(s) for {}", joined, slot),
                Err(e) => tracing::warn!("Remedy reconnect for {} failed: {}", slot, e),
            }
        }

        let reachability = env.health.network_reachable(slot, &env.edge.mode).await;
        if !reachability.is_reachable() {
            return Err((self, SwitchError::Unreachable { reachability }));
        }

        if let Err(reload) = env.proxy.reload().await {
            if let Err(restart) = env.proxy.restart().await {
                return Err((
                    self,
                    SwitchError::Reload {
                        reload,
                        restart,
                        restored: false,
                    },
                ));
            }
            self.state.restarted = true;
        }
        Ok(self)
    }

    /// Route the domain back to the previously active slot.
    ///
    /// On success the marker names that slot again. The returned check is
    /// informational; a reloaded rollback counts as confirmed.
    pub async fn rollback(self, env: &SwitchEnv) -> Result<PublicCheck, SwitchError> {
        let slot = self.active();
        tracing::warn!("Rolling back {} to {}", env.config.domain, slot);

        let store = env.store();
        let current = store.read()?;
        let mut table = RouteTable::parse(&current);
        table.set_route(&CanonicalBlock::for_slot(&env.config, slot));
        let text = table.render();

        // The failed config is kept too; the pre-switch copy stays the restore point.
        let failed = store.backup()?;
        tracing::debug!("Backed up unverified config to {}", failed.display());
        write_or_restore(env, &text, &self.state.backup)?;

        apply_config(env, &text, &self.state.backup).await?;

        let marker = env.marker();
        marker.write(slot).map_err(|source| SwitchError::Io {
            path: marker.path().to_path_buf(),
            source,
        })?;

        let check = env.health.public_check(Some(slot), verify_policy(env)).await;
        if !check.passed() {
            tracing::warn!("After rollback the public check reports {}", check.outcome);
        }
        Ok(check)
    }
}

// =============================================================================
// Verified -> done
// =============================================================================

impl Switch<Verified> {
    /// Prune old backups and record the new active slot. The marker is
    /// written last.
    pub fn commit(self, env: &SwitchEnv, diag: &mut Diagnostics) -> Verified {
        let store = env.store();
        match store.prune_backups(env.config.edge.keep_backups) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Pruned {} old backup(s)", n),
            Err(e) => diag.warn(Warning::backup_prune(format!(
                "failed to prune backups of {}: {e}",
                store.path().display()
            ))),
        }

        let marker = env.marker();
        if let Err(e) = marker.write(self.target()) {
            diag.warn(Warning::marker(format!(
                "switched to {} but could not write {}: {e}",
                self.target(),
                marker.path().display()
            )));
        }
        self.state
    }
}
