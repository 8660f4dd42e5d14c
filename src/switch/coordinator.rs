// ABOUTME: Switch coordinator: drives one run from slot selection to marker write.
// ABOUTME: Progress is reported through an observer so callers choose how to print it.

use crate::diagnostics::Diagnostics;
use crate::health::{CheckOutcome, PublicCheck, Reachability, Readiness};
use crate::slots::{self, ActiveResolution, SlotPlan};
use crate::types::{Slot, SlotSelection};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::SwitchError;
use super::lock::SwitchLock;
use super::machine::{Switch, SwitchEnv};
use super::state::{Reloaded, Verified};
use super::transitions::TransitionResult;

/// What the operator asked for.
#[derive(Debug, Clone, Copy)]
pub struct SwitchRequest {
    pub selection: SlotSelection,
    pub auto_rollback: bool,
}

/// Progress of a run, in order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwitchEvent {
    Planned {
        resolution: ActiveResolution,
        plan: SlotPlan,
    },
    BringingUp {
        slot: Slot,
    },
    WaitingHealthy {
        slot: Slot,
        #[serde(with = "humantime_serde")]
        timeout: Duration,
    },
    Healthy {
        readiness: Readiness,
    },
    Reachable {
        reachability: Reachability,
        reconnected: bool,
    },
    Rewritten {
        path: PathBuf,
        backup: PathBuf,
        changed: bool,
    },
    Reloaded {
        restarted: bool,
    },
    Verifying {
        slot: Slot,
    },
    VerificationFailed {
        slot: Slot,
        outcome: CheckOutcome,
        status: Option<u16>,
    },
    Remedying {
        slot: Slot,
    },
    RollingBack {
        to: Slot,
    },
    RolledBack {
        to: Slot,
        check: PublicCheck,
    },
    Verified {
        public: PublicCheck,
    },
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub resolution: ActiveResolution,
    pub plan: SlotPlan,
    pub readiness: Readiness,
    pub backup: PathBuf,
    pub changed: bool,
    pub restarted: bool,
    pub remedied: bool,
    pub public: PublicCheck,
}

/// Read the config the edge currently uses, refreshing the local copy
/// when the edge's file lives only inside its container.
async fn load_edge_config(env: &SwitchEnv) -> Result<String, SwitchError> {
    let text = env
        .proxy
        .fetch_config()
        .await
        .map_err(SwitchError::EdgeConfig)?;

    if env.edge.is_local_copy() {
        let store = env.store();
        if let Some(parent) = store.path().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SwitchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        store.write_in_place(&text)?;
        tracing::debug!("Refreshed local copy {}", store.path().display());
    }
    Ok(text)
}

/// Verify, with one remedy attempt when the edge answered 502.
async fn verify_with_remedy(
    switch: Switch<Reloaded>,
    env: &SwitchEnv,
    observer: &mut dyn FnMut(&SwitchEvent),
) -> (TransitionResult<Verified, Reloaded>, bool) {
    let slot = switch.target();
    observer(&SwitchEvent::Verifying { slot });

    let (switch, err) = match switch.verify(env).await {
        Ok(verified) => return (Ok(verified), false),
        Err(failed) => failed,
    };
    report_failure(slot, &err, observer);

    if !err.is_upstream_unreachable() {
        return (Err((switch, err)), false);
    }

    observer(&SwitchEvent::Remedying { slot });
    let switch = match switch.remedy(env).await {
        Ok(switch) => switch,
        Err(failed) => return (Err(failed), true),
    };

    observer(&SwitchEvent::Verifying { slot });
    let result = switch.verify(env).await;
    if let Err((_, ref err)) = result {
        report_failure(slot, err, observer);
    }
    (result, true)
}

fn report_failure(slot: Slot, err: &SwitchError, observer: &mut dyn FnMut(&SwitchEvent)) {
    if let Some(public) = err.public_check() {
        observer(&SwitchEvent::VerificationFailed {
            slot,
            outcome: public.outcome,
            status: public.status,
        });
    }
}

/// Slots chosen for a run, before anything is changed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PreparedSwitch {
    pub resolution: ActiveResolution,
    pub plan: SlotPlan,
}

/// Read the edge config, resolve the active slot and plan the run.
///
/// Only the local copy of a container edge's config is written.
pub async fn prepare_switch(
    env: &SwitchEnv,
    request: &SwitchRequest,
) -> Result<PreparedSwitch, SwitchError> {
    let current = load_edge_config(env).await?;
    let inputs = slots::observe(
        &env.config,
        env.runtime.as_ref(),
        env.health.as_ref(),
        Some(&current),
    )
    .await;
    let resolution = slots::resolve_active(&inputs);
    let plan = slots::plan(request.selection, &resolution)?;
    tracing::info!(
        "Active {} ({}), switching to {}",
        plan.active,
        resolution.source,
        plan.target
    );
    Ok(PreparedSwitch { resolution, plan })
}

/// Plan and run one switch while holding `lock`.
pub async fn run_switch(
    env: &SwitchEnv,
    request: &SwitchRequest,
    lock: &SwitchLock,
    diag: &mut Diagnostics,
    observer: &mut dyn FnMut(&SwitchEvent),
) -> Result<SwitchReport, SwitchError> {
    let prepared = prepare_switch(env, request).await?;
    execute_switch(env, prepared, request, lock, diag, observer).await
}

/// Run a prepared switch while holding `lock`.
///
/// Nothing that affects traffic happens until the target slot is ready and
/// reachable. Returns an error whenever the target does not end up serving,
/// including after a successful rollback.
pub async fn execute_switch(
    env: &SwitchEnv,
    prepared: PreparedSwitch,
    request: &SwitchRequest,
    lock: &SwitchLock,
    diag: &mut Diagnostics,
    observer: &mut dyn FnMut(&SwitchEvent),
) -> Result<SwitchReport, SwitchError> {
    tracing::debug!("Switching {} under lock {}", env.config.domain, lock.path().display());
    let PreparedSwitch { resolution, plan } = prepared;
    observer(&SwitchEvent::Planned { resolution, plan });

    let switch = Switch::new(plan);
    observer(&SwitchEvent::BringingUp { slot: plan.target });
    let switch = switch.bring_up(env).await?;

    observer(&SwitchEvent::WaitingHealthy {
        slot: plan.target,
        timeout: env.config.health.timeout,
    });
    let switch = switch.wait_healthy(env).await?;
    let readiness = switch.state().readiness.clone();
    observer(&SwitchEvent::Healthy {
        readiness: readiness.clone(),
    });

    let switch = switch.ensure_reachable(env).await?;
    observer(&SwitchEvent::Reachable {
        reachability: switch.state().reachability.clone(),
        reconnected: switch.state().reconnected,
    });

    let switch = switch.rewrite(env).await?;
    let changed = switch.state().changed;
    observer(&SwitchEvent::Rewritten {
        path: env.edge.editable_path().to_path_buf(),
        backup: switch.state().backup.clone(),
        changed,
    });

    let switch = switch.reload(env).await?;
    observer(&SwitchEvent::Reloaded {
        restarted: switch.restarted(),
    });

    let (verified, remedied) = verify_with_remedy(switch, env, observer).await;
    match verified {
        Ok(switch) => {
            observer(&SwitchEvent::Verified {
                public: switch.public_check().clone(),
            });
            let state = switch.commit(env, diag);
            Ok(SwitchReport {
                resolution,
                plan,
                readiness,
                backup: state.backup,
                changed,
                restarted: state.restarted,
                remedied,
                public: state.public,
            })
        }
        Err((switch, cause)) if request.auto_rollback => {
            observer(&SwitchEvent::RollingBack { to: plan.active });
            match switch.rollback(env).await {
                Ok(check) => {
                    observer(&SwitchEvent::RolledBack {
                        to: plan.active,
                        check,
                    });
                    Err(SwitchError::RolledBack {
                        target: plan.target,
                        restored: plan.active,
                        cause: Box::new(cause),
                    })
                }
                Err(rollback) => Err(SwitchError::RollbackFailed {
                    target: plan.target,
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                }),
            }
        }
        Err((_, cause)) => {
            tracing::warn!("Automatic rollback disabled; leaving {} in place", plan.target);
            Err(cause)
        }
    }
}
