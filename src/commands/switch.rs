// ABOUTME: Switch command implementation.
// ABOUTME: Handles locking, edge detection, hooks, and the switch pipeline.

use super::runtime_connection::{RuntimeConnection, connect_to_runtime};
use slotswap::config::Config;
use slotswap::diagnostics::{DiagnosticCommands, Diagnostics, Warning};
use slotswap::edge::{EdgeController, EdgeRuntime, detect_edge};
use slotswap::error::{Error, Result};
use slotswap::health::HttpProber;
use slotswap::hooks::{HookContext, HookPoint, HookRunner};
use slotswap::output::Output;
use slotswap::runtime::ContainerRuntime;
use slotswap::switch::{
    PreparedSwitch, SwitchEnv, SwitchError, SwitchEvent, SwitchLock, SwitchReport, SwitchRequest,
    execute_switch, prepare_switch,
};
use std::env;
use std::sync::Arc;

/// What a failed run got as far as learning, for hooks and diagnostics.
#[derive(Default)]
struct Progress {
    edge: Option<EdgeRuntime>,
    prepared: Option<PreparedSwitch>,
}

/// Switch the configured domain to the idle (or requested) slot.
pub async fn switch(
    config: Config,
    request: SwitchRequest,
    edge: Option<&str>,
    force_unlock: bool,
    output: &mut Output,
) -> Result<()> {
    output.start_timer();
    let cwd = env::current_dir()?;
    let hook_runner = HookRunner::new(config.project_dir().unwrap_or(&cwd));
    let mut diag = Diagnostics::default();
    let domain = config.domain.trim().to_string();

    output.progress(&format!("Switching {} ({})", domain, request.selection));

    let conn = connect_to_runtime(&config, output).await?;

    output.progress("  → Acquiring switch lock...");
    let lock = match SwitchLock::acquire(&config.lock_path, &domain, force_unlock) {
        Ok(lock) => lock,
        Err(e) => {
            report_failure(&e, &config, &conn, &Progress::default(), output);
            return Err(e.into());
        }
    };

    let mut progress = Progress::default();
    let result = switch_locked(
        &config,
        &request,
        edge,
        &conn,
        &lock,
        &hook_runner,
        &mut diag,
        output,
        &mut progress,
    )
    .await;

    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(format!("Failed to release switch lock: {e}")));
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            let hook_context =
                HookContext::failed(&domain, progress.prepared.map(|p| p.plan), &e);
            if let Some(run) = hook_runner.run(HookPoint::OnError, &hook_context).await
                && !run.succeeded()
            {
                diag.warn(Warning::hook(format!("on-error hook failed: {}", run.reason())));
            }

            if let Error::Switch(ref switch_error) = e {
                report_failure(switch_error, &config, &conn, &progress, output);
            }
            for warning in diag.warnings() {
                output.warning(&warning.message);
            }
            return Err(e);
        }
    };

    let hook_context = HookContext::planned(&domain, report.plan);
    if let Some(run) = hook_runner.run(HookPoint::PostSwitch, &hook_context).await
        && !run.succeeded()
    {
        diag.warn(Warning::hook(format!("post-switch hook failed: {}", run.reason())));
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    output.event(&report);
    output.success(&format!(
        "{} now served by {} (was {})",
        domain, report.plan.target, report.plan.active
    ));
    Ok(())
}

/// Everything that runs while the lock is held.
#[allow(clippy::too_many_arguments)]
async fn switch_locked(
    config: &Config,
    request: &SwitchRequest,
    edge: Option<&str>,
    conn: &RuntimeConnection,
    lock: &SwitchLock,
    hook_runner: &HookRunner,
    diag: &mut Diagnostics,
    output: &Output,
    progress: &mut Progress,
) -> Result<SwitchReport> {
    let runtime: Arc<dyn ContainerRuntime> = conn.runtime.clone();

    output.progress("  → Detecting edge proxy...");
    let edge = detect_edge(runtime.as_ref(), conn.host.as_ref(), &config.edge, edge)
        .await
        .map_err(SwitchError::Detection)?;
    output.progress(&format!(
        "  → Edge is {}, editing {}",
        edge.mode,
        edge.editable_path().display()
    ));
    progress.edge = Some(edge.clone());

    let proxy = EdgeController::new(
        edge.clone(),
        config.edge.clone(),
        runtime.clone(),
        conn.host.clone(),
    );
    let health = HttpProber::new(config, runtime.clone())?;
    let env = SwitchEnv {
        config: config.clone(),
        runtime,
        edge,
        proxy: Arc::new(proxy),
        health: Arc::new(health),
    };

    let prepared = prepare_switch(&env, request).await?;
    progress.prepared = Some(prepared);

    let hook_context = HookContext::planned(config.domain.trim(), prepared.plan);
    let point = HookPoint::PreSwitch;
    if let Some(run) = hook_runner.run(point, &hook_context).await
        && !run.succeeded()
    {
        if point.is_fatal() {
            return Err(Error::Hook(format!("{} hook: {}", point, run.reason())));
        }
        diag.warn(Warning::hook(format!("{} hook failed: {}", point, run.reason())));
    }

    let mut observer = |event: &SwitchEvent| {
        output.progress(&describe(event));
        output.event(event);
    };
    let report = execute_switch(&env, prepared, request, lock, diag, &mut observer).await?;
    Ok(report)
}

fn report_failure(
    err: &SwitchError,
    config: &Config,
    conn: &RuntimeConnection,
    progress: &Progress,
    output: &Output,
) {
    let commands = DiagnosticCommands::for_error(
        err,
        config,
        conn.runtime_type,
        progress.edge.as_ref(),
        progress.prepared.map(|p| p.plan.target),
    );
    output.diagnostic_commands(commands.commands());
}

/// Human-readable progress line for an event.
fn describe(event: &SwitchEvent) -> String {
    match event {
        SwitchEvent::Planned { resolution, plan } => format!(
            "  → Active slot is {} ({}), deploying {}",
            plan.active, resolution.source, plan.target
        ),
        SwitchEvent::BringingUp { slot } => format!("  → Bringing up {slot}..."),
        SwitchEvent::WaitingHealthy { slot, timeout } => format!(
            "  → Waiting for {slot} to become healthy (timeout {}s)...",
            timeout.as_secs()
        ),
        SwitchEvent::Healthy { readiness } => format!(
            "  → {} is {} after {} attempt(s)",
            readiness.slot, readiness.health, readiness.attempts
        ),
        SwitchEvent::Reachable { reconnected, .. } => {
            if *reconnected {
                "  → Edge can reach the upstream after reconnecting networks".to_string()
            } else {
                "  → Edge can reach the upstream".to_string()
            }
        }
        SwitchEvent::Rewritten {
            path,
            backup,
            changed,
        } => {
            if *changed {
                format!(
                    "  → Rewrote {} (backup {})",
                    path.display(),
                    backup.display()
                )
            } else {
                format!("  → {} already routes to the target", path.display())
            }
        }
        SwitchEvent::Reloaded { restarted } => {
            if *restarted {
                "  → Reload failed; edge restarted".to_string()
            } else {
                "  → Edge reloaded".to_string()
            }
        }
        SwitchEvent::Verifying { slot } => format!("  → Verifying public endpoint serves {slot}..."),
        SwitchEvent::VerificationFailed {
            slot,
            outcome,
            status,
        } => match status {
            Some(code) => format!("  → Verification of {slot} failed: {outcome} (HTTP {code})"),
            None => format!("  → Verification of {slot} failed: {outcome}"),
        },
        SwitchEvent::Remedying { slot } => {
            format!("  → Edge answered 502; reconnecting {slot} and reloading...")
        }
        SwitchEvent::RollingBack { to } => format!("  → Rolling back to {to}..."),
        SwitchEvent::RolledBack { to, check } => {
            format!("  → Rolled back to {to} (public check: {})", check.outcome)
        }
        SwitchEvent::Verified { public } => format!(
            "  → Public endpoint answered {} after {} attempt(s)",
            public
                .answered_slot()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "OK".to_string()),
            public.attempts
        ),
    }
}
