// ABOUTME: Integration tests for the switch pipeline over in-memory fakes.
// ABOUTME: Covers success, readiness timeout, rollback, remedy and reload fallbacks.

mod support;

use slotswap::diagnostics::Diagnostics;
use slotswap::health::CheckOutcome;
use slotswap::runtime::NetworkInfo;
use slotswap::slots::{ActiveSource, PlanError};
use slotswap::switch::{
    SwitchError, SwitchErrorKind, SwitchEvent, SwitchLock, SwitchReport, SwitchRequest, run_switch,
};
use slotswap::types::{Slot, SlotSelection};
use support::{CADDYFILE, Harness, public_check};

const AUTO: SwitchRequest = SwitchRequest {
    selection: SlotSelection::Auto,
    auto_rollback: true,
};

async fn run(h: &Harness, request: SwitchRequest) -> (Result<SwitchReport, SwitchError>, Vec<SwitchEvent>) {
    let env = h.env();
    let lock = SwitchLock::acquire(&h.config.lock_path, &h.config.domain, false).unwrap();
    let mut diag = Diagnostics::default();
    let mut events = Vec::new();
    let result = run_switch(&env, &request, &lock, &mut diag, &mut |e: &SwitchEvent| {
        events.push(e.clone())
    })
    .await;
    lock.release().unwrap();
    (result, events)
}

fn backups(h: &Harness) -> usize {
    std::fs::read_dir(h.dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("Caddyfile.bak."))
        .count()
}

#[tokio::test]
async fn switches_to_idle_slot_and_writes_marker() {
    let h = Harness::new(CADDYFILE);

    let (result, events) = run(&h, AUTO).await;
    let report = result.unwrap();

    assert_eq!(report.plan.active, Slot::Blue);
    assert_eq!(report.plan.target, Slot::Green);
    assert_eq!(report.resolution.source, ActiveSource::EdgeConfig);
    assert!(report.changed);
    assert!(!report.restarted);
    assert!(!report.remedied);

    assert_eq!(h.runtime.brought_up(), vec!["backend-green".to_string()]);
    assert_eq!(h.proxy.reloads(), 1);
    assert_eq!(h.marker().as_deref(), Some("green"));

    let text = h.caddyfile();
    assert!(text.starts_with("{\n\temail ops@example.com\n}\n\napi.example.com {"));
    assert!(text.contains("reverse_proxy backend-green:8000"));
    assert!(!text.contains("backend-blue"));
    assert!(text.contains("other.example.com {\n\treverse_proxy other:9000\n}"));
    assert_eq!(backups(&h), 1);

    assert!(matches!(events.first(), Some(SwitchEvent::Planned { .. })));
    assert!(matches!(events.last(), Some(SwitchEvent::Verified { .. })));
}

#[tokio::test]
async fn readiness_timeout_changes_nothing() {
    let h = Harness::new(CADDYFILE);
    *h.health.ready.lock() = false;

    let (result, _) = run(&h, AUTO).await;
    let err = result.unwrap_err();

    assert_eq!(err.kind(), SwitchErrorKind::ReadinessTimeout);
    assert_eq!(h.caddyfile(), CADDYFILE);
    assert_eq!(h.proxy.reloads(), 0);
    assert_eq!(backups(&h), 0);
    assert!(h.marker().is_none());
}

#[tokio::test]
async fn unreachable_target_is_not_routed() {
    let h = Harness::new(CADDYFILE);
    h.health.script_reachable([false, false]);

    let (result, _) = run(&h, AUTO).await;
    let err = result.unwrap_err();

    assert_eq!(err.kind(), SwitchErrorKind::Reachability);
    assert_eq!(h.caddyfile(), CADDYFILE);
    assert_eq!(h.proxy.reloads(), 0);
}

#[tokio::test]
async fn unreachable_target_recovers_after_reconnect() {
    let h = Harness::new(CADDYFILE);
    h.runtime
        .containers
        .lock()
        .get_mut("caddy")
        .unwrap()
        .network_settings
        .networks
        .insert(
            "web".to_string(),
            NetworkInfo {
                network_id: "net-web".to_string(),
                ..Default::default()
            },
        );
    h.health.script_reachable([false, true]);

    let (result, events) = run(&h, AUTO).await;
    result.unwrap();

    let connected = h.runtime.connected.lock().clone();
    assert_eq!(connected.len(), 1);
    assert_eq!(connected[0].1, "net-web");
    assert_eq!(connected[0].2, vec!["backend-green".to_string()]);
    assert!(events.iter().any(|e| matches!(
        e,
        SwitchEvent::Reachable {
            reconnected: true,
            ..
        }
    )));
}

#[tokio::test]
async fn failed_verification_rolls_back_to_active_slot() {
    let h = Harness::new(CADDYFILE);
    h.health.script_public([public_check(
        CheckOutcome::WrongSlot,
        Some(200),
        Some(Slot::Blue),
    )]);

    let (result, events) = run(&h, AUTO).await;
    let err = result.unwrap_err();

    match err {
        SwitchError::RolledBack {
            target, restored, ..
        } => {
            assert_eq!(target, Slot::Green);
            assert_eq!(restored, Slot::Blue);
        }
        other => panic!("expected rollback, got {other:?}"),
    }
    assert_eq!(h.marker().as_deref(), Some("blue"));

    let text = h.caddyfile();
    assert!(text.contains("reverse_proxy backend-blue:8000"));
    assert!(!text.contains("backend-green"));
    assert_eq!(h.proxy.reloads(), 2);
    assert_eq!(backups(&h), 2);
    assert_eq!(h.health.public_calls(), vec![Some(Slot::Green), Some(Slot::Blue)]);
    assert!(events.iter().any(|e| matches!(e, SwitchEvent::RolledBack { to: Slot::Blue, .. })));
}

#[tokio::test]
async fn failed_verification_without_rollback_leaves_target_in_place() {
    let h = Harness::new(CADDYFILE);
    h.health.script_public([public_check(CheckOutcome::BadStatus, Some(503), None)]);

    let request = SwitchRequest {
        auto_rollback: false,
        ..AUTO
    };
    let (result, _) = run(&h, request).await;
    let err = result.unwrap_err();

    assert_eq!(err.kind(), SwitchErrorKind::Verification);
    assert!(h.caddyfile().contains("reverse_proxy backend-green:8000"));
    assert!(h.marker().is_none());
}

#[tokio::test]
async fn upstream_502_triggers_one_remedy() {
    let h = Harness::new(CADDYFILE);
    h.health.script_public([public_check(
        CheckOutcome::UpstreamUnreachable,
        Some(502),
        None,
    )]);

    let (result, events) = run(&h, AUTO).await;
    let report = result.unwrap();

    assert!(report.remedied);
    assert_eq!(h.proxy.reloads(), 2);
    assert_eq!(h.marker().as_deref(), Some("green"));
    assert!(events.iter().any(|e| matches!(e, SwitchEvent::Remedying { slot: Slot::Green })));
}

#[tokio::test]
async fn reload_failure_falls_back_to_restart() {
    let h = Harness::new(CADDYFILE);
    *h.proxy.fail_reload.lock() = true;

    let (result, _) = run(&h, AUTO).await;
    let report = result.unwrap();

    assert!(report.restarted);
    assert_eq!(h.proxy.restarts(), 1);
    assert_eq!(h.marker().as_deref(), Some("green"));
}

#[tokio::test]
async fn invalid_config_restores_backup() {
    let h = Harness::new(CADDYFILE);
    *h.proxy.fail_validate.lock() = true;

    let (result, _) = run(&h, AUTO).await;
    let err = result.unwrap_err();

    assert!(matches!(err, SwitchError::Validate { restored: true, .. }));
    assert_eq!(err.kind(), SwitchErrorKind::Reload);
    assert_eq!(h.caddyfile(), CADDYFILE);
    assert!(h.marker().is_none());
}

#[tokio::test]
async fn refuses_explicit_slot_that_is_live() {
    let h = Harness::new(CADDYFILE);
    *h.health.live.lock() = Some(Slot::Blue);

    let request = SwitchRequest {
        selection: SlotSelection::Explicit(Slot::Blue),
        auto_rollback: true,
    };
    let (result, _) = run(&h, request).await;

    assert!(matches!(
        result,
        Err(SwitchError::Plan(PlanError::TargetIsLive(Slot::Blue)))
    ));
    assert!(h.runtime.brought_up().is_empty());
    assert_eq!(h.caddyfile(), CADDYFILE);
}

#[tokio::test]
async fn second_switch_returns_to_first_slot() {
    let h = Harness::new(CADDYFILE);

    run(&h, AUTO).await.0.unwrap();
    let report = run(&h, AUTO).await.0.unwrap();

    assert_eq!(report.plan.active, Slot::Green);
    assert_eq!(report.plan.target, Slot::Blue);
    assert_eq!(h.marker().as_deref(), Some("blue"));
    assert_eq!(h.caddyfile().matches("api.example.com {").count(), 1);
}

#[tokio::test]
async fn bring_up_failure_aborts_before_routing() {
    let h = Harness::new(CADDYFILE);
    *h.runtime.fail_bring_up.lock() = true;

    let (result, _) = run(&h, AUTO).await;

    assert!(matches!(result, Err(SwitchError::BringUp { slot: Slot::Green, .. })));
    assert_eq!(h.caddyfile(), CADDYFILE);
}

#[tokio::test]
async fn failed_config_write_stops_before_reload() {
    use std::os::unix::fs::PermissionsExt;

    let h = Harness::new(CADDYFILE);
    std::fs::set_permissions(&h.caddyfile, std::fs::Permissions::from_mode(0o444)).unwrap();
    if std::fs::OpenOptions::new().write(true).open(&h.caddyfile).is_ok() {
        // Privileged runs ignore file modes, so the write cannot be made to fail.
        return;
    }

    let (result, _) = run(&h, AUTO).await;
    let err = result.unwrap_err();

    assert!(matches!(err, SwitchError::Write { .. }));
    assert_eq!(err.kind(), SwitchErrorKind::Io);
    assert_eq!(h.caddyfile(), CADDYFILE);
    assert_eq!(h.proxy.reloads(), 0);
    assert!(h.marker().is_none());
}
