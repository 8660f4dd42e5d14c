// ABOUTME: Integration tests for the edge proxy controller over a fake runtime.
// ABOUTME: Covers edge detection, and exec-driven config reads and pushes under a timeout.

mod support;

use async_trait::async_trait;
use slotswap::config::Config;
use slotswap::edge::{
    ConfigLocation, EdgeController, EdgeError, EdgeMode, EdgeRuntime, ProxyController,
    detect_edge,
};
use slotswap::runtime::{
    CommandOutput, ContainerState, HostCommand, HostError, HostOps, LocalHost, PublishedPort,
};
use slotswap::types::ContainerId;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{FakeRuntime, container};

/// Host where every command exits non-zero: no port owner, no active unit.
struct QuietHost;

#[async_trait]
impl HostOps for QuietHost {
    async fn run(&self, _command: &HostCommand) -> Result<CommandOutput, HostError> {
        Ok(CommandOutput {
            status: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn publishing_caddy(state: ContainerState) -> slotswap::runtime::ContainerInfo {
    let mut info = container("caddy", "edge0000caddy", None);
    info.state = state;
    info.ports = vec![PublishedPort {
        container_port: 443,
        host_port: Some(443),
    }];
    info
}

fn local_copy_controller(runtime: Arc<FakeRuntime>, timeout: Duration) -> EdgeController {
    let mut settings = Config::template().edge;
    settings.command_timeout = timeout;
    let edge = EdgeRuntime {
        mode: EdgeMode::Container {
            name: "caddy".to_string(),
            id: ContainerId::new("edge0000caddy"),
        },
        config: ConfigLocation::LocalCopy {
            local: PathBuf::from("/tmp/slotswap-edge-copy"),
            in_container: PathBuf::from("/etc/caddy/Caddyfile"),
        },
    };
    EdgeController::new(edge, settings, runtime, Arc::new(LocalHost))
}

fn assert_timed_out(result: Result<impl std::fmt::Debug, EdgeError>, action: &str) {
    match result {
        Err(EdgeError::CommandFailed { action: got, message }) => {
            assert_eq!(got, action);
            assert!(message.contains("timed out"), "{message}");
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn reading_config_from_container_is_bounded() {
    let runtime = Arc::new(FakeRuntime::default());
    *runtime.exec_delay.lock() = Some(Duration::from_secs(30));
    let controller = local_copy_controller(runtime.clone(), Duration::from_millis(50));

    let started = Instant::now();
    assert_timed_out(controller.fetch_config().await, "read config");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(runtime.execs.lock()[0][0], "cat");
}

#[tokio::test]
async fn pushing_config_into_container_is_bounded() {
    let runtime = Arc::new(FakeRuntime::default());
    *runtime.exec_delay.lock() = Some(Duration::from_secs(30));
    let controller = local_copy_controller(runtime, Duration::from_millis(50));

    let started = Instant::now();
    assert_timed_out(controller.sync_config("api.example.com {\n}\n").await, "push config");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn validate_runs_inside_edge_container() {
    let runtime = Arc::new(FakeRuntime::default());
    let controller = local_copy_controller(runtime.clone(), Duration::from_secs(5));

    controller.validate().await.unwrap();

    let execs = runtime.execs.lock().clone();
    assert_eq!(execs.len(), 1);
    assert!(execs[0].iter().any(|arg| arg == "/etc/caddy/Caddyfile"));
}

#[tokio::test]
async fn running_container_publishing_port_is_the_edge() {
    let runtime = FakeRuntime::default();
    runtime.add(publishing_caddy(ContainerState::Running));
    let settings = Config::template().edge;

    let edge = detect_edge(&runtime, &QuietHost, &settings, None).await.unwrap();

    match edge.mode {
        EdgeMode::Container { name, .. } => assert_eq!(name, "caddy"),
        other => panic!("expected container edge, got {other:?}"),
    }
}

#[tokio::test]
async fn stopped_container_is_not_detected_as_edge() {
    let runtime = FakeRuntime::default();
    runtime.add(publishing_caddy(ContainerState::Exited));
    let settings = Config::template().edge;

    let err = detect_edge(&runtime, &QuietHost, &settings, None).await.unwrap_err();

    assert!(matches!(err, EdgeError::NotFound { port: 443, .. }), "{err:?}");
}
