// ABOUTME: Integration tests for the HTTP health prober.
// ABOUTME: Public and local checks run against wiremock servers on loopback.

mod support;

use slotswap::config::Config;
use slotswap::edge::EdgeMode;
use slotswap::health::{CheckOutcome, HealthChecker, HttpProber, RetryPolicy};
use slotswap::runtime::HealthState;
use slotswap::types::Slot;
use std::sync::Arc;
use std::time::Duration;
use support::{FakeRuntime, container};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config whose public domain is pinned to `server` over plain HTTP.
fn pinned_config(server: &MockServer) -> Config {
    let mut config = Config::template();
    config.probe.scheme = "http".to_string();
    config.probe.port = Some(server.address().port());
    config.probe.retries = 3;
    config.probe.interval = Duration::from_millis(5);
    config.health.interval = Duration::from_millis(10);
    config
}

fn prober(config: &Config, runtime: FakeRuntime) -> HttpProber {
    HttpProber::new(config, Arc::new(runtime)).unwrap()
}

fn policy(config: &Config) -> RetryPolicy {
    RetryPolicy::fixed(config.probe.retries, config.probe.interval)
}

#[tokio::test]
async fn public_check_passes_when_header_names_expected_slot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__slot"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Deploy-Slot", "green")
                .set_body_string("green"),
        )
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let check = prober(&config, FakeRuntime::default())
        .public_check(Some(Slot::Green), policy(&config))
        .await;

    assert_eq!(check.outcome, CheckOutcome::Pass);
    assert_eq!(check.status, Some(200));
    assert_eq!(check.answered_slot(), Some(Slot::Green));
    assert_eq!(check.attempts, 1);
    assert!(check.url.starts_with("http://api.example.com:"));
}

#[tokio::test]
async fn public_check_reports_wrong_slot_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__slot"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Deploy-Slot", "blue"))
        .expect(3)
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let check = prober(&config, FakeRuntime::default())
        .public_check(Some(Slot::Green), policy(&config))
        .await;

    assert_eq!(check.outcome, CheckOutcome::WrongSlot);
    assert_eq!(check.attempts, 3);
}

#[tokio::test]
async fn bad_gateway_is_upstream_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let check = prober(&config, FakeRuntime::default())
        .public_check(Some(Slot::Green), policy(&config))
        .await;

    assert_eq!(check.outcome, CheckOutcome::UpstreamUnreachable);
    assert_eq!(check.status, Some(502));
}

#[tokio::test]
async fn service_unavailable_is_a_bad_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let check = prober(&config, FakeRuntime::default())
        .public_check(Some(Slot::Blue), policy(&config))
        .await;

    assert_eq!(check.outcome, CheckOutcome::BadStatus);
}

#[tokio::test]
async fn live_probe_reads_slot_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/__slot"))
        .respond_with(ResponseTemplate::new(200).set_body_string("blue"))
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let live = prober(&config, FakeRuntime::default())
        .probe_live_slot()
        .await;

    assert_eq!(live, Some(Slot::Blue));
}

#[tokio::test]
async fn live_probe_is_none_when_edge_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let config = pinned_config(&server);
    let live = prober(&config, FakeRuntime::default())
        .probe_live_slot()
        .await;

    assert_eq!(live, None);
}

#[tokio::test]
async fn local_check_hits_loopback_health_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut config = pinned_config(&server);
    config.slots.green.local_port = Some(server.address().port());

    let check = prober(&config, FakeRuntime::default())
        .local_check(Slot::Green)
        .await;

    assert!(check.passed, "{}", check.detail);
    assert_eq!(check.status, Some(204));
}

#[tokio::test]
async fn wait_healthy_accepts_healthy_container() {
    let server = MockServer::start().await;
    let config = pinned_config(&server);
    let runtime = FakeRuntime::default();
    runtime.add(container("app-backend-green", "green01", Some(HealthState::Healthy)));

    let readiness = prober(&config, runtime)
        .wait_healthy(Slot::Green, Duration::from_secs(2))
        .await;

    assert!(readiness.ready, "{}", readiness.detail);
    assert_eq!(readiness.attempts, 1);
}

#[tokio::test]
async fn wait_healthy_falls_back_to_http_without_healthcheck() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut config = pinned_config(&server);
    config.slots.green.local_port = Some(server.address().port());
    let runtime = FakeRuntime::default();
    runtime.add(container("app-backend-green", "green01", None));

    let readiness = prober(&config, runtime)
        .wait_healthy(Slot::Green, Duration::from_secs(2))
        .await;

    assert!(readiness.ready, "{}", readiness.detail);
}

#[tokio::test]
async fn wait_healthy_times_out_on_unhealthy_container() {
    let server = MockServer::start().await;
    let config = pinned_config(&server);
    let runtime = FakeRuntime::default();
    runtime.add(container("app-backend-green", "green01", Some(HealthState::Unhealthy)));

    let readiness = prober(&config, runtime)
        .wait_healthy(Slot::Green, Duration::from_millis(100))
        .await;

    assert!(!readiness.ready);
    assert!(readiness.detail.contains("unhealthy"));
}

#[tokio::test]
async fn wait_healthy_reports_missing_container() {
    let server = MockServer::start().await;
    let config = pinned_config(&server);

    let readiness = prober(&config, FakeRuntime::default())
        .wait_healthy(Slot::Blue, Duration::from_millis(50))
        .await;

    assert!(!readiness.ready);
    assert!(readiness.detail.contains("not found"));
}

#[tokio::test]
async fn host_edge_reaches_loopback_upstream() {
    let server = MockServer::start().await;
    let mut config = pinned_config(&server);
    config.slots.green.upstream = format!("127.0.0.1:{}", server.address().port());

    let edge = EdgeMode::Host {
        unit: "caddy".to_string(),
    };
    let reach = prober(&config, FakeRuntime::default())
        .network_reachable(Slot::Green, &edge)
        .await;

    assert!(reach.is_reachable(), "{}", reach.detail);
}

#[tokio::test]
async fn container_edge_runs_probe_inside_edge() {
    let server = MockServer::start().await;
    let config = pinned_config(&server);
    let runtime = Arc::new(FakeRuntime::default());
    let prober = HttpProber::new(&config, runtime.clone()).unwrap();

    let edge = EdgeMode::Container {
        name: "caddy".to_string(),
        id: slotswap::types::ContainerId::new("edge01"),
    };
    let reach = prober.network_reachable(Slot::Green, &edge).await;

    // The fake exec exits 0, so the probe script counts as a success.
    assert!(reach.is_reachable());
    let execs = runtime.execs.lock().clone();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0][0], "sh");
}
