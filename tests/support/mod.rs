// ABOUTME: Test support utilities.
// ABOUTME: In-memory fakes for the runtime, edge proxy and health seams, plus fixtures.

use async_trait::async_trait;
use parking_lot::Mutex;
use slotswap::config::Config;
use slotswap::edge::{ConfigLocation, EdgeError, EdgeMode, EdgeRuntime, ProxyController};
use slotswap::health::{
    CheckOutcome, HealthChecker, LocalCheck, PublicCheck, Reachability, Readiness, RetryPolicy,
};
use slotswap::runtime::{
    ContainerError, ContainerInfo, ContainerOps, ContainerState, ContainerSummary, ExecConfig,
    ExecError, ExecOps, ExecResult, HealthState, NetworkError, NetworkOps, NetworkSettings,
};
use slotswap::switch::SwitchEnv;
use slotswap::types::{ContainerId, NetworkId, ServiceName, Slot, SlotHealth};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter =
            EnvFilter::from_default_env().add_directive("slotswap=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Caddyfile with a global options block, an unrelated site and a stale
/// block for the domain pointing at blue.
#[allow(dead_code)]
pub const CADDYFILE: &str = "{\n\temail ops@example.com\n}\n\nother.example.com {\n\treverse_proxy other:9000\n}\n\napi.example.com {\n\treverse_proxy backend-blue:8000\n}\n";

/// Config rooted in `dir`, with fast probe timings.
#[allow(dead_code)]
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::template();
    config.state_dir = dir.join("state");
    config.lock_path = dir.join("slotswap.lock");
    config.health.timeout = Duration::from_millis(200);
    config.probe.retries = 2;
    config.probe.interval = Duration::from_millis(1);
    config
}

/// Container edge whose config is bind-mounted from `host`.
#[allow(dead_code)]
pub fn container_edge(host: &Path) -> EdgeRuntime {
    EdgeRuntime {
        mode: EdgeMode::Container {
            name: "caddy".to_string(),
            id: ContainerId::new("edge0000caddy"),
        },
        config: ConfigLocation::BindMounted {
            host: host.to_path_buf(),
            in_container: PathBuf::from("/etc/caddy/Caddyfile"),
        },
    }
}

#[allow(dead_code)]
pub fn container(name: &str, id: &str, health: Option<HealthState>) -> ContainerInfo {
    ContainerInfo {
        id: ContainerId::new(id),
        name: name.to_string(),
        image: "app:latest".to_string(),
        state: ContainerState::Running,
        health,
        started_at: None,
        pid: None,
        labels: HashMap::new(),
        network_settings: NetworkSettings::default(),
        mounts: Vec::new(),
        ports: Vec::new(),
    }
}

// =============================================================================
// Runtime
// =============================================================================

/// In-memory container runtime recording every mutation.
#[derive(Default)]
pub struct FakeRuntime {
    pub containers: Mutex<HashMap<String, ContainerInfo>>,
    pub brought_up: Mutex<Vec<String>>,
    pub connected: Mutex<Vec<(String, String, Vec<String>)>>,
    pub execs: Mutex<Vec<Vec<String>>>,
    pub fail_bring_up: Mutex<bool>,
    /// Delay before every exec answers.
    pub exec_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl FakeRuntime {
    pub fn add(&self, info: ContainerInfo) {
        self.containers.lock().insert(info.name.clone(), info);
    }

    pub fn brought_up(&self) -> Vec<String> {
        self.brought_up.lock().clone()
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError> {
        let containers = self.containers.lock();
        Ok(containers
            .get(name)
            .or_else(|| containers.values().find(|c| c.id.as_str() == name))
            .cloned())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        Ok(self
            .containers
            .lock()
            .values()
            .filter(|c| c.is_running())
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: "running".to_string(),
                status: String::new(),
                labels: c.labels.clone(),
                ports: c.ports.clone(),
            })
            .collect())
    }

    async fn restart_container(&self, _id: &ContainerId) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn bring_up(
        &self,
        service: &ServiceName,
        container: &ServiceName,
    ) -> Result<(), ContainerError> {
        if *self.fail_bring_up.lock() {
            return Err(ContainerError::BringUp {
                service: service.to_string(),
                message: "compose exited 1".to_string(),
            });
        }
        self.brought_up.lock().push(service.to_string());
        self.containers
            .lock()
            .entry(container.to_string())
            .or_insert_with(|| {
                container_info_for(container.as_str(), Some(HealthState::Healthy))
            });
        Ok(())
    }
}

fn container_info_for(name: &str, health: Option<HealthState>) -> ContainerInfo {
    container(name, &format!("{name}-id"), health)
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn exec(
        &self,
        _container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        self.execs.lock().push(config.cmd.clone());
        let delay = *self.exec_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(ExecResult::default())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn connect_to_network(
        &self,
        container: &ContainerId,
        network: &NetworkId,
        aliases: &[String],
    ) -> Result<(), NetworkError> {
        self.connected.lock().push((
            container.to_string(),
            network.to_string(),
            aliases.to_vec(),
        ));
        Ok(())
    }
}

// =============================================================================
// Edge proxy
// =============================================================================

/// Edge proxy reading a file on disk, with switchable failures.
pub struct FakeProxy {
    pub path: PathBuf,
    pub validations: Mutex<u32>,
    pub reloads: Mutex<u32>,
    pub restarts: Mutex<u32>,
    pub fail_validate: Mutex<bool>,
    pub fail_reload: Mutex<bool>,
    pub fail_restart: Mutex<bool>,
}

#[allow(dead_code)]
impl FakeProxy {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            validations: Mutex::new(0),
            reloads: Mutex::new(0),
            restarts: Mutex::new(0),
            fail_validate: Mutex::new(false),
            fail_reload: Mutex::new(false),
            fail_restart: Mutex::new(false),
        }
    }

    pub fn reloads(&self) -> u32 {
        *self.reloads.lock()
    }

    pub fn restarts(&self) -> u32 {
        *self.restarts.lock()
    }
}

fn command_failed(action: &'static str) -> EdgeError {
    EdgeError::CommandFailed {
        action,
        message: format!("{action} refused"),
    }
}

#[async_trait]
impl ProxyController for FakeProxy {
    async fn fetch_config(&self) -> Result<String, EdgeError> {
        std::fs::read_to_string(&self.path).map_err(|source| EdgeError::Io {
            path: self.path.clone(),
            source,
        })
    }

    async fn sync_config(&self, _text: &str) -> Result<(), EdgeError> {
        Ok(())
    }

    async fn validate(&self) -> Result<(), EdgeError> {
        *self.validations.lock() += 1;
        if *self.fail_validate.lock() {
            return Err(command_failed("validate"));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), EdgeError> {
        *self.reloads.lock() += 1;
        if *self.fail_reload.lock() {
            return Err(command_failed("reload"));
        }
        Ok(())
    }

    async fn restart(&self) -> Result<(), EdgeError> {
        *self.restarts.lock() += 1;
        if *self.fail_restart.lock() {
            return Err(command_failed("restart"));
        }
        Ok(())
    }
}

// =============================================================================
// Health
// =============================================================================

/// Scripted health prober.
///
/// Public checks pop from `public`; once it is empty every check passes for
/// the expected slot.
pub struct FakeHealth {
    pub ready: Mutex<bool>,
    pub reachable: Mutex<VecDeque<bool>>,
    pub public: Mutex<VecDeque<PublicCheck>>,
    pub public_calls: Mutex<Vec<Option<Slot>>>,
    pub live: Mutex<Option<Slot>>,
}

impl Default for FakeHealth {
    fn default() -> Self {
        Self {
            ready: Mutex::new(true),
            reachable: Mutex::new(VecDeque::new()),
            public: Mutex::new(VecDeque::new()),
            public_calls: Mutex::new(Vec::new()),
            live: Mutex::new(None),
        }
    }
}

#[allow(dead_code)]
impl FakeHealth {
    pub fn script_public(&self, checks: impl IntoIterator<Item = PublicCheck>) {
        self.public.lock().extend(checks);
    }

    pub fn script_reachable(&self, results: impl IntoIterator<Item = bool>) {
        self.reachable.lock().extend(results);
    }

    pub fn public_calls(&self) -> Vec<Option<Slot>> {
        self.public_calls.lock().clone()
    }
}

/// Public check with the given outcome, naming `slot` in its header.
#[allow(dead_code)]
pub fn public_check(outcome: CheckOutcome, status: Option<u16>, slot: Option<Slot>) -> PublicCheck {
    PublicCheck {
        url: "https://api.example.com/__slot".to_string(),
        status,
        slot_header: slot.map(|s| s.to_string()),
        body_slot: slot,
        headers: Vec::new(),
        checked_at: chrono::Utc::now(),
        outcome,
        attempts: 1,
        error: None,
    }
}

#[async_trait]
impl HealthChecker for FakeHealth {
    async fn wait_healthy(&self, slot: Slot, timeout: Duration) -> Readiness {
        let ready = *self.ready.lock();
        Readiness {
            slot,
            ready,
            health: if ready {
                SlotHealth::Healthy
            } else {
                SlotHealth::Unhealthy
            },
            attempts: 1,
            waited: if ready { Duration::ZERO } else { timeout },
            detail: if ready {
                String::new()
            } else {
                "health check reports unhealthy".to_string()
            },
        }
    }

    async fn local_check(&self, slot: Slot) -> LocalCheck {
        LocalCheck {
            slot,
            passed: true,
            status: Some(200),
            detail: String::new(),
        }
    }

    async fn public_check(&self, expected: Option<Slot>, _policy: RetryPolicy) -> PublicCheck {
        self.public_calls.lock().push(expected);
        self.public
            .lock()
            .pop_front()
            .unwrap_or_else(|| public_check(CheckOutcome::Pass, Some(200), expected))
    }

    async fn probe_live_slot(&self) -> Option<Slot> {
        *self.live.lock()
    }

    async fn network_reachable(&self, slot: Slot, _edge: &EdgeMode) -> Reachability {
        let ok = self.reachable.lock().pop_front().unwrap_or(true);
        Reachability {
            slot,
            address: format!("backend-{slot}:8000"),
            resolved: ok,
            connected: ok,
            detail: if ok {
                String::new()
            } else {
                "cannot resolve".to_string()
            },
        }
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A switch environment over fakes, with the Caddyfile in a temp dir.
#[allow(dead_code)]
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub caddyfile: PathBuf,
    pub runtime: Arc<FakeRuntime>,
    pub proxy: Arc<FakeProxy>,
    pub health: Arc<FakeHealth>,
    pub config: Config,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(caddyfile: &str) -> Self {
        init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Caddyfile");
        std::fs::write(&path, caddyfile).unwrap();

        let runtime = FakeRuntime::default();
        runtime.add(container("caddy", "edge0000caddy", None));
        runtime.add(container("app-backend-blue", "blue0001", Some(HealthState::Healthy)));

        Self {
            config: test_config(dir.path()),
            caddyfile: path.clone(),
            runtime: Arc::new(runtime),
            proxy: Arc::new(FakeProxy::new(&path)),
            health: Arc::new(FakeHealth::default()),
            dir,
        }
    }

    pub fn env(&self) -> SwitchEnv {
        SwitchEnv {
            config: self.config.clone(),
            runtime: self.runtime.clone(),
            edge: container_edge(&self.caddyfile),
            proxy: self.proxy.clone(),
            health: self.health.clone(),
        }
    }

    pub fn caddyfile(&self) -> String {
        std::fs::read_to_string(&self.caddyfile).unwrap()
    }

    pub fn marker(&self) -> Option<String> {
        std::fs::read_to_string(self.config.marker_path()).ok()
    }
}
