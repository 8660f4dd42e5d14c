// ABOUTME: HTTP and runtime backed HealthChecker.
// ABOUTME: Public probes pin the domain to public_ip; reachability runs inside the edge container.

use super::retry::{RetryPolicy, poll_until_deadline, retry_until};
use super::{CheckOutcome, HealthChecker, LocalCheck, PublicCheck, Reachability, Readiness};
use crate::config::Config;
use crate::edge::EdgeMode;
use crate::runtime::probe::slot_health;
use crate::runtime::{ContainerRuntime, ExecConfig, HealthState};
use crate::types::{ContainerId, Slot, SlotHealth};
use async_trait::async_trait;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit codes of the reachability script run inside the edge container.
const EXIT_UNRESOLVED: i64 = 10;
const EXIT_UNREACHABLE: i64 = 11;

const REACH_SCRIPT: &str = r#"getent hosts "$H" >/dev/null 2>&1 || nslookup "$H" >/dev/null 2>&1 || exit 10
out=$(wget -q -T "$T" -O /dev/null "http://$H:$P$U" 2>&1) && exit 0
case "$out" in *"server returned error"*) exit 0 ;; esac
echo "$out" >&2
exit 11"#;

/// Classify a public probe response.
///
/// Only 502 counts as the edge failing to reach the upstream.
pub fn classify(
    status: u16,
    slot_header: Option<&str>,
    body_slot: Option<Slot>,
    expected: Option<Slot>,
) -> CheckOutcome {
    if status == 502 {
        return CheckOutcome::UpstreamUnreachable;
    }
    if !(200..400).contains(&status) {
        return CheckOutcome::BadStatus;
    }
    let Some(expected) = expected else {
        return CheckOutcome::Pass;
    };

    match slot_header {
        Some(value) => match Slot::find_in(value) {
            Some(slot) if slot == expected => CheckOutcome::Pass,
            _ => CheckOutcome::WrongSlot,
        },
        None => match body_slot {
            Some(slot) if slot != expected => CheckOutcome::WrongSlot,
            _ => CheckOutcome::Pass,
        },
    }
}

/// HealthChecker over HTTP, the container runtime and TCP.
pub struct HttpProber {
    config: Config,
    runtime: Arc<dyn ContainerRuntime>,
    public: reqwest::Client,
    local: reqwest::Client,
}

impl HttpProber {
    pub fn new(config: &Config, runtime: Arc<dyn ContainerRuntime>) -> Result<Self, reqwest::Error> {
        let pinned = SocketAddr::new(config.public_ip, config.probe.effective_port());
        let public = reqwest::Client::builder()
            .resolve(config.domain.trim(), pinned)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.probe.request_timeout)
            .connect_timeout(config.probe.request_timeout)
            .danger_accept_invalid_certs(config.probe.insecure_tls)
            .no_proxy()
            .build()?;

        let local = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.health.request_timeout)
            .connect_timeout(config.health.request_timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            config: config.clone(),
            runtime,
            public,
            local,
        })
    }

    fn public_url(&self) -> String {
        self.config.probe.url(self.config.domain.trim())
    }

    async fn probe_once(&self, expected: Option<Slot>, attempt: u32) -> PublicCheck {
        let url = self.public_url();
        let checked_at = Utc::now();

        let response = match self.public.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Public probe {} failed: {}", url, e);
                return PublicCheck {
                    url,
                    status: None,
                    slot_header: None,
                    body_slot: None,
                    headers: Vec::new(),
                    checked_at,
                    outcome: CheckOutcome::Transport,
                    attempts: attempt,
                    error: Some(e.to_string()),
                };
            }
        };

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let slot_header = response
            .headers()
            .get(self.config.probe.header.as_str())
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string());
        let body_slot = match response.text().await {
            Ok(body) => Slot::find_in(&body),
            Err(_) => None,
        };

        let outcome = classify(status, slot_header.as_deref(), body_slot, expected);
        tracing::debug!(
            "Public probe attempt {}: {} {:?} -> {}",
            attempt,
            status,
            slot_header,
            outcome
        );

        PublicCheck {
            url,
            status: Some(status),
            slot_header,
            body_slot,
            headers,
            checked_at,
            outcome,
            attempts: attempt,
            error: None,
        }
    }

    async fn local_http(&self, port: u16) -> Result<u16, String> {
        let url = format!("http://127.0.0.1:{}{}", port, self.config.health.path);
        match self.local.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if (200..400).contains(&status) {
                    Ok(status)
                } else {
                    Err(format!("{url} answered {status}"))
                }
            }
            Err(e) => Err(format!("{url}: {e}")),
        }
    }

    /// One readiness observation: `Ok` when the slot can take traffic.
    async fn readiness_attempt(&self, slot: Slot) -> Result<SlotHealth, (SlotHealth, String)> {
        let spec = self.config.slot(slot);
        let inspected = tokio::time::timeout(
            self.config.health.request_timeout,
            self.runtime.inspect_container(spec.container.as_str()),
        )
        .await;

        let info = match inspected {
            Err(_) => return Err((SlotHealth::Unknown, "inspect timed out".to_string())),
            Ok(Err(e)) => return Err((SlotHealth::Unknown, e.to_string())),
            Ok(Ok(None)) => {
                return Err((SlotHealth::Absent, format!("container {} not found", spec.container)));
            }
            Ok(Ok(Some(info))) => info,
        };

        let health = slot_health(&info);
        if !info.is_running() {
            return Err((health, format!("container is {:?}", info.state).to_lowercase()));
        }

        match info.health {
            Some(HealthState::Healthy) => Ok(SlotHealth::Healthy),
            Some(HealthState::Starting) => Err((health, "healthcheck starting".to_string())),
            Some(HealthState::Unhealthy) => Err((health, "healthcheck unhealthy".to_string())),
            Some(HealthState::None) | None => match spec.local_port {
                Some(port) => self
                    .local_http(port)
                    .await
                    .map(|_| SlotHealth::Running)
                    .map_err(|detail| (health, detail)),
                None => Ok(SlotHealth::Running),
            },
        }
    }

    async fn reachable_from_host(&self, slot: Slot, address: &str) -> Reachability {
        let timeout = self.config.health.request_timeout;
        let mut result = Reachability {
            slot,
            address: address.to_string(),
            resolved: false,
            connected: false,
            detail: String::new(),
        };

        let addrs: Vec<SocketAddr> =
            match tokio::time::timeout(timeout, tokio::net::lookup_host(address)).await {
                Ok(Ok(addrs)) => addrs.collect(),
                Ok(Err(e)) => {
                    result.detail = format!("cannot resolve {address}: {e}");
                    return result;
                }
                Err(_) => {
                    result.detail = format!("resolving {address} timed out");
                    return result;
                }
            };
        result.resolved = !addrs.is_empty();

        for addr in addrs {
            match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr)).await {
                Ok(Ok(_)) => {
                    result.connected = true;
                    result.detail = format!("connected to {addr}");
                    return result;
                }
                Ok(Err(e)) => result.detail = format!("connect {addr}: {e}"),
                Err(_) => result.detail = format!("connect {addr} timed out"),
            }
        }
        result
    }

    async fn reachable_from_container(
        &self,
        slot: Slot,
        edge: &ContainerId,
        address: &str,
    ) -> Reachability {
        let spec = self.config.slot(slot);
        let mut result = Reachability {
            slot,
            address: address.to_string(),
            resolved: false,
            connected: false,
            detail: String::new(),
        };
        let (Some(host), Some(port)) = (spec.upstream_host(), spec.upstream_port()) else {
            result.detail = format!("upstream {address} is not host:port");
            return result;
        };

        let wait = self.config.health.request_timeout.as_secs().max(1).to_string();
        let exec = ExecConfig::new(["sh", "-c", REACH_SCRIPT])
            .env("H", host)
            .env("P", &port.to_string())
            .env("U", &self.config.health.path)
            .env("T", &wait);

        let outcome = tokio::time::timeout(
            self.config.health.request_timeout * 2,
            self.runtime.exec(edge, &exec),
        )
        .await;

        match outcome {
            Ok(Ok(output)) => match output.exit_code {
                0 => {
                    result.resolved = true;
                    result.connected = true;
                    result.detail = format!("edge reached {address}");
                }
                EXIT_UNRESOLVED => result.detail = format!("edge cannot resolve {host}"),
                EXIT_UNREACHABLE => {
                    result.resolved = true;
                    result.detail = format!(
                        "edge cannot connect to {address}: {}",
                        output.stderr_str().trim()
                    );
                }
                code => {
                    result.detail = format!(
                        "reachability probe exited {code}: {}",
                        output.stderr_str().trim()
                    )
                }
            },
            Ok(Err(e)) => result.detail = format!("exec in edge failed: {e}"),
            Err(_) => result.detail = "reachability probe timed out".to_string(),
        }
        result
    }
}

#[async_trait]
impl HealthChecker for HttpProber {
    async fn wait_healthy(&self, slot: Slot, timeout: Duration) -> Readiness {
        let started = Instant::now();
        tracing::info!("Waiting up to {:?} for {} to become healthy", timeout, slot);

        let outcome = poll_until_deadline(timeout, self.config.health.interval, |attempt| async move {
            let observed = self.readiness_attempt(slot).await;
            if let Err((_, ref detail)) = observed {
                tracing::debug!("{} not ready (attempt {}): {}", slot, attempt, detail);
            }
            observed.map(|health| (health, attempt))
        })
        .await;

        match outcome {
            Ok((health, attempts)) => Readiness {
                slot,
                ready: true,
                health,
                attempts,
                waited: started.elapsed(),
                detail: format!("{slot} is {health}"),
            },
            Err(err) => {
                let (health, detail) = err
                    .last
                    .unwrap_or((SlotHealth::Unknown, "no readiness observation completed".to_string()));
                Readiness {
                    slot,
                    ready: false,
                    health,
                    attempts: err.attempts,
                    waited: started.elapsed(),
                    detail,
                }
            }
        }
    }

    async fn local_check(&self, slot: Slot) -> LocalCheck {
        let spec = self.config.slot(slot);
        if let Some(port) = spec.local_port {
            return match self.local_http(port).await {
                Ok(status) => LocalCheck {
                    slot,
                    passed: true,
                    status: Some(status),
                    detail: format!("127.0.0.1:{port}{} answered {status}", self.config.health.path),
                },
                Err(detail) => LocalCheck {
                    slot,
                    passed: false,
                    status: None,
                    detail,
                },
            };
        }

        match self.readiness_attempt(slot).await {
            Ok(health) => LocalCheck {
                slot,
                passed: true,
                status: None,
                detail: format!("{} is {}", spec.container, health),
            },
            Err((_, detail)) => LocalCheck {
                slot,
                passed: false,
                status: None,
                detail,
            },
        }
    }

    async fn public_check(&self, expected: Option<Slot>, policy: RetryPolicy) -> PublicCheck {
        let outcome = retry_until(policy, |attempt| async move {
            let check = self.probe_once(expected, attempt).await;
            if check.passed() { Ok(check) } else { Err(check) }
        })
        .await;

        match outcome {
            Ok(check) => check,
            Err(err) => err.last.unwrap_or_else(|| PublicCheck {
                url: self.public_url(),
                status: None,
                slot_header: None,
                body_slot: None,
                headers: Vec::new(),
                checked_at: Utc::now(),
                outcome: CheckOutcome::Transport,
                attempts: err.attempts,
                error: Some("no probe attempt completed".to_string()),
            }),
        }
    }

    async fn probe_live_slot(&self) -> Option<Slot> {
        let policy = RetryPolicy::fixed(2, self.config.probe.interval.min(Duration::from_secs(1)));
        let check = self.public_check(None, policy).await;
        if !check.passed() {
            tracing::debug!("Live probe inconclusive: {}", check.outcome);
            return None;
        }
        check.answered_slot()
    }

    async fn network_reachable(&self, slot: Slot, edge: &EdgeMode) -> Reachability {
        let spec = self.config.slot(slot);
        let address = spec.upstream.clone();

        let result = match edge {
            EdgeMode::Container { id, .. } if !spec.is_loopback() => {
                self.reachable_from_container(slot, id, &address).await
            }
            _ => self.reachable_from_host(slot, &address).await,
        };

        if result.is_reachable() {
            tracing::debug!("{} reachable at {}", slot, address);
        } else {
            tracing::warn!("{} not reachable at {}: {}", slot, address, result.detail);
        }
        result
    }
}
