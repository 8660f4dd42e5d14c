// ABOUTME: Runtime state probe: slot container health, port ownership, unit state.
// ABOUTME: Read-only queries against the runtime and the host, each bounded by a timeout.

use super::host::{HostCommand, HostError, HostOps};
use super::traits::{ContainerInfo, ContainerOps, ContainerState, HealthState};
use crate::config::SlotSpec;
use crate::types::{Slot, SlotHealth, SlotState};
use std::time::Duration;

/// Process listening on a port, as reported by `ss`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortOwner {
    pub process: String,
    pub pid: u32,
}

/// Map a container's state and healthcheck to a slot health value.
pub fn slot_health(info: &ContainerInfo) -> SlotHealth {
    match info.state {
        ContainerState::Running => match info.health {
            Some(HealthState::Healthy) => SlotHealth::Healthy,
            Some(HealthState::Unhealthy) => SlotHealth::Unhealthy,
            Some(HealthState::Starting) | Some(HealthState::None) | None => SlotHealth::Running,
        },
        ContainerState::Paused | ContainerState::Restarting => SlotHealth::Unhealthy,
        ContainerState::Created
        | ContainerState::Exited
        | ContainerState::Dead
        | ContainerState::Removing => SlotHealth::Unknown,
    }
}

/// Current state of one slot's backing container.
///
/// Runtime failures are reported as [`SlotHealth::Unknown`]; the probe
/// never fails the caller.
pub async fn slot_state<R>(runtime: &R, slot: Slot, spec: &SlotSpec) -> SlotState
where
    R: ContainerOps + ?Sized,
{
    match runtime.inspect_container(spec.container.as_str()).await {
        Ok(Some(info)) => SlotState {
            slot,
            health: slot_health(&info),
            started_at: info.started_at,
        },
        Ok(None) => SlotState::absent(slot),
        Err(e) => {
            tracing::warn!("Failed to inspect {} ({}): {}", spec.container, slot, e);
            SlotState {
                slot,
                health: SlotHealth::Unknown,
                started_at: None,
            }
        }
    }
}

/// Owner of a listening TCP port, via `ss -H -ltnp "sport = :<port>"`.
pub async fn port_owner(
    host: &dyn HostOps,
    port: u16,
    timeout: Duration,
) -> Result<Option<PortOwner>, HostError> {
    let filter = format!("sport = :{port}");
    let command = HostCommand::program("ss", &["-H", "-ltnp", &filter], timeout);
    let output = host.run(&command).await?;
    if !output.success() {
        tracing::debug!("ss exited with {:?}: {}", output.status, output.message());
        return Ok(None);
    }
    Ok(parse_ss_owner(&output.stdout))
}

/// Extract the first `users:(("name",pid=N,...))` entry from `ss` output.
pub fn parse_ss_owner(output: &str) -> Option<PortOwner> {
    output.lines().find_map(|line| {
        let users = &line[line.find("users:((")? + "users:((".len()..];
        let name_start = users.find('"')? + 1;
        let name_len = users[name_start..].find('"')?;
        let process = users[name_start..name_start + name_len].to_string();

        let rest = &users[name_start + name_len..];
        let pid_start = rest.find("pid=")? + "pid=".len();
        let pid: String = rest[pid_start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();

        Some(PortOwner {
            process,
            pid: pid.parse().ok()?,
        })
    })
}

/// Whether a systemd unit is active, via `systemctl is-active --quiet`.
pub async fn unit_active(
    host: &dyn HostOps,
    unit: &str,
    timeout: Duration,
) -> Result<bool, HostError> {
    let command = HostCommand::program("systemctl", &["is-active", "--quiet", unit], timeout);
    Ok(host.run(&command).await?.success())
}

/// Main PID of a systemd unit, if it has one.
pub async fn unit_main_pid(
    host: &dyn HostOps,
    unit: &str,
    timeout: Duration,
) -> Result<Option<u32>, HostError> {
    let command = HostCommand::program(
        "systemctl",
        &["show", "--property=MainPID", "--value", unit],
        timeout,
    );
    let output = host.run(&command).await?;
    if !output.success() {
        return Ok(None);
    }
    Ok(output.stdout.trim().parse().ok().filter(|pid| *pid > 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::traits::NetworkSettings;
    use crate::types::ContainerId;

    fn info(state: ContainerState, health: Option<HealthState>) -> ContainerInfo {
        ContainerInfo {
            id: ContainerId::new("abc"),
            name: "app".to_string(),
            image: "app:latest".to_string(),
            state,
            health,
            started_at: None,
            pid: None,
            labels: Default::default(),
            network_settings: NetworkSettings::default(),
            mounts: Vec::new(),
            ports: Vec::new(),
        }
    }

    #[test]
    fn running_without_healthcheck_is_running() {
        assert_eq!(slot_health(&info(ContainerState::Running, None)), SlotHealth::Running);
        assert_eq!(
            slot_health(&info(ContainerState::Running, Some(HealthState::Starting))),
            SlotHealth::Running
        );
    }

    #[test]
    fn healthcheck_result_wins_while_running() {
        assert_eq!(
            slot_health(&info(ContainerState::Running, Some(HealthState::Healthy))),
            SlotHealth::Healthy
        );
        assert_eq!(
            slot_health(&info(ContainerState::Running, Some(HealthState::Unhealthy))),
            SlotHealth::Unhealthy
        );
    }

    #[test]
    fn stopped_containers_are_not_serving() {
        assert_eq!(
            slot_health(&info(ContainerState::Exited, Some(HealthState::Healthy))),
            SlotHealth::Unknown
        );
        assert_eq!(
            slot_health(&info(ContainerState::Restarting, None)),
            SlotHealth::Unhealthy
        );
    }

    #[test]
    fn parses_ss_owner() {
        let out = "LISTEN 0      4096         *:443        *:*    users:((\"caddy\",pid=1234,fd=7))\n";
        assert_eq!(
            parse_ss_owner(out),
            Some(PortOwner {
                process: "caddy".to_string(),
                pid: 1234
            })
        );
    }

    #[test]
    fn parses_first_of_several_users() {
        let out = "LISTEN 0 4096 0.0.0.0:443 0.0.0.0:* users:((\"docker-proxy\",pid=88,fd=4),(\"docker-proxy\",pid=89,fd=4))";
        assert_eq!(parse_ss_owner(out).unwrap().pid, 88);
    }

    #[test]
    fn ss_without_process_info_has_no_owner() {
        assert_eq!(parse_ss_owner("LISTEN 0 4096 *:443 *:*\n"), None);
        assert_eq!(parse_ss_owner(""), None);
    }
}
