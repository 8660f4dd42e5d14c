// ABOUTME: Diagnostics accumulator for non-fatal warnings, and next-step commands for failures.
// ABOUTME: Failures always come with commands an operator can paste to investigate.

use crate::config::Config;
use crate::edge::{EdgeMode, EdgeRuntime};
use crate::runtime::RuntimeType;
use crate::switch::{SwitchError, SwitchErrorKind};
use crate::types::Slot;

/// Collects non-fatal warnings during a switch.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a switch.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    pub fn backup_prune(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::BackupPrune,
            message: message.into(),
        }
    }

    pub fn marker(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Marker,
            message: message.into(),
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Hook,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to release the switch lock; it is freed on exit regardless.
    LockRelease,
    /// Old config backups could not be removed.
    BackupPrune,
    /// Traffic switched but the active marker was not updated.
    Marker,
    /// A post-switch or on-error hook failed.
    Hook,
}

/// Shell commands a human would run next after a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticCommands {
    commands: Vec<String>,
}

impl DiagnosticCommands {
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn push(&mut self, command: impl Into<String>) {
        let command = command.into();
        if !self.commands.contains(&command) {
            self.commands.push(command);
        }
    }

    /// Commands for investigating `err`.
    ///
    /// `edge` is `None` when the failure happened before the edge was found.
    pub fn for_error(
        err: &SwitchError,
        config: &Config,
        runtime: RuntimeType,
        edge: Option<&EdgeRuntime>,
        target: Option<Slot>,
    ) -> Self {
        let cli = runtime;
        let mut out = Self::default();
        let probe_url = config.probe.url(config.domain.trim());
        let resolve = format!(
            "{}:{}:{}",
            config.domain.trim(),
            config.probe.effective_port(),
            config.public_ip
        );

        match err.root_cause().kind() {
            SwitchErrorKind::Lock => {
                out.push(format!("cat {}", config.lock_path.display()));
                out.push(format!("fuser -v {}", config.lock_path.display()));
                out.push("ps aux | grep '[s]lotswap'");
            }
            SwitchErrorKind::Detection => {
                out.push(format!("ss -ltnp 'sport = :{}'", config.edge.public_port));
                out.push(format!("{cli} ps --filter publish={}", config.edge.public_port));
                out.push(format!("systemctl status {}", config.edge.unit));
            }
            SwitchErrorKind::ReadinessTimeout | SwitchErrorKind::Config => {
                if let Some(slot) = target {
                    let spec = config.slot(slot);
                    out.push(format!(
                        "{cli} inspect --format '{{{{json .State}}}}' {}",
                        spec.container
                    ));
                    out.push(format!("{cli} logs --tail 100 {}", spec.container));
                    if let Some(port) = spec.local_port {
                        out.push(format!("curl -sS -i http://127.0.0.1:{port}{}", config.health.path));
                    }
                }
            }
            SwitchErrorKind::Reachability => {
                if let Some(slot) = target {
                    let spec = config.slot(slot);
                    out.push(format!(
                        "{cli} inspect --format '{{{{json .NetworkSettings.Networks}}}}' {}",
                        spec.container
                    ));
                    if let Some(EdgeMode::Container { name, .. }) = edge.map(|e| &e.mode) {
                        out.push(format!(
                            "{cli} inspect --format '{{{{json .NetworkSettings.Networks}}}}' {name}"
                        ));
                        out.push(format!(
                            "{cli} exec {name} wget -q -O - http://{}{}",
                            spec.upstream, config.health.path
                        ));
                    } else {
                        out.push(format!("curl -sS -i http://{}{}", spec.upstream, config.health.path));
                    }
                }
            }
            SwitchErrorKind::Reload | SwitchErrorKind::Verification | SwitchErrorKind::Io => {
                if let Some(edge) = edge {
                    let path = edge.proxy_path().display().to_string();
                    match &edge.mode {
                        EdgeMode::Container { name, .. } => {
                            out.push(format!("{cli} exec {name} caddy validate --config {path} --adapter caddyfile"));
                            out.push(format!("{cli} logs --tail 100 {name}"));
                        }
                        EdgeMode::Host { unit } => {
                            out.push(format!("caddy validate --config {path} --adapter caddyfile"));
                            out.push(format!("journalctl -u {unit} -n 100 --no-pager"));
                        }
                    }
                    out.push(format!("ls -lt {}.bak.*", edge.editable_path().display()));
                }
                out.push(format!("curl -sS -i --resolve {resolve} {probe_url}"));
                if let Some(slot) = target
                    && let Some(port) = config.slot(slot).local_port
                {
                    out.push(format!("curl -sS -i http://127.0.0.1:{port}{}", config.health.path));
                }
            }
        }

        out.push(format!("cat {}", config.marker_path().display()));
        out
    }
}
