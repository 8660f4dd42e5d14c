// ABOUTME: Operator scripts around a switch: pre-switch, post-switch and on-error.
// ABOUTME: Scripts live in .slotswap/hooks next to the config and read the slot plan from SLOTSWAP_* vars.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::slots::SlotPlan;

/// How long a hook may run before it is killed.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// Where in a switch a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Slots are planned and nothing has been touched. Failure cancels the switch.
    PreSwitch,
    /// The target slot answers on the public domain.
    PostSwitch,
    /// The switch failed; the script gets the reason in `SLOTSWAP_ERROR`.
    OnError,
}

impl HookPoint {
    /// Script file name under the hooks directory.
    pub fn name(self) -> &'static str {
        match self {
            HookPoint::PreSwitch => "pre-switch",
            HookPoint::PostSwitch => "post-switch",
            HookPoint::OnError => "on-error",
        }
    }

    pub fn is_fatal(self) -> bool {
        self == HookPoint::PreSwitch
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a hook script learns about the switch.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub domain: String,
    /// Absent when the run failed before slots were planned.
    pub plan: Option<SlotPlan>,
    pub error: Option<String>,
}

impl HookContext {
    pub fn planned(domain: &str, plan: SlotPlan) -> Self {
        Self {
            domain: domain.to_string(),
            plan: Some(plan),
            error: None,
        }
    }

    pub fn failed(domain: &str, plan: Option<SlotPlan>, error: impl fmt::Display) -> Self {
        Self {
            domain: domain.to_string(),
            plan,
            error: Some(error.to_string()),
        }
    }

    /// Environment handed to the script running at `point`.
    pub fn env(&self, point: HookPoint) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            ("SLOTSWAP_HOOK", point.name().to_string()),
            ("SLOTSWAP_DOMAIN", self.domain.clone()),
        ];
        if let Some(plan) = self.plan {
            vars.push(("SLOTSWAP_ACTIVE", plan.active.to_string()));
            vars.push(("SLOTSWAP_TARGET", plan.target.to_string()));
        }
        if let Some(ref error) = self.error {
            vars.push(("SLOTSWAP_ERROR", error.clone()));
        }
        vars
    }
}

/// How a hook script finished.
#[derive(Debug)]
pub struct HookRun {
    pub point: HookPoint,
    /// `None` when the script was killed or never started.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl HookRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Last line the script wrote to stderr, else its exit status.
    pub fn reason(&self) -> String {
        if let Some(line) = self.stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            return line.trim().to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with {code}"),
            None => "did not exit".to_string(),
        }
    }
}

/// Finds and runs hook scripts for one project.
pub struct HookRunner {
    project_dir: PathBuf,
    timeout: Duration,
}

impl HookRunner {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self, point: HookPoint) -> PathBuf {
        self.project_dir
            .join(".slotswap")
            .join("hooks")
            .join(point.name())
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.path(point).is_file()
    }

    /// Run the script for `point` from the project directory.
    ///
    /// `None` when no script is installed. A script still running after the
    /// timeout is killed and reported as failed.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookRun> {
        let path = self.path(point);
        if !path.is_file() {
            tracing::debug!("No {} hook at {}", point, path.display());
            return None;
        }

        tracing::info!("Running {} hook {}", point, path.display());

        let mut command = Command::new(&path);
        command
            .envs(context.env(point))
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => HookRun {
                point,
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Ok(Err(e)) => HookRun {
                point,
                exit_code: None,
                stdout: String::new(),
                stderr: format!("could not start {}: {e}", path.display()),
            },
            Err(_) => HookRun {
                point,
                exit_code: None,
                stdout: String::new(),
                stderr: format!("killed after {:?}", self.timeout),
            },
        };

        if run.succeeded() {
            tracing::info!("{} hook finished", point);
        } else {
            tracing::warn!("{} hook failed: {}", point, run.reason());
        }
        Some(run)
    }
}
