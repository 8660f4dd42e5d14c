// ABOUTME: Error types for switch runs.
// ABOUTME: kind() groups failures by the step that produced them.

use crate::edge::EdgeError;
use crate::health::{CheckOutcome, LocalCheck, PublicCheck, Reachability, Readiness};
use crate::routes::RouteError;
use crate::runtime::ContainerError;
use crate::slots::PlanError;
use crate::types::Slot;
use super::lock::LockInfo;
use std::path::PathBuf;

/// Category of a switch failure, for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchErrorKind {
    /// Another run holds the lock, or the lock file is unusable.
    Lock,
    /// No edge found, or its config cannot be read.
    Detection,
    /// The idle slot never became ready. Nothing was switched.
    ReadinessTimeout,
    /// The edge cannot reach the idle slot. Nothing was switched.
    Reachability,
    /// Validate, reload or restart of the edge failed.
    Reload,
    /// The switched edge did not serve the new slot.
    Verification,
    /// The requested plan is not allowed.
    Config,
    /// Local file operations failed.
    Io,
}

/// Errors that end a switch run.
#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    #[error("another switch is in progress: lock {path} held by {holder}")]
    LockHeld {
        path: PathBuf,
        holder: String,
        /// `None` while the holder has locked the file but not yet recorded itself.
        info: Option<LockInfo>,
    },

    #[error("lock error: {0}")]
    Lock(String),

    #[error("edge detection failed: {0}")]
    Detection(#[source] EdgeError),

    #[error("cannot read edge config: {0}")]
    EdgeConfig(#[source] EdgeError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("failed to bring up {slot}: {source}")]
    BringUp {
        slot: Slot,
        #[source]
        source: ContainerError,
    },

    #[error("{} did not become ready within {:?}: {}", .readiness.slot, .readiness.waited, .readiness.detail)]
    NotReady { readiness: Box<Readiness> },

    #[error("edge cannot reach {} at {}: {}", .reachability.slot, .reachability.address, .reachability.detail)]
    Unreachable { reachability: Reachability },

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("writing the edge config failed ({}): {source}", restored_note(.restored))]
    Write {
        #[source]
        source: RouteError,
        restored: bool,
    },

    #[error("edge rejected the new config ({}): {source}", restored_note(.restored))]
    Validate {
        #[source]
        source: EdgeError,
        restored: bool,
    },

    #[error("edge reload failed ({reload}) and restart failed ({}): {}", .restart, restored_note(.restored))]
    Reload {
        reload: EdgeError,
        restart: EdgeError,
        restored: bool,
    },

    #[error("edge does not serve {slot}: public check {}, local check {}", .public.outcome, local_note(.local))]
    Verification {
        slot: Slot,
        public: Box<PublicCheck>,
        local: LocalCheck,
    },

    #[error("switch to {target} failed and traffic was rolled back to {restored}: {cause}")]
    RolledBack {
        target: Slot,
        restored: Slot,
        cause: Box<SwitchError>,
    },

    #[error("switch to {target} failed ({cause}) and rollback failed: {rollback}")]
    RollbackFailed {
        target: Slot,
        cause: Box<SwitchError>,
        rollback: Box<SwitchError>,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn restored_note(restored: &bool) -> &'static str {
    if *restored {
        "previous config restored"
    } else {
        "previous config NOT restored"
    }
}

fn local_note(local: &LocalCheck) -> &'static str {
    if local.passed { "passed" } else { "failed" }
}

impl SwitchError {
    pub fn kind(&self) -> SwitchErrorKind {
        match self {
            SwitchError::LockHeld { .. } | SwitchError::Lock(_) => SwitchErrorKind::Lock,
            SwitchError::Detection(_) | SwitchError::EdgeConfig(_) => SwitchErrorKind::Detection,
            SwitchError::Plan(_) => SwitchErrorKind::Config,
            SwitchError::BringUp { .. } | SwitchError::NotReady { .. } => {
                SwitchErrorKind::ReadinessTimeout
            }
            SwitchError::Unreachable { .. } => SwitchErrorKind::Reachability,
            SwitchError::Validate { .. } | SwitchError::Reload { .. } => SwitchErrorKind::Reload,
            SwitchError::Verification { .. }
            | SwitchError::RolledBack { .. }
            | SwitchError::RollbackFailed { .. } => SwitchErrorKind::Verification,
            SwitchError::Route(_) | SwitchError::Write { .. } | SwitchError::Io { .. } => {
                SwitchErrorKind::Io
            }
        }
    }

    /// Whether the public check failed only because the edge got a 502.
    pub fn is_upstream_unreachable(&self) -> bool {
        matches!(
            self,
            SwitchError::Verification { public, .. }
                if public.outcome == CheckOutcome::UpstreamUnreachable
        )
    }

    /// Whether the run ended with the previous slot serving again.
    pub fn rolled_back(&self) -> bool {
        matches!(self, SwitchError::RolledBack { .. })
    }

    /// Innermost failure, looking through rollback wrappers.
    pub fn root_cause(&self) -> &SwitchError {
        match self {
            SwitchError::RolledBack { cause, .. } | SwitchError::RollbackFailed { cause, .. } => {
                cause.root_cause()
            }
            other => other,
        }
    }

    /// Last public check seen before failing, if any.
    pub fn public_check(&self) -> Option<&PublicCheck> {
        match self.root_cause() {
            SwitchError::Verification { public, .. } => Some(public),
            _ => None,
        }
    }
}
