// ABOUTME: Switch state types for the type state pattern.
// ABOUTME: Each state carries what later steps need, so transitions cannot skip a step.

use crate::health::{PublicCheck, Reachability, Readiness};
use std::path::PathBuf;

/// Slots chosen, nothing touched yet.
/// Available actions: `bring_up()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Planned;

/// Idle slot's service started or updated.
/// Available actions: `wait_healthy()`
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleUp;

/// Idle slot passed its readiness wait.
/// Available actions: `ensure_reachable()`
#[derive(Debug, Clone)]
pub struct IdleHealthy {
    pub readiness: Readiness,
}

/// Edge can reach the idle slot.
/// Available actions: `rewrite()`
#[derive(Debug, Clone)]
pub struct Reachable {
    pub reachability: Reachability,
    /// Whether networks were reconnected to get here.
    pub reconnected: bool,
}

/// Editable config now routes the domain to the idle slot.
/// Available actions: `reload()`
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// Copy of the config as it was before the run.
    pub backup: PathBuf,
    pub text: String,
    pub changed: bool,
}

/// Edge is running the rewritten config.
/// Available actions: `verify()`, `remedy()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Reloaded {
    pub backup: PathBuf,
    /// Reload failed and the edge was restarted instead.
    pub restarted: bool,
}

/// Public path serves the new slot.
/// Available actions: `commit()`
#[derive(Debug, Clone)]
pub struct Verified {
    pub backup: PathBuf,
    pub restarted: bool,
    pub public: PublicCheck,
}
