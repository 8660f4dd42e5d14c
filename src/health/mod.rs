// ABOUTME: Health prober seam: slot readiness, local and public checks, reachability.
// ABOUTME: Results are values, never errors; callers decide what a failure means.

mod http;
pub mod retry;

pub use http::{HttpProber, classify};
pub use retry::{RetryError, RetryPolicy, poll_until_deadline, retry_until};

use crate::edge::EdgeMode;
use crate::types::{Slot, SlotHealth};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Classification of one public probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// 2xx/3xx and, if the response names a slot, the expected one.
    Pass,
    /// Healthy response naming a different slot.
    WrongSlot,
    /// Any other non-success status.
    BadStatus,
    /// The edge answered 502: it cannot reach the upstream.
    UpstreamUnreachable,
    /// No HTTP response at all.
    Transport,
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckOutcome::Pass => "pass",
            CheckOutcome::WrongSlot => "wrong slot",
            CheckOutcome::BadStatus => "bad status",
            CheckOutcome::UpstreamUnreachable => "upstream unreachable",
            CheckOutcome::Transport => "no response",
        };
        f.write_str(s)
    }
}

/// Last observed public probe response.
#[derive(Debug, Clone, Serialize)]
pub struct PublicCheck {
    pub url: String,
    pub status: Option<u16>,
    /// Value of the slot-identifying header, if present.
    pub slot_header: Option<String>,
    /// Slot named by the response body, if any.
    pub body_slot: Option<Slot>,
    pub headers: Vec<(String, String)>,
    pub checked_at: DateTime<Utc>,
    pub outcome: CheckOutcome,
    pub attempts: u32,
    /// Transport error text when there was no response.
    pub error: Option<String>,
}

impl PublicCheck {
    pub fn passed(&self) -> bool {
        self.outcome == CheckOutcome::Pass
    }

    /// Slot the response claims to come from, header first.
    pub fn answered_slot(&self) -> Option<Slot> {
        self.slot_header
            .as_deref()
            .and_then(Slot::find_in)
            .or(self.body_slot)
    }
}

/// Result of one direct check of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalCheck {
    pub slot: Slot,
    pub passed: bool,
    pub status: Option<u16>,
    pub detail: String,
}

/// Result of waiting for a slot to become ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub slot: Slot,
    pub ready: bool,
    pub health: SlotHealth,
    pub attempts: u32,
    #[serde(with = "humantime_serde")]
    pub waited: Duration,
    pub detail: String,
}

/// Whether the edge can reach a slot's upstream address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reachability {
    pub slot: Slot,
    pub address: String,
    pub resolved: bool,
    pub connected: bool,
    pub detail: String,
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        self.resolved && self.connected
    }
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Wait until the slot's container is healthy (or answers its health
    /// endpoint when it has no healthcheck), bounded by `timeout`.
    async fn wait_healthy(&self, slot: Slot, timeout: Duration) -> Readiness;

    /// One direct check of the slot, bypassing the edge.
    async fn local_check(&self, slot: Slot) -> LocalCheck;

    /// Probe the public endpoint until it passes or `policy` runs out.
    async fn public_check(&self, expected: Option<Slot>, policy: RetryPolicy) -> PublicCheck;

    /// Slot currently answering on the public endpoint, if it says.
    async fn probe_live_slot(&self) -> Option<Slot>;

    /// Whether the edge can resolve and connect to the slot's upstream.
    async fn network_reachable(&self, slot: Slot, edge: &EdgeMode) -> Reachability;
}
