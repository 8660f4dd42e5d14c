// ABOUTME: Blue/green slot identity and observed slot health.
// ABOUTME: A slot and its complement are always an unambiguous active/idle pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid slot '{0}': expected 'blue' or 'green'")]
pub struct ParseSlotError(pub String);

/// One of the two parallel backend deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Blue,
    Green,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Blue, Slot::Green];

    /// The complementary slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }

    /// Find a slot name in free-form text such as a probe body or header value.
    ///
    /// Returns `None` when neither or both names appear.
    pub fn find_in(text: &str) -> Option<Slot> {
        let lower = text.to_ascii_lowercase();
        let blue = lower.contains("blue");
        let green = lower.contains("green");
        match (blue, green) {
            (true, false) => Some(Slot::Blue),
            (false, true) => Some(Slot::Green),
            _ => None,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(Slot::Blue),
            "green" => Ok(Slot::Green),
            _ => Err(ParseSlotError(s.to_string())),
        }
    }
}

/// Operator choice of target slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotSelection {
    #[default]
    Auto,
    Explicit(Slot),
}

impl FromStr for SlotSelection {
    type Err = ParseSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(SlotSelection::Auto);
        }
        s.parse().map(SlotSelection::Explicit)
    }
}

impl fmt::Display for SlotSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotSelection::Auto => f.write_str("auto"),
            SlotSelection::Explicit(slot) => write!(f, "{slot}"),
        }
    }
}

/// Health of the container or process backing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotHealth {
    /// Health check reports healthy.
    Healthy,
    /// Running without a health check verdict.
    Running,
    /// Health check reports unhealthy.
    Unhealthy,
    /// No container exists for the slot.
    Absent,
    /// Exists but is stopped, starting, or could not be inspected.
    Unknown,
}

impl SlotHealth {
    /// Whether the slot can serve traffic right now.
    pub fn is_serving(self) -> bool {
        matches!(self, SlotHealth::Healthy | SlotHealth::Running)
    }
}

impl fmt::Display for SlotHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SlotHealth::Healthy => "healthy",
            SlotHealth::Running => "running",
            SlotHealth::Unhealthy => "unhealthy",
            SlotHealth::Absent => "absent",
            SlotHealth::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Observed state of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotState {
    pub slot: Slot,
    pub health: SlotHealth,
    pub started_at: Option<DateTime<Utc>>,
}

impl SlotState {
    pub fn absent(slot: Slot) -> Self {
        Self {
            slot,
            health: SlotHealth::Absent,
            started_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_is_complement() {
        assert_eq!(Slot::Blue.other(), Slot::Green);
        assert_eq!(Slot::Green.other(), Slot::Blue);
        for slot in Slot::ALL {
            assert_eq!(slot.other().other(), slot);
            assert_ne!(slot.other(), slot);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Blue".parse::<Slot>().unwrap(), Slot::Blue);
        assert_eq!(" green\n".parse::<Slot>().unwrap(), Slot::Green);
        assert!("purple".parse::<Slot>().is_err());
    }

    #[test]
    fn selection_parses_auto() {
        assert_eq!("auto".parse::<SlotSelection>().unwrap(), SlotSelection::Auto);
        assert_eq!(
            "green".parse::<SlotSelection>().unwrap(),
            SlotSelection::Explicit(Slot::Green)
        );
    }

    #[test]
    fn find_in_requires_single_name() {
        assert_eq!(Slot::find_in("slot=green"), Some(Slot::Green));
        assert_eq!(Slot::find_in("BLUE\n"), Some(Slot::Blue));
        assert_eq!(Slot::find_in("blue or green"), None);
        assert_eq!(Slot::find_in("ok"), None);
    }

    #[test]
    fn serving_states() {
        assert!(SlotHealth::Healthy.is_serving());
        assert!(SlotHealth::Running.is_serving());
        assert!(!SlotHealth::Unhealthy.is_serving());
        assert!(!SlotHealth::Absent.is_serving());
        assert!(!SlotHealth::Unknown.is_serving());
    }
}
